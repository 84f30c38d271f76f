//! Define exif tags, see https://exiftool.org/TagNames/EXIF.html
//!
//! Only tags that live in the IFD0/IFD1 chain, or in the Exif sub-IFD that
//! callers can walk themselves via [`ExifTag::ExifOffset`], are named here.
//! GPS tag codes collide with IFD0 codes and are left unnamed.

use std::fmt::Display;

#[cfg(feature = "json_dump")]
use serde::{Deserialize, Serialize};

macro_rules! exif_tags {
    ($($name:ident = $code:literal,)*) => {
        /// Defines recognized Exif tags. All tags can be walked, no matter if
        /// it is defined here. This enum definition is just for ease of use.
        #[cfg_attr(feature = "json_dump", derive(Serialize, Deserialize))]
        #[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
        pub enum ExifTag {
            $($name = $code,)*
        }

        impl ExifTag {
            pub const fn code(self) -> u16 {
                self as u16
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(ExifTag::$name => stringify!($name),)*
                }
            }
        }

        impl TryFrom<u16> for ExifTag {
            /// The unrecognized code.
            type Error = u16;

            fn try_from(v: u16) -> Result<Self, Self::Error> {
                match v {
                    $($code => Ok(ExifTag::$name),)*
                    other => Err(other),
                }
            }
        }
    };
}

exif_tags! {
    ImageWidth = 0x0100,
    ImageHeight = 0x0101,
    BitsPerSample = 0x0102,
    Compression = 0x0103,
    PhotometricInterpretation = 0x0106,
    ImageDescription = 0x010e,
    Make = 0x010f,
    Model = 0x0110,
    StripOffsets = 0x0111,
    Orientation = 0x0112,
    SamplesPerPixel = 0x0115,
    RowsPerStrip = 0x0116,
    StripByteCounts = 0x0117,
    XResolution = 0x011a,
    YResolution = 0x011b,
    PlanarConfiguration = 0x011c,
    ResolutionUnit = 0x0128,
    Software = 0x0131,
    ModifyDate = 0x0132,
    Artist = 0x013b,
    HostComputer = 0x013c,
    WhitePoint = 0x013e,
    PrimaryChromaticities = 0x013f,
    SubIFDs = 0x014a,
    ThumbnailOffset = 0x0201,
    ThumbnailLength = 0x0202,
    YCbCrCoefficients = 0x0211,
    YCbCrPositioning = 0x0213,
    ReferenceBlackWhite = 0x0214,
    Copyright = 0x8298,
    ExposureTime = 0x829a,
    FNumber = 0x829d,
    ExifOffset = 0x8769,
    ExposureProgram = 0x8822,
    GPSInfo = 0x8825,
    ISOSpeedRatings = 0x8827,
    ExifVersion = 0x9000,
    DateTimeOriginal = 0x9003,
    CreateDate = 0x9004,
    OffsetTime = 0x9010,
    OffsetTimeOriginal = 0x9011,
    OffsetTimeDigitized = 0x9012,
    ShutterSpeedValue = 0x9201,
    ApertureValue = 0x9202,
    ExposureBiasValue = 0x9204,
    MeteringMode = 0x9207,
    Flash = 0x9209,
    FocalLength = 0x920a,
    MakerNote = 0x927c,
    UserComment = 0x9286,
    ColorSpace = 0xa001,
    ExifImageWidth = 0xa002,
    ExifImageHeight = 0xa003,
    FocalLengthIn35mmFilm = 0xa405,
    LensMake = 0xa433,
    LensModel = 0xa434,
}

impl Display for ExifTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
