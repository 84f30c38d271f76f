use std::{
    fmt::Debug,
    io::{Read, Seek},
};

use nom::number::Endianness;

use crate::{error::Error, ByteCursor, Seekable};

/// Identifier in front of TIFF data in a JPEG APP1 segment, and optionally in
/// a HEIF Exif item.
pub(crate) const EXIF_IDENT: &[u8; 6] = b"Exif\0\0";

const TIFF_TAG_MARK: u16 = 0x2a;

/// TIFF Header
#[derive(Clone, PartialEq, Eq)]
pub struct TiffHeader {
    pub endian: Endianness,

    /// Relative to the start of the header.
    pub ifd0_offset: u32,
}

impl Debug for TiffHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endian_str = match self.endian {
            Endianness::Big => "Big",
            Endianness::Little => "Little",
            Endianness::Native => "Native",
        };
        f.debug_struct("TiffHeader")
            .field("endian", &endian_str)
            .field("ifd0_offset", &format!("{:#x}", self.ifd0_offset))
            .finish()
    }
}

impl TiffHeader {
    /// Reads the 8 header bytes at the cursor position.
    pub fn read<R: Read + Seek>(cursor: &mut ByteCursor<R, Seekable>) -> crate::Result<TiffHeader> {
        let endian = match &cursor.read_array::<2>("byte order")? {
            b"II" => Endianness::Little,
            b"MM" => Endianness::Big,
            other => {
                return Err(Error::invalid(
                    "byte order",
                    format!("expected II or MM, got {other:02x?}"),
                ))
            }
        };

        let mark = cursor.read_u16(endian, "tag mark")?;
        if mark != TIFF_TAG_MARK {
            return Err(Error::invalid("tag mark", format!("{mark:#06x}")));
        }

        let ifd0_offset = cursor.read_u32(endian, "first IFD offset")?;
        Ok(Self {
            endian,
            ifd0_offset,
        })
    }
}

pub(crate) fn check_exif_header(data: &[u8]) -> bool {
    data.starts_with(EXIF_IDENT)
}
