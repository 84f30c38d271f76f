//! JPEG marker segment scanner.
//!
//! A JPEG stream is a sequence of marker segments: `0xFF`, a one byte marker
//! code and, for most codes, a 2-byte big-endian size that counts itself
//! followed by `size - 2` payload bytes. Entropy-coded scan data follows
//! `SOS` without any framing; inside it a literal `0xFF` is stuffed as
//! `0xFF 0x00`.

use std::{fmt::Display, io::Read, ops::ControlFlow};

use nom::number::Endianness;
#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{
    error::Error,
    exif::{self, check_exif_header, FieldEntry, EXIF_IDENT},
    BufCursor, ByteCursor, Flow, Skip,
};

const MARKER_PREFIX: u8 = 0xFF;

/// Size of the size field, which is included in the segment size.
const SIZE_FIELD_LEN: u32 = 2;

macro_rules! marker_codes {
    ($($name:ident = $code:literal,)*) => {
        /// A marker code is a byte following 0xFF that indicates the kind of
        /// marker.
        #[cfg_attr(feature = "json_dump", derive(Serialize))]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MarkerCode {
            $($name,)*
            /// A code with no assigned meaning. Treated as carrying data.
            Other(u8),
        }

        impl MarkerCode {
            pub fn code(self) -> u8 {
                match self {
                    $(MarkerCode::$name => $code,)*
                    MarkerCode::Other(c) => c,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(MarkerCode::$name => stringify!($name),)*
                    MarkerCode::Other(_) => "Other",
                }
            }
        }

        impl From<u8> for MarkerCode {
            fn from(v: u8) -> Self {
                match v {
                    $($code => MarkerCode::$name,)*
                    other => MarkerCode::Other(other),
                }
            }
        }
    };
}

marker_codes! {
    Sof0 = 0xC0,
    Sof1 = 0xC1,
    Sof2 = 0xC2,
    Sof3 = 0xC3,
    Dht = 0xC4,
    Sof5 = 0xC5,
    Sof6 = 0xC6,
    Sof7 = 0xC7,
    Jpg = 0xC8,
    Sof9 = 0xC9,
    Sof10 = 0xCA,
    Sof11 = 0xCB,
    Dac = 0xCC,
    Sof13 = 0xCD,
    Sof14 = 0xCE,
    Sof15 = 0xCF,
    Rst0 = 0xD0,
    Rst1 = 0xD1,
    Rst2 = 0xD2,
    Rst3 = 0xD3,
    Rst4 = 0xD4,
    Rst5 = 0xD5,
    Rst6 = 0xD6,
    Rst7 = 0xD7,
    Soi = 0xD8,
    Eoi = 0xD9,
    Sos = 0xDA,
    Dqt = 0xDB,
    Dnl = 0xDC,
    Dri = 0xDD,
    Dhp = 0xDE,
    Exp = 0xDF,
    App0 = 0xE0,
    App1 = 0xE1,
    App2 = 0xE2,
    App3 = 0xE3,
    App4 = 0xE4,
    App5 = 0xE5,
    App6 = 0xE6,
    App7 = 0xE7,
    App8 = 0xE8,
    App9 = 0xE9,
    App10 = 0xEA,
    App11 = 0xEB,
    App12 = 0xEC,
    App13 = 0xED,
    App14 = 0xEE,
    App15 = 0xEF,
    Jpg0 = 0xF0,
    Jpg1 = 0xF1,
    Jpg2 = 0xF2,
    Jpg3 = 0xF3,
    Jpg4 = 0xF4,
    Jpg5 = 0xF5,
    Jpg6 = 0xF6,
    Jpg7 = 0xF7,
    Jpg8 = 0xF8,
    Jpg9 = 0xF9,
    Jpg10 = 0xFA,
    Jpg11 = 0xFB,
    Jpg12 = 0xFC,
    Jpg13 = 0xFD,
    Com = 0xFE,
}

impl MarkerCode {
    /// Whether a size field and payload follow the marker.
    pub fn has_data(self) -> bool {
        !matches!(
            self,
            MarkerCode::Soi
                | MarkerCode::Eoi
                | MarkerCode::Rst0
                | MarkerCode::Rst1
                | MarkerCode::Rst2
                | MarkerCode::Rst3
                | MarkerCode::Rst4
                | MarkerCode::Rst5
                | MarkerCode::Rst6
                | MarkerCode::Rst7
        )
    }
}

impl Display for MarkerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02X})", self.name().to_uppercase(), self.code())
    }
}

#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSegment {
    pub code: MarkerCode,

    /// Includes the 2 bytes of the size field itself; 0 for markers without
    /// data.
    pub size: u32,
}

impl MarkerSegment {
    /// Number of payload bytes following the size field.
    pub fn payload_len(&self) -> u64 {
        u64::from(self.size.saturating_sub(SIZE_FIELD_LEN))
    }
}

/// Walks marker segments until `EOI`, the end of the stream, or the `SOS`
/// segment (which is still handed to `handler`). Scan data is not read.
///
/// The handler gets the cursor positioned right after the size field.
#[tracing::instrument(skip_all)]
pub fn parse<R, S, F>(cursor: &mut ByteCursor<R, S>, mut handler: F) -> crate::Result<()>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(&mut ByteCursor<R, S>, &MarkerSegment) -> crate::Result<Flow>,
{
    walk(cursor, &mut handler)?;
    Ok(())
}

/// Like [`parse`], but continues through the scan data after `SOS` with
/// [`scan`], so markers inside and after it (`DHT`, `RSTn`, further `SOS` of
/// a progressive image, `EOI`) are also delivered.
#[tracing::instrument(skip_all)]
pub fn parse_with_scan<R, S, F>(cursor: &mut ByteCursor<R, S>, mut handler: F) -> crate::Result<()>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(&mut ByteCursor<R, S>, &MarkerSegment) -> crate::Result<Flow>,
{
    let Some(last) = walk(cursor, &mut handler)? else {
        return Ok(());
    };
    if last == MarkerCode::Sos {
        return scan(cursor, &mut handler).map(|_| ());
    }
    Ok(())
}

/// Extracts Exif data: walks markers up to `SOS` and runs the TIFF walker
/// over the payload of every `APP1` segment carrying an `"Exif\0\0"`
/// identifier. Other `APP1` segments (XMP, ...) are skipped.
#[tracing::instrument(skip_all)]
pub fn parse_exif<R, S, F>(cursor: &mut ByteCursor<R, S>, mut handler: F) -> crate::Result<()>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(FieldEntry) -> ControlFlow<()>,
{
    let mut on_segment = |c: &mut ByteCursor<R, S>, segment: &MarkerSegment| -> crate::Result<Flow> {
        if segment.code != MarkerCode::App1 || segment.payload_len() < EXIF_IDENT.len() as u64 {
            return Ok(Flow::Skip);
        }

        let mut payload = c.read_bytes(segment.payload_len(), "APP1 payload")?;
        if !check_exif_header(&payload) {
            tracing::debug!("APP1 without Exif identifier; skipped");
            return Ok(Flow::Consumed);
        }
        payload.drain(..EXIF_IDENT.len());

        let mut tiff = BufCursor::from_vec(payload);
        if exif::walk(&mut tiff, &mut handler)?.is_break() {
            return Ok(Flow::Stop);
        }
        Ok(Flow::Consumed)
    };
    walk(cursor, &mut on_segment)?;
    Ok(())
}

/// Walks marker segments from the start of the stream. Returns the code of
/// the segment the walk ended on, or `None` if a handler stopped it or the
/// stream ran out.
fn walk<R, S, F>(
    cursor: &mut ByteCursor<R, S>,
    handler: &mut F,
) -> crate::Result<Option<MarkerCode>>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(&mut ByteCursor<R, S>, &MarkerSegment) -> crate::Result<Flow>,
{
    let segment = read_segment(cursor)?;
    if segment.code != MarkerCode::Soi {
        return Err(Error::invalid(
            "marker code",
            format!("expected SOI first, got {}", segment.code),
        ));
    }
    if deliver(cursor, segment, handler)?.is_break() {
        return Ok(None);
    }

    while cursor.has_remaining()? {
        let segment = read_segment(cursor)?;
        if deliver(cursor, segment, handler)?.is_break() {
            return Ok(None);
        }
        if matches!(segment.code, MarkerCode::Eoi | MarkerCode::Sos) {
            return Ok(Some(segment.code));
        }
    }
    Ok(None)
}

/// Re-synchronizes on marker prefixes inside entropy-coded data and delivers
/// every marker found, until `EOI` or the end of the stream. Stuffed `0xFF
/// 0x00` pairs and `0xFF` fill bytes are absorbed.
pub fn scan<R, S, F>(cursor: &mut ByteCursor<R, S>, mut handler: F) -> crate::Result<ControlFlow<()>>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(&mut ByteCursor<R, S>, &MarkerSegment) -> crate::Result<Flow>,
{
    let mut found_prefix = false;
    let mut opaque = 0u64;

    while cursor.has_remaining()? {
        let b = cursor.read_u8("scan data")?;
        match (found_prefix, b) {
            (false, MARKER_PREFIX) => found_prefix = true,
            (false, _) => opaque += 1,
            (true, 0x00) => {
                // stuffed literal 0xFF
                found_prefix = false;
                opaque += 2;
            }
            (true, MARKER_PREFIX) => (),
            (true, code) => {
                found_prefix = false;
                tracing::debug!(opaque, "scan data");
                opaque = 0;

                let segment = read_segment_after_code(cursor, code)?;
                if deliver(cursor, segment, &mut handler)?.is_break() {
                    return Ok(ControlFlow::Break(()));
                }
                if segment.code == MarkerCode::Eoi {
                    break;
                }
            }
        }
    }

    Ok(ControlFlow::Continue(()))
}

fn read_segment<R: Read, S: Skip<R>>(cursor: &mut ByteCursor<R, S>) -> crate::Result<MarkerSegment> {
    let [prefix, code] = cursor.read_array::<2>("marker code")?;
    if prefix != MARKER_PREFIX {
        return Err(Error::invalid(
            "marker prefix",
            format!("expected 0xFF, got 0x{prefix:02X}"),
        ));
    }
    read_segment_after_code(cursor, code)
}

fn read_segment_after_code<R: Read, S: Skip<R>>(
    cursor: &mut ByteCursor<R, S>,
    code: u8,
) -> crate::Result<MarkerSegment> {
    let code = MarkerCode::from(code);
    if !code.has_data() {
        return Ok(MarkerSegment { code, size: 0 });
    }

    let size = u32::from(cursor.read_u16(Endianness::Big, "segment size")?);
    if size < SIZE_FIELD_LEN {
        return Err(Error::invalid(
            "segment size",
            format!("{size} is smaller than 2"),
        ));
    }

    let segment = MarkerSegment { code, size };
    if cursor.remaining().is_some_and(|x| x < segment.payload_len()) {
        return Err(Error::Truncated("segment data"));
    }
    Ok(segment)
}

fn deliver<R, S, F>(
    cursor: &mut ByteCursor<R, S>,
    segment: MarkerSegment,
    handler: &mut F,
) -> crate::Result<ControlFlow<()>>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(&mut ByteCursor<R, S>, &MarkerSegment) -> crate::Result<Flow>,
{
    tracing::debug!(code = %segment.code, segment.size, "Got segment");
    match handler(cursor, &segment)? {
        Flow::Consumed => Ok(ControlFlow::Continue(())),
        Flow::Skip => {
            cursor.skip(segment.payload_len(), "segment data")?;
            Ok(ControlFlow::Continue(()))
        }
        Flow::Stop => Ok(ControlFlow::Break(())),
    }
}
