//! ISO base media file format box walker.
//!
//! Box bodies are handed to caller-supplied handlers with the cursor at the
//! first body byte. Nested boxes are parsed by the handler calling back into
//! [`walk`] or [`parse_box`], usually over a [`BufCursor`](crate::BufCursor)
//! holding exactly the parent's body, so children can never over-read it.

use std::{io::Read, ops::ControlFlow};

use nom::{number::Endianness, AsChar};
#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{error::Error, ByteCursor, Flow, Skip};

pub use ftyp::FtypBox;
pub use iinf::{IinfBox, InfeBox};
pub use iloc::{ConstructionMethod, IlocBox, ItemLocation, ItemLocationExtent};
pub use meta::MetaBox;

mod ftyp;
mod iinf;
mod iloc;
mod meta;

/// Size of the version and flags field of a full box.
const FULL_BOX_FIELD_LEN: u64 = 4;

/// Representing an ISO base media file format box header.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    /// The 32-bit size field as stored: 0 means "to the end", 1 means
    /// `long_size` holds the real size.
    pub size: u32,
    pub box_type: String,

    /// 0 unless `size` is 1.
    pub long_size: u64,

    /// Present for `uuid` boxes.
    pub extended_type: Option<[u8; 16]>,

    /// Type of the enclosing box, empty at top level.
    pub container: String,

    /// Bytes left in the box after everything consumed so far.
    pub data_size: u64,
}

/// Representing an ISO base media file format full box header. The
/// `data_size` of the inner header already excludes version and flags.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullBoxHeader {
    pub header: BoxHeader,
    pub version: u8, // 8 bits
    pub flags: u32,  // 24 bits
}

impl FullBoxHeader {
    pub fn box_type(&self) -> &str {
        &self.header.box_type
    }

    pub fn data_size(&self) -> u64 {
        self.header.data_size
    }
}

impl BoxHeader {
    /// Reads a box header, leaving the cursor at the first body byte.
    ///
    /// A size of 0 extends the box to the end of the stream. When the stream
    /// length is unknown (an unseekable cursor) such a box fails with
    /// [`Error::Invalid`] on `"box size"`.
    pub fn read<R: Read, S: Skip<R>>(
        cursor: &mut ByteCursor<R, S>,
        container: &str,
    ) -> crate::Result<BoxHeader> {
        let start = cursor.position();

        let size = cursor.read_u32(Endianness::Big, "box size")?;
        if (2..8).contains(&size) {
            return Err(Error::invalid("box size", format!("{size} is too small")));
        }

        // String::from_utf8 would fail on "©xyz"
        let box_type = cursor
            .read_array::<4>("box type")?
            .iter()
            .map(|b| b.as_char())
            .collect::<String>();

        let long_size = if size == 1 {
            let long_size = cursor.read_u64(Endianness::Big, "long size")?;
            if (1..8).contains(&long_size) {
                return Err(Error::invalid(
                    "long size",
                    format!("{long_size} is too small"),
                ));
            }
            long_size
        } else {
            0
        };

        let extended_type = if box_type == "uuid" {
            Some(cursor.read_array::<16>("extended type")?)
        } else {
            None
        };

        let header_size = cursor.position() - start;
        let box_size = if size == 1 { long_size } else { u64::from(size) };
        let data_size = if box_size == 0 {
            cursor.remaining().ok_or_else(|| {
                Error::invalid(
                    "box size",
                    "box extends to the end of a stream of unknown length",
                )
            })?
        } else {
            box_size.checked_sub(header_size).ok_or_else(|| {
                Error::invalid(
                    "box size",
                    format!("{box_size} is smaller than its {header_size} byte header"),
                )
            })?
        };

        if cursor.remaining().is_some_and(|x| x < data_size) {
            return Err(Error::Truncated("box data"));
        }

        tracing::debug!(%box_type, container, data_size, "Got box");
        Ok(BoxHeader {
            size,
            box_type,
            long_size,
            extended_type,
            container: container.to_owned(),
            data_size,
        })
    }
}

fn finish<R: Read, S: Skip<R>>(
    cursor: &mut ByteCursor<R, S>,
    flow: Flow,
    data_size: u64,
) -> crate::Result<ControlFlow<()>> {
    match flow {
        Flow::Consumed => Ok(ControlFlow::Continue(())),
        Flow::Skip => {
            cursor.skip(data_size, "box data")?;
            Ok(ControlFlow::Continue(()))
        }
        Flow::Stop => Ok(ControlFlow::Break(())),
    }
}

/// Decodes one box header and hands the body to `handler`. Unless the handler
/// consumed the body, it is skipped afterwards.
pub fn parse_box<R, S, F>(
    cursor: &mut ByteCursor<R, S>,
    container: &str,
    handler: F,
) -> crate::Result<ControlFlow<()>>
where
    R: Read,
    S: Skip<R>,
    F: FnOnce(&mut ByteCursor<R, S>, &BoxHeader) -> crate::Result<Flow>,
{
    let header = BoxHeader::read(cursor, container)?;
    let flow = handler(cursor, &header)?;
    finish(cursor, flow, header.data_size)
}

/// Reads the version and flags of an already decoded box and hands the rest
/// of the body to `handler`.
pub fn parse_full_box<R, S, F>(
    cursor: &mut ByteCursor<R, S>,
    mut header: BoxHeader,
    handler: F,
) -> crate::Result<ControlFlow<()>>
where
    R: Read,
    S: Skip<R>,
    F: FnOnce(&mut ByteCursor<R, S>, &FullBoxHeader) -> crate::Result<Flow>,
{
    if header.data_size < FULL_BOX_FIELD_LEN {
        return Err(Error::Truncated("version and flags"));
    }
    let bs = cursor.read_array::<4>("version and flags")?;
    header.data_size -= FULL_BOX_FIELD_LEN;

    let header = FullBoxHeader {
        header,
        version: bs[0],
        flags: u32::from_be_bytes(bs) & 0x00ff_ffff,
    };
    tracing::debug!(version = header.version, flags = header.flags, "Got full box");

    let flow = handler(cursor, &header)?;
    finish(cursor, flow, header.data_size())
}

/// [`parse_box`] followed by [`parse_full_box`], for callers that always
/// expect a full box.
pub fn parse_full<R, S, F>(
    cursor: &mut ByteCursor<R, S>,
    container: &str,
    handler: F,
) -> crate::Result<ControlFlow<()>>
where
    R: Read,
    S: Skip<R>,
    F: FnOnce(&mut ByteCursor<R, S>, &FullBoxHeader) -> crate::Result<Flow>,
{
    let header = BoxHeader::read(cursor, container)?;
    parse_full_box(cursor, header, handler)
}

/// Parses boxes one after another until the cursor is exhausted or a handler
/// returns [`Flow::Stop`].
pub fn walk<R, S, F>(
    cursor: &mut ByteCursor<R, S>,
    container: &str,
    mut handler: F,
) -> crate::Result<ControlFlow<()>>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(&mut ByteCursor<R, S>, &BoxHeader) -> crate::Result<Flow>,
{
    while cursor.has_remaining()? {
        if parse_box(cursor, container, &mut handler)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(ControlFlow::Continue(()))
}

/// Walks the top level boxes of the stream.
#[tracing::instrument(skip_all)]
pub fn parse<R, S, F>(cursor: &mut ByteCursor<R, S>, handler: F) -> crate::Result<()>
where
    R: Read,
    S: Skip<R>,
    F: FnMut(&mut ByteCursor<R, S>, &BoxHeader) -> crate::Result<Flow>,
{
    walk(cursor, "", handler).map(|_| ())
}
