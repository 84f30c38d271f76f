use std::{
    io::{Read, Seek},
    ops::ControlFlow,
};

use nom::number::Endianness;
#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{
    endian::{to_native_order_elements, FromEndianBytes},
    error::Error,
    values::{EntryValue, FieldType, ParseEntryError},
    ByteCursor, ExifTag, Seekable,
};

/// Size of one directory entry: tag, type, count and the value slot.
pub(crate) const IFD_ENTRY_SIZE: u64 = 12;

/// One decoded directory entry.
///
/// `value` holds `bytes_per_type * count` bytes with every multi-byte element
/// already converted to host byte order, so it can be read with
/// `from_ne_bytes` regardless of the file's byte order.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldEntry {
    /// 0-based position of the owning IFD in the chain.
    pub ifd_index: u32,
    pub tag: u16,
    pub field_type: FieldType,
    pub count: u32,
    pub value: Vec<u8>,
}

impl FieldEntry {
    /// Returns the recognized tag, if any.
    pub fn exif_tag(&self) -> Option<ExifTag> {
        ExifTag::try_from(self.tag).ok()
    }

    pub fn decode(&self) -> Result<EntryValue, ParseEntryError> {
        EntryValue::parse(self.tag, self.field_type, self.count, &self.value)
    }
}

/// One IFD of a TIFF chain: its entries and the offset of the next IFD.
///
/// See <https://www.media.mit.edu/pia/Research/deepview/exif.html>.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageFileDirectory {
    pub index: u32,
    pub entries: Vec<FieldEntry>,

    /// Offset of the next IFD relative to the TIFF header, 0 for the last.
    pub next_offset: u32,
}

/// Decodes one IFD starting at the cursor position and delivers each entry to
/// `handler`.
///
/// `origin` is the absolute position of the TIFF header that out-of-line
/// value offsets are relative to. On success the cursor is left right after
/// the next-IFD offset, which is returned in `Continue`.
pub fn parse_ifd<R, F>(
    cursor: &mut ByteCursor<R, Seekable>,
    endian: Endianness,
    origin: u64,
    index: u32,
    mut handler: F,
) -> crate::Result<ControlFlow<(), u32>>
where
    R: Read + Seek,
    F: FnMut(FieldEntry) -> ControlFlow<()>,
{
    let num = cursor.read_u16(endian, "entry count")?;
    tracing::debug!(index, num, pos = cursor.position(), "IFD");
    if cursor
        .remaining()
        .is_some_and(|x| x < u64::from(num) * IFD_ENTRY_SIZE + 4)
    {
        return Err(Error::Truncated("entries"));
    }

    for _ in 0..num {
        let entry = read_field(cursor, endian, origin, index)?;
        if handler(entry).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }

    let next = cursor.read_u32(endian, "next IFD offset")?;
    Ok(ControlFlow::Continue(next))
}

fn read_field<R: Read + Seek>(
    cursor: &mut ByteCursor<R, Seekable>,
    endian: Endianness,
    origin: u64,
    ifd_index: u32,
) -> crate::Result<FieldEntry> {
    let tag = cursor.read_u16(endian, "tag")?;
    let field_type = FieldType::from(cursor.read_u16(endian, "field type")?);
    let count = cursor.read_u32(endian, "count")?;
    let slot = cursor.read_array::<4>("value offset")?;

    let size = u64::from(field_type.bytes_per_type()) * u64::from(count);
    let mut value = if size <= 4 {
        slot[..size as usize].to_vec() // Safe-slice
    } else {
        let offset =
            u32::from_endian_bytes(&slot, endian).ok_or(Error::Truncated("value offset"))?;
        let resume = cursor.position();
        cursor.seek_absolute(origin + u64::from(offset))?;
        let value = cursor.read_bytes(size, "value")?;
        cursor.seek_absolute(resume)?;
        value
    };
    to_native_order_elements(&mut value, endian, field_type.element_width());

    Ok(FieldEntry {
        ifd_index,
        tag,
        field_type,
        count,
        value,
    })
}
