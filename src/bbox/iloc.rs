use std::io::Read;

use nom::number::Endianness;
#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{error::Error, BufCursor, ByteCursor, FullBoxHeader, Skip};

/// Item location box.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IlocBox {
    pub offset_size: u8,      // 4 bits
    pub length_size: u8,      // 4 bits
    pub base_offset_size: u8, // 4 bits
    pub index_size: u8,       // 4 bits, version 1/2, reserved in version 0
    pub items: Vec<ItemLocation>,
}

#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLocation {
    pub id: u32,
    pub construction_method: ConstructionMethod,
    pub data_ref_index: u16,
    pub base_offset: u64,
    pub extents: Vec<ItemLocationExtent>,
}

#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemLocationExtent {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
}

/// Where the bytes of an item live.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionMethod {
    FileOffset = 0,
    IdatOffset = 1,
    ItemOffset = 2,
}

impl TryFrom<u8> for ConstructionMethod {
    type Error = Error;
    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::FileOffset),
            1 => Ok(Self::IdatOffset),
            2 => Ok(Self::ItemOffset),
            other => Err(Error::invalid(
                "construction_method",
                format!("unknown method {other}"),
            )),
        }
    }
}

impl ItemLocation {
    /// Absolute offset and length of the last extent. Items are assumed to
    /// have a single extent.
    pub fn extent_offset_len(&self) -> Option<(u64, u64)> {
        let extent = self.extents.last()?;
        Some((self.base_offset.checked_add(extent.offset)?, extent.length))
    }
}

impl IlocBox {
    /// Consumes the whole body of the `iloc` box described by `header`.
    #[tracing::instrument(skip_all)]
    pub fn read<R: Read, S: Skip<R>>(
        cursor: &mut ByteCursor<R, S>,
        header: &FullBoxHeader,
    ) -> crate::Result<IlocBox> {
        let mut body = cursor.sub_cursor(header.data_size(), "iloc")?;
        let iloc = Self::parse_body(&mut body, header.version)?;
        if body.has_remaining()? {
            tracing::debug!(extra = ?body.remaining(), "trailing bytes in iloc");
        }
        Ok(iloc)
    }

    fn parse_body(body: &mut BufCursor, version: u8) -> crate::Result<IlocBox> {
        let [sizes_hi, sizes_lo] = body.read_array::<2>("iloc field sizes")?;
        let offset_size = check_size(sizes_hi >> 4, "offset_size")?;
        let length_size = check_size(sizes_hi & 0xF, "length_size")?;
        let base_offset_size = check_size(sizes_lo >> 4, "base_offset_size")?;
        let index_size = check_size(sizes_lo & 0xF, "index_size")?;

        let item_count = read_id(body, version, "item_count")?;
        // don't trust item_count for the capacity
        let mut items = Vec::new();
        for _ in 0..item_count {
            let id = read_id(body, version, "item_ID")?;

            let construction_method = if version == 1 || version == 2 {
                let v = body.read_u16(Endianness::Big, "construction_method")?;
                ConstructionMethod::try_from((v & 0xF) as u8)?
            } else {
                ConstructionMethod::FileOffset
            };

            let data_ref_index = body.read_u16(Endianness::Big, "data_reference_index")?;
            let base_offset = read_sized(body, base_offset_size, "base_offset")?;

            let extent_count = body.read_u16(Endianness::Big, "extent_count")?;
            if extent_count == 0 {
                return Err(Error::invalid("extent_count", "item has no extent"));
            }

            let mut extents = Vec::new();
            for _ in 0..extent_count {
                let index = if (version == 1 || version == 2) && index_size > 0 {
                    read_sized(body, index_size, "extent_index")?
                } else {
                    0
                };
                let offset = read_sized(body, offset_size, "extent_offset")?;
                let length = read_sized(body, length_size, "extent_length")?;

                if base_offset.checked_add(offset).is_none() {
                    return Err(Error::invalid(
                        "extent_offset",
                        format!("{base_offset} + {offset} overflows"),
                    ));
                }
                extents.push(ItemLocationExtent {
                    index,
                    offset,
                    length,
                });
            }

            tracing::debug!(id, ?construction_method, base_offset, ?extents, "Got item");
            items.push(ItemLocation {
                id,
                construction_method,
                data_ref_index,
                base_offset,
                extents,
            });
        }

        Ok(IlocBox {
            offset_size,
            length_size,
            base_offset_size,
            index_size,
            items,
        })
    }
}

fn check_size(size: u8, field: &'static str) -> crate::Result<u8> {
    match size {
        0 | 4 | 8 => Ok(size),
        other => Err(Error::invalid(field, format!("{other} is not 0, 4 or 8"))),
    }
}

/// Item ids and counts are 16 bits wide before version 2.
fn read_id(body: &mut BufCursor, version: u8, field: &'static str) -> crate::Result<u32> {
    if version < 2 {
        Ok(u32::from(body.read_u16(Endianness::Big, field)?))
    } else {
        body.read_u32(Endianness::Big, field)
    }
}

fn read_sized(body: &mut BufCursor, size: u8, field: &'static str) -> crate::Result<u64> {
    match size {
        4 => Ok(u64::from(body.read_u32(Endianness::Big, field)?)),
        8 => body.read_u64(Endianness::Big, field),
        _ => Ok(0),
    }
}
