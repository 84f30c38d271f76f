use std::io::Read;

use nom::{
    bytes::streaming::take,
    combinator::{cond, map},
    number::{
        streaming::{be_u16, be_u32},
        Endianness,
    },
    IResult,
};
#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{
    bbox::parse_full,
    error::{convert_parse_error, Error},
    utils::parse_cstr,
    ByteCursor, Flow, FullBoxHeader, Skip,
};

/// Item information box.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IinfBox {
    /// Decoded entries. Entries with a version below 2 are skipped.
    pub entries: Vec<InfeBox>,
}

impl IinfBox {
    /// Consumes the whole body of the `iinf` box described by `header`.
    #[tracing::instrument(skip_all)]
    pub fn read<R: Read, S: Skip<R>>(
        cursor: &mut ByteCursor<R, S>,
        header: &FullBoxHeader,
    ) -> crate::Result<IinfBox> {
        let mut body = cursor.sub_cursor(header.data_size(), "iinf")?;
        let entry_count = if header.version == 0 {
            u32::from(body.read_u16(Endianness::Big, "entry_count")?)
        } else {
            body.read_u32(Endianness::Big, "entry_count")?
        };

        let mut entries = Vec::new();
        for _ in 0..entry_count {
            let res = parse_full(&mut body, "iinf", |c, h| {
                if h.box_type() != "infe" {
                    return Err(Error::invalid(
                        "infe",
                        format!("unexpected box '{}' in iinf", h.box_type()),
                    ));
                }
                match InfeBox::read(c, h)? {
                    Some(infe) => {
                        entries.push(infe);
                        Ok(Flow::Consumed)
                    }
                    None => Ok(Flow::Skip),
                }
            })?;
            if res.is_break() {
                break;
            }
        }

        Ok(IinfBox { entries })
    }

    /// Ids of the items whose type is `Exif`.
    pub fn exif_item_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().filter(|e| e.is_exif()).map(|e| e.id)
    }
}

/// Info entry box
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfeBox {
    pub id: u32,
    pub protection_index: u16,
    pub item_type: String,
    pub item_name: String,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub uri_type: Option<String>,
}

impl InfeBox {
    /// Decodes an `infe` body. Returns `None` without touching the cursor
    /// for versions 0 and 1, whose layout is not supported.
    pub fn read<R: Read, S: Skip<R>>(
        cursor: &mut ByteCursor<R, S>,
        header: &FullBoxHeader,
    ) -> crate::Result<Option<InfeBox>> {
        if header.version < 2 {
            tracing::debug!(version = header.version, "unsupported infe version; skipped");
            return Ok(None);
        }

        let body = cursor.read_bytes(header.data_size(), "infe")?;
        let (_, infe) =
            Self::parse_body(&body, header.version).map_err(|e| convert_parse_error(e, "infe"))?;
        tracing::debug!(infe.id, item_type = %infe.item_type, "Got infe");
        Ok(Some(infe))
    }

    fn parse_body(input: &[u8], version: u8) -> IResult<&[u8], InfeBox> {
        let (remain, id) = if version == 2 {
            map(be_u16, u32::from)(input)?
        } else {
            be_u32(input)?
        };

        let (remain, protection_index) = be_u16(remain)?;

        let (remain, item_type) = map(take(4_usize), |bs: &[u8]| {
            bs.iter().map(|b| *b as char).collect::<String>()
        })(remain)?;

        let (remain, item_name) = parse_cstr(remain)?;

        let (remain, content_type, content_encoding) = if item_type.eq_ignore_ascii_case("mime") {
            let (remain, content_type) = parse_cstr(remain)?;
            let (remain, content_encoding) = cond(!remain.is_empty(), parse_cstr)(remain)?;
            (remain, Some(content_type), content_encoding)
        } else {
            (remain, None, None)
        };

        let (remain, uri_type) = if item_type.eq_ignore_ascii_case("uri ") {
            let (remain, uri_type) = parse_cstr(remain)?;
            (remain, Some(uri_type))
        } else {
            (remain, None)
        };

        Ok((
            remain,
            InfeBox {
                id,
                protection_index,
                item_type,
                item_name,
                content_type,
                content_encoding,
                uri_type,
            },
        ))
    }

    pub fn is_exif(&self) -> bool {
        self.item_type.eq_ignore_ascii_case("Exif")
    }
}
