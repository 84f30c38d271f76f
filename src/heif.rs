//! HEIF/HEIC metadata extraction.
//!
//! The item structure lives in the top level `meta` box: `iloc` maps item ids
//! to byte extents in the file, `iinf` tells their types. Items of type
//! `Exif` hold a TIFF stream, optionally preceded by an `"Exif\0\0"`
//! identifier, which may itself be preceded by a 4-byte big-endian offset.

use std::{
    collections::HashMap,
    io::{Read, Seek},
    ops::ControlFlow,
};

#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{
    bbox::{self, ConstructionMethod, FtypBox, InfeBox, ItemLocation, MetaBox},
    error::Error,
    exif::{self, check_exif_header, FieldEntry, EXIF_IDENT},
    ByteCursor, Flow, Seekable, Skip,
};

/// Bytes read from the start of an Exif item to find where TIFF data starts.
const EXIF_ITEM_HEAD_LEN: usize = 10;

/// Everything collected from the top level `ftyp` and `meta` boxes.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeifMeta {
    pub ftyp: Option<FtypBox>,
    pub locations: Vec<ItemLocation>,
    pub infos: Vec<InfeBox>,

    /// Item id to absolute file offset of its (last) extent.
    pub extent_offsets: HashMap<u32, u64>,

    /// Item id to length of its (last) extent.
    pub extent_lengths: HashMap<u32, u64>,

    /// Items whose type is `Exif`, in `iinf` order.
    pub exif_item_ids: Vec<u32>,
}

impl HeifMeta {
    fn absorb(&mut self, meta: MetaBox) {
        self.exif_item_ids.extend(meta.exif_item_ids());
        self.locations.extend(meta.locations);
        self.infos.extend(meta.infos);
    }

    fn build_extent_maps(&mut self) {
        for loc in self.locations.iter() {
            if let Some((offset, length)) = loc.extent_offset_len() {
                self.extent_offsets.insert(loc.id, offset);
                self.extent_lengths.insert(loc.id, length);
            }
        }
    }

    /// Offset and length of an item's (last) extent, as recorded by `iloc`.
    /// The offset is a file offset only for
    /// [`ConstructionMethod::FileOffset`] items.
    pub fn item_extent(&self, id: u32) -> Option<(u64, u64)> {
        Some((*self.extent_offsets.get(&id)?, *self.extent_lengths.get(&id)?))
    }

    /// Like [`HeifMeta::item_extent`], but only for items stored at a file
    /// offset.
    pub fn item_file_extent(&self, id: u32) -> Option<(u64, u64)> {
        let loc = self.locations.iter().rev().find(|loc| loc.id == id)?;
        if loc.construction_method != ConstructionMethod::FileOffset {
            tracing::warn!(
                loc.id,
                ?loc.construction_method,
                "item is not stored at a file offset; ignored"
            );
            return None;
        }
        self.item_extent(id)
    }
}

/// Walks the top level boxes and decodes `ftyp` and `meta`. All other boxes,
/// `mdat` included, are skipped.
#[tracing::instrument(skip_all)]
pub fn read_meta<R: Read, S: Skip<R>>(cursor: &mut ByteCursor<R, S>) -> crate::Result<HeifMeta> {
    let mut heif = HeifMeta::default();

    bbox::parse(cursor, |c, h| {
        match h.box_type.as_str() {
            "ftyp" => heif.ftyp = Some(FtypBox::read(c, h)?),
            "meta" => {
                let res = bbox::parse_full_box(c, h.clone(), |c, h| {
                    heif.absorb(MetaBox::read(c, h)?);
                    Ok(Flow::Consumed)
                })?;
                if res.is_break() {
                    return Ok(Flow::Stop);
                }
            }
            _ => return Ok(Flow::Skip),
        }
        Ok(Flow::Consumed)
    })?;

    heif.build_extent_maps();
    tracing::debug!(
        exif_items = ?heif.exif_item_ids,
        extents = ?heif.extent_offsets,
        "meta parsed"
    );
    Ok(heif)
}

/// Walks the TIFF stream of every Exif item, delivering its fields to
/// `handler`, and returns what was learned about the file.
///
/// An extent length of 0 means the item runs to the end of the file. Exif
/// items without an extent in the file (missing from `iloc`, or stored in
/// `idat` or another item) are ignored. A stop requested by the
/// handler ends the extraction without error.
#[tracing::instrument(skip_all)]
pub fn parse_exif<R, F>(cursor: &mut ByteCursor<R, Seekable>, mut handler: F) -> crate::Result<HeifMeta>
where
    R: Read + Seek,
    F: FnMut(FieldEntry) -> ControlFlow<()>,
{
    let heif = read_meta(cursor)?;

    for id in heif.exif_item_ids.iter() {
        let Some((offset, length)) = heif.item_file_extent(*id) else {
            tracing::debug!(id, "Exif item has no file extent; ignored");
            continue;
        };
        if walk_exif_item(cursor, offset, length, &mut handler)?.is_break() {
            break;
        }
    }

    Ok(heif)
}

fn walk_exif_item<R, F>(
    cursor: &mut ByteCursor<R, Seekable>,
    offset: u64,
    length: u64,
    handler: F,
) -> crate::Result<ControlFlow<()>>
where
    R: Read + Seek,
    F: FnMut(FieldEntry) -> ControlFlow<()>,
{
    cursor.seek_absolute(offset)?;
    let head = cursor.read_array::<EXIF_ITEM_HEAD_LEN>("Exif item header")?;
    let start = exif_data_start(&head);
    tracing::debug!(offset, length, start, "Exif item");

    cursor.seek_absolute(offset + start)?;
    let tiff_len = if length == 0 {
        cursor.remaining().unwrap_or_default()
    } else {
        length.checked_sub(start).ok_or_else(|| {
            Error::invalid(
                "extent_length",
                format!("{length} is shorter than the {start} byte Exif prefix"),
            )
        })?
    };

    let mut tiff = cursor.sub_cursor(tiff_len, "Exif item")?;
    exif::walk(&mut tiff, handler)
}

/// Returns where the TIFF header starts relative to the start of an Exif
/// item, given its first bytes.
pub fn exif_data_start(head: &[u8; EXIF_ITEM_HEAD_LEN]) -> u64 {
    if check_exif_header(head) {
        EXIF_IDENT.len() as u64
    } else if head[..4] == 6u32.to_be_bytes() && check_exif_header(&head[4..]) {
        (4 + EXIF_IDENT.len()) as u64
    } else {
        0
    }
}
