use std::io::Read;

#[cfg(feature = "json_dump")]
use serde::Serialize;

use crate::{
    bbox::{parse_full_box, walk, IinfBox, IlocBox, InfeBox, ItemLocation},
    ByteCursor, Flow, FullBoxHeader, Skip,
};

/// Representing the `meta` box in a HEIF/HEIC file.
///
/// `iloc` and `iinf` may appear in either order, and are simply accumulated
/// while walking.
#[cfg_attr(feature = "json_dump", derive(Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetaBox {
    pub locations: Vec<ItemLocation>,
    pub infos: Vec<InfeBox>,
}

impl MetaBox {
    /// Consumes the whole body of the `meta` box described by `header`.
    #[tracing::instrument(skip_all)]
    pub fn read<R: Read, S: Skip<R>>(
        cursor: &mut ByteCursor<R, S>,
        header: &FullBoxHeader,
    ) -> crate::Result<MetaBox> {
        let mut body = cursor.sub_cursor(header.data_size(), "meta")?;
        let mut meta = MetaBox::default();

        let _ = walk(&mut body, "meta", |c, h| {
            let res = match h.box_type.as_str() {
                "iloc" => parse_full_box(c, h.clone(), |c, h| {
                    meta.locations.extend(IlocBox::read(c, h)?.items);
                    Ok(Flow::Consumed)
                })?,
                "iinf" => parse_full_box(c, h.clone(), |c, h| {
                    meta.infos.extend(IinfBox::read(c, h)?.entries);
                    Ok(Flow::Consumed)
                })?,
                _ => return Ok(Flow::Skip),
            };
            if res.is_break() {
                return Ok(Flow::Stop);
            }
            Ok(Flow::Consumed)
        })?;

        Ok(meta)
    }

    pub fn exif_item_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.infos.iter().filter(|e| e.is_exif()).map(|e| e.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bbox::parse_full,
        testkit::{bbox, full_box, infe, IlocBuilder},
        BufCursor,
    };
    use test_case::test_case;

    fn meta_body(iinf_first: bool) -> Vec<u8> {
        let iloc = full_box(
            b"iloc",
            0,
            0,
            &IlocBuilder::new(0, 4, 4, 0, 0)
                .item(1, None, 0, &[(0, 0x200, 0x40)])
                .item(2, None, 0, &[(0, 0x300, 0x50)])
                .build(),
        );
        let iinf = full_box(
            b"iinf",
            0,
            0,
            &[
                2u16.to_be_bytes().to_vec(),
                infe(2, 1, b"hvc1", b"\0"),
                infe(2, 2, b"Exif", b"\0"),
            ]
            .concat(),
        );
        let hdlr = full_box(b"hdlr", 0, 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
        if iinf_first {
            [hdlr, iinf, bbox(b"pitm", &[0, 0, 0, 0, 0, 1]), iloc].concat()
        } else {
            [hdlr, iloc, iinf].concat()
        }
    }

    #[test_case(true)]
    #[test_case(false)]
    fn either_order(iinf_first: bool) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let data = full_box(b"meta", 0, 0, &meta_body(iinf_first));
        let mut c = BufCursor::from_vec(data);
        let mut meta = None;
        let res = parse_full(&mut c, "", |c, h| {
            meta = Some(MetaBox::read(c, h)?);
            Ok(Flow::Consumed)
        })
        .unwrap();
        assert!(res.is_continue());
        assert!(!c.has_remaining().unwrap());

        let meta = meta.unwrap();
        assert_eq!(meta.locations.len(), 2);
        assert_eq!(meta.infos.len(), 2);
        assert_eq!(meta.exif_item_ids().collect::<Vec<_>>(), [2]);
        assert_eq!(meta.locations[1].extent_offset_len(), Some((0x300, 0x50)));
    }

    #[test]
    fn children_cannot_over_read() {
        // iloc claims more bytes than meta holds
        let mut iloc = full_box(b"iloc", 0, 0, &[0x44, 0, 0, 0]);
        iloc[3] = 0x40;
        let data = full_box(b"meta", 0, 0, &iloc);
        let mut c = BufCursor::from_vec([data, vec![0; 64]].concat());
        let err = parse_full(&mut c, "", |c, h| {
            MetaBox::read(c, h)?;
            Ok(Flow::Consumed)
        })
        .unwrap_err();
        assert!(err.is_truncated());
    }
}
