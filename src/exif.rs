//! TIFF/Exif image file directory walker.
//!
//! A TIFF stream starts with an 8-byte header (byte order, tag mark, offset of
//! IFD0) followed by a singly-linked chain of IFDs. All offsets are relative
//! to the start of the header, which may sit anywhere in the byte source (for
//! example right after `"Exif\0\0"` in a JPEG APP1 segment).
//!
//! Sub-IFDs referenced by [`ExifTag::ExifOffset`] or [`ExifTag::GPSInfo`] are
//! delivered as ordinary `LONG` entries and not followed; callers can walk
//! them with [`parse_ifd`].

use std::{
    io::{Read, Seek},
    ops::ControlFlow,
};

use crate::{ByteCursor, Seekable};

pub use header::TiffHeader;
pub use ifd::{parse_ifd, FieldEntry, ImageFileDirectory};
pub use tags::ExifTag;

pub(crate) use header::{check_exif_header, EXIF_IDENT};

mod header;
mod ifd;
mod tags;

/// Walks the TIFF stream starting at the cursor position, delivering every
/// entry of every IFD in the chain to `handler`.
///
/// Returns `Break` if the handler asked to stop.
#[tracing::instrument(skip_all)]
pub fn walk<R, F>(
    cursor: &mut ByteCursor<R, Seekable>,
    mut handler: F,
) -> crate::Result<ControlFlow<()>>
where
    R: Read + Seek,
    F: FnMut(FieldEntry) -> ControlFlow<()>,
{
    travel(cursor, |visit| match visit {
        Visit::Entry(entry) => handler(entry),
        Visit::IfdEnd { .. } => ControlFlow::Continue(()),
    })
}

/// Like [`walk`], for callers that have no use for an early stop.
pub fn parse<R, F>(cursor: &mut ByteCursor<R, Seekable>, handler: F) -> crate::Result<()>
where
    R: Read + Seek,
    F: FnMut(FieldEntry) -> ControlFlow<()>,
{
    walk(cursor, handler).map(|_| ())
}

/// Collects the whole IFD chain.
pub fn read_ifds<R: Read + Seek>(
    cursor: &mut ByteCursor<R, Seekable>,
) -> crate::Result<Vec<ImageFileDirectory>> {
    let mut ifds = Vec::new();
    let mut entries = Vec::new();
    let _ = travel(cursor, |visit| {
        match visit {
            Visit::Entry(entry) => entries.push(entry),
            Visit::IfdEnd { index, next_offset } => ifds.push(ImageFileDirectory {
                index,
                entries: std::mem::take(&mut entries),
                next_offset,
            }),
        }
        ControlFlow::Continue(())
    })?;
    Ok(ifds)
}

enum Visit {
    Entry(FieldEntry),
    IfdEnd { index: u32, next_offset: u32 },
}

fn travel<R, F>(cursor: &mut ByteCursor<R, Seekable>, mut visit: F) -> crate::Result<ControlFlow<()>>
where
    R: Read + Seek,
    F: FnMut(Visit) -> ControlFlow<()>,
{
    let origin = cursor.position();
    let header = TiffHeader::read(cursor)?;
    tracing::debug!(?header, origin);

    let mut offset = header.ifd0_offset;
    let mut index = 0u32;
    // TODO: remember visited offsets so a looping chain ends with an error
    while offset != 0 {
        cursor.seek_absolute(origin + u64::from(offset))?;
        let next = match parse_ifd(cursor, header.endian, origin, index, |e| visit(Visit::Entry(e)))? {
            ControlFlow::Continue(next) => next,
            ControlFlow::Break(()) => return Ok(ControlFlow::Break(())),
        };
        if visit(Visit::IfdEnd {
            index,
            next_offset: next,
        })
        .is_break()
        {
            return Ok(ControlFlow::Break(()));
        }
        offset = next;
        index = index.saturating_add(1);
    }

    Ok(ControlFlow::Continue(()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use nom::number::Endianness;
    use test_case::test_case;

    use super::*;
    use crate::{
        error::Error,
        testkit::{tiff, TiffField},
        EntryValue, FieldType,
    };

    fn collect(data: Vec<u8>) -> crate::Result<Vec<FieldEntry>> {
        let mut c = ByteCursor::seekable(Cursor::new(data))?;
        let mut entries = Vec::new();
        parse(&mut c, |e| {
            entries.push(e);
            ControlFlow::Continue(())
        })?;
        Ok(entries)
    }

    #[test]
    fn ascii_round_trip() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let data = tiff(Endianness::Big, &[vec![TiffField::ascii(0x010f, "abc")]]);
        let entries = collect(data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].ifd_index, 0);
        assert_eq!(entries[0].tag, 0x010f);
        assert_eq!(entries[0].field_type, FieldType::Ascii);
        assert_eq!(entries[0].value, b"abc\0");
    }

    #[test_case(Endianness::Little)]
    #[test_case(Endianness::Big)]
    fn byte_order(endian: Endianness) {
        let data = tiff(
            endian,
            &[vec![
                TiffField::longs(endian, 0x0100, &[4032]),
                TiffField::shorts(endian, 0x0101, &[3024]),
                TiffField::rationals(endian, 0x011a, &[(72, 1)]),
            ]],
        );
        let entries = collect(data).unwrap();
        let values = entries
            .iter()
            .map(|e| e.decode().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            [
                EntryValue::U32(4032),
                EntryValue::U16(3024),
                EntryValue::URational((72, 1).into()),
            ]
        );
    }

    #[test]
    fn chain() {
        let data = tiff(
            Endianness::Little,
            &[
                vec![
                    TiffField::ascii(0x010f, "Apple"),
                    TiffField::ascii(0x0110, "iPhone 12 Pro"),
                ],
                vec![TiffField::longs(Endianness::Little, 0x0201, &[1024])],
            ],
        );
        let entries = collect(data.clone()).unwrap();
        assert_eq!(
            entries
                .iter()
                .map(|e| (e.ifd_index, e.exif_tag()))
                .collect::<Vec<_>>(),
            [
                (0, Some(ExifTag::Make)),
                (0, Some(ExifTag::Model)),
                (1, Some(ExifTag::ThumbnailOffset)),
            ]
        );

        let mut c = ByteCursor::seekable(Cursor::new(data)).unwrap();
        let ifds = read_ifds(&mut c).unwrap();
        assert_eq!(ifds.len(), 2);
        assert_eq!(ifds[0].index, 0);
        assert_eq!(ifds[0].entries.len(), 2);
        assert_ne!(ifds[0].next_offset, 0);
        assert_eq!(ifds[1].index, 1);
        assert_eq!(ifds[1].entries.len(), 1);
        assert_eq!(ifds[1].next_offset, 0);
    }

    #[test]
    fn offsets_are_relative_to_header() {
        let mut data = b"junk".to_vec();
        data.extend(tiff(
            Endianness::Big,
            &[vec![TiffField::ascii(0x010e, "not at file start")]],
        ));
        let mut c = ByteCursor::seekable(Cursor::new(data)).unwrap();
        c.seek_absolute(4).unwrap();
        let mut value = Vec::new();
        parse(&mut c, |e| {
            value = e.value;
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(value, b"not at file start\0");
    }

    #[test]
    fn stop_ends_the_chain() {
        let data = tiff(
            Endianness::Big,
            &[
                vec![TiffField::ascii(0x010f, "A")],
                vec![TiffField::ascii(0x0110, "B")],
            ],
        );
        let mut c = ByteCursor::seekable(Cursor::new(data)).unwrap();
        let mut calls = 0;
        let res = walk(&mut c, |_| {
            calls += 1;
            ControlFlow::Break(())
        })
        .unwrap();
        assert!(res.is_break());
        assert_eq!(calls, 1);
    }

    #[test]
    fn invalid_header() {
        let err = collect(b"XX\x00\x2a\0\0\0\x08".to_vec()).unwrap_err();
        assert!(matches!(err, Error::Invalid { field: "byte order", .. }));
    }

    #[test]
    fn truncated_directory() {
        let mut data = tiff(
            Endianness::Big,
            &[vec![
                TiffField::ascii(0x010f, "A"),
                TiffField::ascii(0x0110, "B"),
            ]],
        );
        data.truncate(8 + 2 + 12 + 5);
        assert!(collect(data).unwrap_err().is_truncated());
    }

    #[test]
    fn empty_chain() {
        let entries = collect(b"MM\x00\x2a\0\0\0\0".to_vec()).unwrap();
        assert!(entries.is_empty());
    }
}
