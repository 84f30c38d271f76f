//! metawalk is a streaming decoder for the metadata framing of three nested
//! binary media-container formats, written in Rust with
//! [nom](https://github.com/rust-bakery/nom):
//!
//! - JPEG marker streams ([`jpeg`])
//! - TIFF/Exif image file directories ([`exif`])
//! - ISO base media file format boxes ([`bbox`]), and the HEIF item
//!   structure built on them ([`heif`])
//!
//! Pixel data is never decoded. Scan data and item extents are either skipped
//! or handed back as byte ranges.
//!
//! ## Key Features
//!
//! - Handler driven: every walker delivers one decoded record at a time to a
//!   caller-supplied closure, which decides whether it consumed the body
//!   ([`Flow::Consumed`]), wants it skipped ([`Flow::Skip`]), or wants the
//!   whole walk to end ([`Flow::Stop`]). A stop is not an error.
//!
//! - Exact positioning: after each handler call the [`ByteCursor`] is left
//!   exactly at the start of the next record, whatever the handler did.
//!
//! - Seekable and unseekable sources: use [`ByteCursor::seekable`] for files
//!   and in-memory buffers, [`ByteCursor::unseekable`] for pipes. Skipping is
//!   a seek for the former and a discard-read for the latter.
//!
//! - Robustness: a truncated source always fails with
//!   [`Error::Truncated`] naming the field being read, and allocations are
//!   bounded by the bytes actually available.
//!
//! ## Usage
//!
//! ```rust
//! use metawalk::{jpeg, ByteCursor, Flow};
//! use std::io::Cursor;
//!
//! fn main() -> metawalk::Result<()> {
//!     // SOI, COM "hi", EOI
//!     let data = vec![0xFF, 0xD8, 0xFF, 0xFE, 0x00, 0x04, b'h', b'i', 0xFF, 0xD9];
//!     let mut cursor = ByteCursor::seekable(Cursor::new(data))?;
//!
//!     let mut seen = Vec::new();
//!     jpeg::parse(&mut cursor, |_, segment| {
//!         seen.push(segment.code);
//!         Ok(Flow::Skip)
//!     })?;
//!
//!     assert_eq!(
//!         seen,
//!         [jpeg::MarkerCode::Soi, jpeg::MarkerCode::Com, jpeg::MarkerCode::Eoi]
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Exif fields embedded in a HEIF file:
//!
//! ```rust,no_run
//! use metawalk::{heif, ByteCursor, ExifTag};
//! use std::{fs::File, ops::ControlFlow};
//!
//! fn main() -> metawalk::Result<()> {
//!     let mut cursor = ByteCursor::seekable(File::open("./photo.heic")?)?;
//!     heif::parse_exif(&mut cursor, |entry| {
//!         if entry.tag == ExifTag::Make.code() {
//!             println!("{}", entry.decode().map(|v| v.to_string()).unwrap_or_default());
//!             return ControlFlow::Break(());
//!         }
//!         ControlFlow::Continue(())
//!     })?;
//!     Ok(())
//! }
//! ```

pub use bbox::{BoxHeader, FullBoxHeader};
pub use cursor::{BufCursor, ByteCursor};
pub use error::Error;
pub use exif::{ExifTag, FieldEntry, ImageFileDirectory, TiffHeader};
pub use heif::HeifMeta;
pub use jpeg::{MarkerCode, MarkerSegment};
pub use skip::{Seekable, Skip, Unseekable};
pub use values::{EntryValue, FieldType, IRational, ParseEntryError, Rational, URational};

pub mod bbox;
pub mod endian;
pub mod exif;
pub mod heif;
pub mod jpeg;

mod cursor;
mod error;
mod skip;
mod utils;
mod values;

#[cfg(test)]
mod testkit;

pub type Result<T> = std::result::Result<T, Error>;

/// What a marker or box handler did with the record it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The handler read the body itself and left the cursor at its end.
    Consumed,

    /// The handler did not touch the body; the walker skips it.
    Skip,

    /// End the whole walk now. The position of the cursor is unspecified.
    Stop,
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, ops::ControlFlow};

    use nom::number::Endianness;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::testkit::{heif as heif_file, jpeg_segment, tiff, TiffField};

    /// Stops a walk after a fixed number of entries, so a looping IFD chain
    /// produced by a mutation can't hang the test.
    fn bounded() -> impl FnMut(FieldEntry) -> ControlFlow<()> {
        let mut n = 0;
        move |e| {
            let _ = e.decode();
            n += 1;
            if n > 1000 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    fn walk_all(data: &[u8]) {
        if let Ok(mut c) = ByteCursor::seekable(Cursor::new(data)) {
            let _ = jpeg::parse_with_scan(&mut c, |_, _| Ok(Flow::Skip));
        }
        let _ = jpeg::parse_exif(&mut ByteCursor::unseekable(data), bounded());
        if let Ok(mut c) = ByteCursor::seekable(Cursor::new(data)) {
            let _ = exif::walk(&mut c, bounded());
        }
        if let Ok(mut c) = ByteCursor::seekable(Cursor::new(data)) {
            let _ = heif::parse_exif(&mut c, bounded());
        }
        let _ = heif::read_meta(&mut ByteCursor::unseekable(data));
    }

    fn samples() -> Vec<Vec<u8>> {
        let tiff = tiff(
            Endianness::Little,
            &[vec![
                TiffField::ascii(0x010f, "Apple"),
                TiffField::shorts(Endianness::Little, 0x0112, &[1]),
                TiffField::rationals(Endianness::Little, 0x011a, &[(72, 1)]),
            ]],
        );
        let exif_item = [b"Exif\0\0".as_slice(), tiff.as_slice()].concat();
        let jpeg = [
            vec![0xFF, 0xD8],
            jpeg_segment(0xE1, &exif_item),
            jpeg_segment(0xDA, &[1, 1, 0, 0, 0x3f, 0]),
            vec![0x12, 0xFF, 0x00, 0x34, 0xFF, 0xD0, 0xFF, 0xD9],
        ]
        .concat();
        vec![jpeg, heif_file(&exif_item, false), tiff]
    }

    #[test]
    fn random_input_never_panics() {
        let mut rng = StdRng::seed_from_u64(0x6d657461);
        for _ in 0..500 {
            let len = rng.gen_range(0..256);
            let data = (0..len).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();
            walk_all(&data);
        }
    }

    #[test]
    fn mutated_samples_never_panic() {
        let mut rng = StdRng::seed_from_u64(42);
        for sample in samples() {
            walk_all(&sample);
            for _ in 0..300 {
                let mut data = sample.clone();
                for _ in 0..rng.gen_range(1..5) {
                    let i = rng.gen_range(0..data.len());
                    data[i] = rng.gen();
                }
                if rng.gen_bool(0.2) {
                    data.truncate(rng.gen_range(0..data.len()));
                }
                walk_all(&data);
            }
        }
    }

    #[cfg(feature = "json_dump")]
    #[test]
    fn json_dump() {
        let segment = MarkerSegment {
            code: MarkerCode::App1,
            size: 10,
        };
        assert_eq!(
            serde_json::to_string(&segment).unwrap(),
            r#"{"code":"App1","size":10}"#
        );

        let value = EntryValue::URational((72, 1).into());
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#""72/1 (72.0000)""#
        );

        let data = tiff(Endianness::Big, &[vec![TiffField::ascii(0x010f, "abc")]]);
        let mut c = ByteCursor::seekable(Cursor::new(data)).unwrap();
        let ifds = exif::read_ifds(&mut c).unwrap();
        let json = serde_json::to_value(&ifds).unwrap();
        assert_eq!(json[0]["entries"][0]["tag"], 0x010f);
        assert_eq!(json[0]["entries"][0]["field_type"], "Ascii");
        assert_eq!(json[0]["next_offset"], 0);
    }
}
