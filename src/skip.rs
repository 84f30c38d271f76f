use std::io::{self, Read, Seek};

/// How a [`ByteCursor`](crate::ByteCursor) moves past bytes it does not need.
pub trait Skip<R> {
    /// Skip the given number of bytes, failing with `UnexpectedEof` if the
    /// source ends first.
    fn skip(reader: &mut R, skip: u64) -> io::Result<()>;

    fn debug() -> &'static str;
}

/// Marker for sources that implement `Seek`: skipping is a relative seek.
#[derive(Debug, Clone, Copy)]
pub struct Seekable;

/// Marker for sources that only implement `Read`: skipping is a discard-read.
#[derive(Debug, Clone, Copy)]
pub struct Unseekable;

impl<R: Read> Skip<R> for Unseekable {
    #[inline]
    fn skip(reader: &mut R, skip: u64) -> io::Result<()> {
        match io::copy(&mut reader.by_ref().take(skip), &mut io::sink()) {
            Ok(x) => {
                if x == skip {
                    Ok(())
                } else {
                    Err(io::ErrorKind::UnexpectedEof.into())
                }
            }
            Err(e) => Err(e),
        }
    }

    fn debug() -> &'static str {
        "unseekable"
    }
}

impl<R: Seek> Skip<R> for Seekable {
    #[inline]
    fn skip(reader: &mut R, skip: u64) -> io::Result<()> {
        let skip = i64::try_from(skip)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "skip is too large"))?;
        reader.seek_relative(skip)
    }

    fn debug() -> &'static str {
        "seekable"
    }
}
