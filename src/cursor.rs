use std::{
    fmt::Debug,
    io::{self, Read, Seek, SeekFrom},
    marker::PhantomData,
};

use nom::number::Endianness;

use crate::{
    endian::FromEndianBytes,
    error::{io_error_on, Error},
    skip::{Seekable, Skip, Unseekable},
};

/// A borrowed read position over a byte source, shared by every walker for
/// the duration of one parse call.
///
/// - Use [`ByteCursor::seekable`] for `Read + Seek` sources (files, in-memory
///   buffers). The stream length is recorded up front, so walkers know how
///   many bytes remain and can skip by seeking.
///
/// - Use [`ByteCursor::unseekable`] for sources that only implement `Read`.
///   Skipping falls back to reading and discarding, and the end of data is
///   detected with a one byte lookahead.
///
/// The TIFF walker, the HEIF extractor and JPEG Exif extraction need to jump
/// to absolute offsets and are therefore only available on seekable cursors.
pub struct ByteCursor<R, S = Seekable> {
    reader: R,
    pos: u64,
    len: Option<u64>,
    peeked: Option<u8>,
    phantom: PhantomData<S>,
}

/// A cursor over bytes already materialized in memory, e.g. a box body.
pub type BufCursor = ByteCursor<io::Cursor<Vec<u8>>, Seekable>;

impl<R, S: Skip<R>> Debug for ByteCursor<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCursor")
            .field("pos", &self.pos)
            .field("len", &self.len)
            .field("source", &S::debug())
            .finish_non_exhaustive()
    }
}

impl<R: Read + Seek> ByteCursor<R, Seekable> {
    /// Wraps `reader`, starting at its current position.
    pub fn seekable(mut reader: R) -> crate::Result<Self> {
        let pos = reader.stream_position()?;
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(pos))?;
        Ok(Self {
            reader,
            pos,
            len: Some(len),
            peeked: None,
            phantom: PhantomData,
        })
    }

    pub fn seek_absolute(&mut self, pos: u64) -> crate::Result<()> {
        self.pos = self.reader.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn seek_relative(&mut self, offset: i64) -> crate::Result<()> {
        let Some(pos) = self.pos.checked_add_signed(offset) else {
            return Err(Error::invalid(
                "seek offset",
                format!("{offset} from {} is out of range", self.pos),
            ));
        };
        self.seek_absolute(pos)
    }

    /// Total length of the underlying stream.
    pub fn len(&self) -> u64 {
        self.len.unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BufCursor {
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            reader: io::Cursor::new(data),
            pos: 0,
            len: Some(len),
            peeked: None,
            phantom: PhantomData,
        }
    }
}

impl<R: Read> ByteCursor<R, Unseekable> {
    pub fn unseekable(reader: R) -> Self {
        Self {
            reader,
            pos: 0,
            len: None,
            peeked: None,
            phantom: PhantomData,
        }
    }
}

impl<R: Read, S: Skip<R>> ByteCursor<R, S> {
    /// Number of bytes consumed so far (absolute offset for seekable
    /// sources).
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the end of the stream, if the length is known.
    pub fn remaining(&self) -> Option<u64> {
        self.len.map(|len| len.saturating_sub(self.pos))
    }

    /// Returns false once the source is exhausted.
    pub fn has_remaining(&mut self) -> crate::Result<bool> {
        if let Some(remaining) = self.remaining() {
            return Ok(remaining > 0);
        }
        if self.peeked.is_some() {
            return Ok(true);
        }

        let mut b = [0u8];
        loop {
            match self.reader.read(&mut b) {
                Ok(0) => return Ok(false),
                Ok(_) => {
                    self.peeked = Some(b[0]);
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Fills `buf` completely or fails with [`Error::Truncated`] naming
    /// `field`.
    pub fn read_exact(&mut self, buf: &mut [u8], field: &'static str) -> crate::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let n = buf.len() as u64;
        if self.remaining().is_some_and(|x| x < n) {
            return Err(Error::Truncated(field));
        }

        let rest = match self.peeked.take() {
            Some(b) => {
                buf[0] = b;
                &mut buf[1..]
            }
            None => buf,
        };
        self.reader
            .read_exact(rest)
            .map_err(|e| io_error_on(e, field))?;
        self.pos += n;
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> crate::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf, field)?;
        Ok(buf)
    }

    /// Reads exactly `n` bytes into a new buffer.
    ///
    /// The allocation never exceeds the bytes actually available, so a bogus
    /// size read from a corrupt file fails as a truncation instead.
    pub fn read_bytes(&mut self, n: u64, field: &'static str) -> crate::Result<Vec<u8>> {
        if self.remaining().is_some_and(|x| x < n) {
            return Err(Error::Truncated(field));
        }
        let Ok(len) = usize::try_from(n) else {
            return Err(Error::Truncated(field));
        };

        let mut buf = Vec::new();
        let mut rest = n;
        if len > 0 {
            if let Some(b) = self.peeked.take() {
                buf.push(b);
                rest -= 1;
            }
        }
        self.reader
            .by_ref()
            .take(rest)
            .read_to_end(&mut buf)
            .map_err(|e| io_error_on(e, field))?;
        if buf.len() != len {
            return Err(Error::Truncated(field));
        }
        self.pos += n;
        Ok(buf)
    }

    pub fn read_u8(&mut self, field: &'static str) -> crate::Result<u8> {
        let [b] = self.read_array::<1>(field)?;
        Ok(b)
    }

    pub fn read_u16(&mut self, endian: Endianness, field: &'static str) -> crate::Result<u16> {
        self.read_int(endian, field)
    }

    pub fn read_u32(&mut self, endian: Endianness, field: &'static str) -> crate::Result<u32> {
        self.read_int(endian, field)
    }

    pub fn read_u64(&mut self, endian: Endianness, field: &'static str) -> crate::Result<u64> {
        self.read_int(endian, field)
    }

    fn read_int<T: FromEndianBytes>(
        &mut self,
        endian: Endianness,
        field: &'static str,
    ) -> crate::Result<T> {
        let mut buf = [0u8; 8];
        let buf = &mut buf[..T::SIZE];
        self.read_exact(buf, field)?;
        T::from_endian_bytes(buf, endian).ok_or(Error::Truncated(field))
    }

    /// Moves past `n` bytes, by seeking when the source supports it and by
    /// discard-reading otherwise.
    pub fn skip(&mut self, n: u64, field: &'static str) -> crate::Result<()> {
        if n == 0 {
            return Ok(());
        }
        if self.remaining().is_some_and(|x| x < n) {
            return Err(Error::Truncated(field));
        }

        let mut rest = n;
        if self.peeked.take().is_some() {
            rest -= 1;
        }
        S::skip(&mut self.reader, rest).map_err(|e| io_error_on(e, field))?;
        self.pos += n;
        Ok(())
    }

    /// Materializes the next `n` bytes as an independent, bounded cursor.
    /// Nested structures parsed from it cannot over-read their parent.
    pub fn sub_cursor(&mut self, n: u64, field: &'static str) -> crate::Result<BufCursor> {
        let data = self.read_bytes(n, field)?;
        Ok(BufCursor::from_vec(data))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
