use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// End of data while reading the named field.
    #[error("no enough bytes for '{0}'")]
    Truncated(&'static str),

    /// Magic mismatch, illegal size/version/width, wrong first marker, etc.
    #[error("'{field}' is invalid; {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("io error; {0}")]
    Io(io::Error),
}

impl Error {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Error {
        Error::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Returns true if more bytes were required than the source had.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Error::Truncated(_))
    }

    /// Returns true if the data was present but does not follow the format.
    pub fn is_invalid(&self) -> bool {
        matches!(self, Error::Invalid { .. })
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        if value.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated("data")
        } else {
            Error::Io(value)
        }
    }
}

/// Maps an I/O failure on a known field, so truncation names that field.
pub(crate) fn io_error_on(e: io::Error, field: &'static str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated(field)
    } else {
        Error::Io(e)
    }
}

pub(crate) fn convert_parse_error(e: nom::Err<nom::error::Error<&[u8]>>, field: &'static str) -> Error {
    match e {
        nom::Err::Incomplete(_) => Error::Truncated(field),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            Error::invalid(field, e.code.description().to_owned())
        }
    }
}
