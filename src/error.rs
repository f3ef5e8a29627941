use std::io;

use crate::EntryKind;

/// Errors produced while encoding or decoding archive headers.
///
/// The first group of variants (`Overflow`, `NameTooLong` and
/// `UnsupportedKind`) only ever concern a single entry: a writer reports
/// them, skips the entry and carries on. `Format` means a block did not
/// parse as a header of the active format and sends the reader into its
/// resync search. `StreamFault` and `UnknownFormat` are fatal to the whole
/// operation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A numeric value does not fit in its fixed-width header field.
    #[error("value {value:#o} does not fit in a {width} byte header field")]
    Overflow {
        /// The value that was being encoded.
        value: u64,
        /// Width of the field in bytes, terminator included.
        width: usize,
    },

    /// A path or link name exceeds what the format can store.
    #[error("name too long ({len} bytes, at most {max} fit): {name}")]
    NameTooLong {
        /// Lossy rendering of the offending name.
        name: String,
        /// Length of the name in bytes.
        len: usize,
        /// Maximum length the field (or field pair) accepts.
        max: usize,
    },

    /// The entry kind has no representation in the format.
    #[error("{format} cannot archive a {kind}")]
    UnsupportedKind {
        /// Name of the format that rejected the entry.
        format: &'static str,
        /// The rejected kind.
        kind: EntryKind,
    },

    /// A block failed format-specific validation.
    #[error("invalid {format} header: {reason}")]
    Format {
        /// Name of the format doing the validation.
        format: &'static str,
        /// What was wrong with the block.
        reason: &'static str,
    },

    /// The underlying stream failed and could not be resynchronized.
    #[error("archive stream fault: {0}")]
    StreamFault(#[source] io::Error),

    /// No registered format matched anywhere in the input.
    #[error("unable to determine archive format")]
    UnknownFormat,

    /// Any other I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A specialized `Result` type for header codec operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns whether this error only concerns the entry being encoded, in
    /// which case the entry is skipped and the archive stays usable.
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self,
            Error::Overflow { .. } | Error::NameTooLong { .. } | Error::UnsupportedKind { .. }
        )
    }

    pub(crate) fn name_too_long(name: &[u8], max: usize) -> Error {
        Error::NameTooLong {
            name: String::from_utf8_lossy(name).into_owned(),
            len: name.len(),
            max,
        }
    }

    pub(crate) fn format(format: &'static str, reason: &'static str) -> Error {
        Error::Format { format, reason }
    }
}

impl From<Error> for io::Error {
    fn from(t: Error) -> io::Error {
        match t {
            Error::Io(e) => e,
            Error::StreamFault(e) => io::Error::new(e.kind(), Error::StreamFault(e)),
            Error::UnknownFormat => io::Error::new(io::ErrorKind::InvalidData, t),
            Error::Format { .. } => io::Error::new(io::ErrorKind::InvalidData, t),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}
