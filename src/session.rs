use std::fmt;

/// A recoverable condition met while reading or writing an archive.
///
/// Warnings never stop the operation that raised them. Each one is logged
/// through the `log` facade as it happens and kept on the `Session` in
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Warning {
    /// The first bytes matched no known format; a byte-by-byte search began.
    FormatSearch,
    /// A block failed to decode as a header; a byte-by-byte search began.
    InvalidHeader,
    /// The underlying stream reported an error and a recovery was attempted.
    IoRecovery,
    /// The input ended partway through a header or before any trailer.
    PrematureEof,
    /// The input ended before any format could be identified.
    UnknownFormat,
    /// An entry was left out of the archive being written.
    Skipped {
        /// Name of the entry.
        name: String,
        /// Why the format rejected it.
        reason: String,
    },
    /// The data source did not supply the number of bytes the header
    /// declared.
    ChangedSize {
        /// Name of the entry.
        name: String,
        /// Size written in the header.
        expected: u64,
        /// Bytes actually supplied.
        actual: u64,
    },
    /// Member data did not match the checksum stored in its header.
    ChecksumMismatch {
        /// Name of the entry.
        name: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::FormatSearch => f.write_str("cannot identify format, searching"),
            Warning::InvalidHeader => f.write_str("invalid header, starting valid header search"),
            Warning::IoRecovery => f.write_str("archive I/O error, trying to recover"),
            Warning::PrematureEof => f.write_str("premature end of archive"),
            Warning::UnknownFormat => f.write_str("cannot identify format"),
            Warning::Skipped { name, reason } => write!(f, "{}: skipped: {}", name, reason),
            Warning::ChangedSize { name, expected, actual } => write!(
                f,
                "{}: file changed size ({} bytes expected, {} supplied)",
                name, expected, actual
            ),
            Warning::ChecksumMismatch { name } => {
                write!(f, "{}: data checksum mismatch", name)
            }
        }
    }
}

/// Counters and warnings for one archive operation.
///
/// A session is owned by the `Archive` or `Builder` driving the operation
/// and can be handed from one to the next, for example to keep a single
/// tally across reading an archive and appending to it.
#[derive(Clone, Debug, Default)]
pub struct Session {
    files: u64,
    skipped: u64,
    resync_bytes: u64,
    faults: u32,
    warnings: Vec<Warning>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Session {
        Session::default()
    }

    /// Headers successfully read or written.
    pub fn files(&self) -> u64 {
        self.files
    }

    /// Entries the writer rejected and left out.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Single-byte shifts performed while searching for a valid header.
    pub fn resync_bytes(&self) -> u64 {
        self.resync_bytes
    }

    /// Stream-level recoveries consumed.
    pub fn faults(&self) -> u32 {
        self.faults
    }

    /// Every warning raised so far, oldest first.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn warn(&mut self, warning: Warning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub(crate) fn add_file(&mut self) {
        self.files += 1;
    }

    pub(crate) fn add_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn add_resync_byte(&mut self) {
        self.resync_bytes += 1;
    }

    pub(crate) fn add_fault(&mut self) -> u32 {
        self.faults += 1;
        self.faults
    }
}
