//! Header format plugins.
//!
//! Each archive dialect implements `Format`, turning raw header bytes into
//! `ArchiveEntry` values and back. The reader and writer never look at wire
//! bytes themselves; they only drive the plugin selected for the stream.

use std::fmt;
use std::io::Read;

use crate::error::Result;
use crate::ArchiveEntry;

mod cpio;
mod svr4;
mod tar;
mod ustar;

pub use self::cpio::Cpio;
pub use self::svr4::Svr4;
pub use self::tar::OldTar;
pub use self::ustar::Ustar;

/// POSIX.1-1988 ustar.
pub static USTAR: Ustar = Ustar;
/// Pre-POSIX (V7 / BSD) tar.
pub static TAR: OldTar = OldTar;
/// POSIX.1 octet-oriented cpio (`070707`).
pub static CPIO: Cpio = Cpio;
/// SVR4 portable cpio (`070701`).
pub static SV4CPIO: Svr4 = Svr4::NEWC;
/// SVR4 portable cpio with data checksums (`070702`).
pub static SV4CRC: Svr4 = Svr4::CRC;

/// How a format marks the end of its member list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrailerStyle {
    /// A header that decodes successfully but names a reserved member.
    InHeader,
    /// This many consecutive all-zero blocks.
    ZeroBlocks(u32),
}

/// Static facts about a format.
#[derive(Clone, Copy, Debug)]
pub struct FormatDescriptor {
    /// Historical name, as accepted by `FormatRegistry::by_name`.
    pub name: &'static str,
    /// Size of the fixed part of a header in bytes.
    pub header_size: usize,
    /// Member data is padded to a multiple of this many bytes.
    pub data_align: u64,
    /// How the end of the archive is marked.
    pub trailer: TrailerStyle,
    /// Whether hard links are recognized by dev/ino pairs and need the
    /// caller's link table, rather than being stored as named links.
    pub link_table: bool,
    /// Whether headers carry a checksum of the member data.
    pub data_checksum: bool,
}

/// Outcome of asking a format whether a block that failed to decode ends
/// the archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrailerCheck {
    /// The trailer is complete; the archive ends here.
    Trailer,
    /// The block may still hold part of a header.
    NotTrailer,
    /// No header can start anywhere in this block; discard all of it.
    Unparseable,
}

/// An archive header dialect.
///
/// Implementations are stateless and shared as `&'static dyn Format`.
pub trait Format: Sync {
    /// Static facts about this format.
    fn descriptor(&self) -> &'static FormatDescriptor;

    /// Returns true only if `block` starts with a header of exactly this
    /// format, with consistent magic and checksum.
    ///
    /// `block` holds everything buffered so far, which may be shorter than
    /// `header_size`. Formats that other formats extend must reject the
    /// more specific dialect's headers.
    fn identify(&self, block: &[u8]) -> bool;

    /// Decodes the header at the start of `block`, which is exactly
    /// `header_size` bytes long.
    ///
    /// Formats whose headers continue past the fixed part (cpio names)
    /// read the remainder from `rest`. The returned entry has `skip` and
    /// `pad` set to the data bytes that follow.
    fn decode(&self, block: &[u8], rest: &mut dyn Read) -> Result<ArchiveEntry>;

    /// Encodes `entry` into the complete header byte sequence.
    ///
    /// On success `entry.skip` holds how many bytes of member data the
    /// writer must copy after the header and `entry.pad` the zero bytes that
    /// follow them. An entry the format cannot store is rejected with an
    /// error for which `is_entry_local` is true.
    fn encode(&self, entry: &mut ArchiveEntry) -> Result<Vec<u8>>;

    /// Examines a block that failed to decode, counting consecutive
    /// all-zero blocks in `zero_run`.
    ///
    /// Must never report `Trailer` while `in_resync` is set.
    fn trailer_check(&self, block: &[u8], in_resync: bool, zero_run: &mut u32) -> TrailerCheck {
        let _ = (block, in_resync, zero_run);
        TrailerCheck::NotTrailer
    }

    /// Returns whether a successfully decoded entry is the in-header
    /// trailer.
    fn is_trailer(&self, entry: &ArchiveEntry) -> bool {
        let _ = entry;
        false
    }

    /// The bytes written after the last member.
    fn trailer(&self) -> Result<Vec<u8>>;
}

impl fmt::Debug for dyn Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

/// Error for an entry whose kind `format` cannot store.
pub(crate) fn unsupported(format: &'static str, entry: &ArchiveEntry) -> crate::Error {
    crate::Error::UnsupportedKind { format, kind: entry.kind }
}
