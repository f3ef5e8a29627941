use std::fmt;
use std::slice;

use crate::format::{self, Format};

/// An ordered list of formats to try when identifying an archive.
///
/// Order matters: a general format can accept headers of a more specific
/// one (every ustar header is also a well-formed old tar header, apart from
/// the magic), so the specific formats come first.
#[derive(Clone)]
pub struct FormatRegistry {
    formats: Vec<&'static dyn Format>,
}

impl FormatRegistry {
    /// Creates a registry probing `formats` in the given order.
    pub fn new(formats: Vec<&'static dyn Format>) -> FormatRegistry {
        FormatRegistry { formats }
    }

    /// Looks up a built-in format by its historical name: `ustar`, `tar`,
    /// `cpio`, `sv4cpio` or `sv4crc`.
    pub fn by_name(name: &str) -> Option<&'static dyn Format> {
        FormatRegistry::default()
            .iter()
            .find(|f| f.descriptor().name == name)
    }

    /// Returns the first format, in priority order, that identifies the
    /// start of `bytes`.
    pub fn probe(&self, bytes: &[u8]) -> Option<&'static dyn Format> {
        self.iter().find(|f| f.identify(bytes))
    }

    /// Smallest header size of any registered format; probing needs at least
    /// this many bytes.
    pub fn min_header_size(&self) -> usize {
        self.formats
            .iter()
            .map(|f| f.descriptor().header_size)
            .min()
            .unwrap_or(crate::BLOCK_SIZE)
    }

    /// Iterates over the formats in priority order.
    pub fn iter(&self) -> Formats {
        Formats { inner: self.formats.iter() }
    }
}

impl Default for FormatRegistry {
    /// All built-in formats: ustar, tar, sv4crc, sv4cpio, cpio.
    fn default() -> FormatRegistry {
        FormatRegistry::new(vec![
            &format::USTAR,
            &format::TAR,
            &format::SV4CRC,
            &format::SV4CPIO,
            &format::CPIO,
        ])
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.formats.iter()).finish()
    }
}

/// Iterator over the formats of a `FormatRegistry`.
pub struct Formats<'a> {
    inner: slice::Iter<'a, &'static dyn Format>,
}

impl<'a> Iterator for Formats<'a> {
    type Item = &'static dyn Format;

    fn next(&mut self) -> Option<&'static dyn Format> {
        self.inner.next().copied()
    }
}
