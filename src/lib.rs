//! A library for reading and writing tar and cpio archives
//!
//! This library provides the archive engine of a pax-like tool: a header
//! stream reader and writer abstracted over a reader or writer, and a set of
//! format plugins for the historical archive dialects (old tar, ustar, and
//! the odc, SVR4 and SVR4 crc cpio formats). Great strides are taken to
//! ensure that an archive is never required to be fully resident in memory;
//! all objects provide largely a streaming interface to read bytes from.
//!
//! Reading identifies the format from the start of the stream and recovers
//! from damaged headers by searching for the next valid one. Each recovery is
//! reported as a `Warning` on the archive's `Session`.

#![deny(missing_docs)]

use std::io;

pub use crate::archive::{Archive, Entries};
pub use crate::builder::{Builder, Outcome};
pub use crate::entry::{ArchiveEntry, Entry};
pub use crate::entry_type::EntryKind;
pub use crate::error::{Error, Result};
pub use crate::format::{Format, FormatDescriptor, TrailerCheck, TrailerStyle};
pub use crate::header::{HeaderBlock, OldHeader, UstarHeader};
pub use crate::registry::{FormatRegistry, Formats};
pub use crate::session::{Session, Warning};

/// Errors raised by field encoding and the format plugins.
pub mod error;

mod archive;
mod builder;
mod entry;
mod entry_type;
pub mod field;
pub mod format;
mod header;
mod registry;
mod session;

/// Size of a tar block; every tar header and data run is a multiple of it.
pub const BLOCK_SIZE: usize = 512;

fn other(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, msg)
}
