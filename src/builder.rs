use std::fs;
use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;

use crate::entry::byte_sum;
use crate::error::Error;
use crate::format::Format;
use crate::session::{Session, Warning};
use crate::{other, Archive, ArchiveEntry, EntryKind};

/// A structure for building archives
///
/// This structure has methods for building up an archive from scratch into any
/// arbitrary writer, in any of the supported formats.
pub struct Builder<W: Write> {
    format: &'static dyn Format,
    omit_dirs: bool,
    finished: bool,
    written: u64,
    session: Session,
    obj: Option<W>,
}

/// What became of an entry passed to `Builder::append`.
#[derive(Debug)]
pub enum Outcome {
    /// The header and data were written.
    Written,
    /// The entry is a directory and directories are being omitted.
    Omitted,
    /// The format cannot represent the entry; nothing was written and the
    /// archive can still be appended to.
    Skipped(Error),
}

impl<W: Write> Builder<W> {
    /// Create a new archive builder writing `format` to the underlying
    /// object.
    pub fn new(obj: W, format: &'static dyn Format) -> Builder<W> {
        Builder::with_session(obj, format, Session::new())
    }

    /// Like `new`, recording counters and warnings on `session`.
    pub fn with_session(obj: W, format: &'static dyn Format, session: Session) -> Builder<W> {
        Builder {
            format,
            omit_dirs: false,
            finished: false,
            written: 0,
            session,
            obj: Some(obj),
        }
    }

    fn inner(&mut self) -> io::Result<&mut W> {
        self.obj
            .as_mut()
            .ok_or_else(|| other("archive builder already consumed"))
    }

    /// Leave directories out of the archive. Defaults to false.
    pub fn omit_directories(&mut self, omit: bool) {
        self.omit_dirs = omit;
    }

    /// The format being written.
    pub fn format(&self) -> &'static dyn Format {
        self.format
    }

    /// Counters and warnings for this archive so far.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Unwrap this archive, returning the underlying object.
    ///
    /// This function will finish writing the archive if the `finish` function
    /// hasn't yet been called, returning any I/O error which happens during
    /// that operation.
    pub fn into_inner(mut self) -> io::Result<W> {
        if !self.finished {
            self.finish()?;
        }
        self.obj
            .take()
            .ok_or_else(|| other("archive builder already consumed"))
    }

    /// Adds a new entry to this archive.
    ///
    /// The header for `entry` is written, followed by `entry.size` bytes
    /// copied from `data` and the padding the format requires. Only regular
    /// files carry data; `data` is not read for any other kind.
    ///
    /// If `data` ends early the rest of the member is filled with zeros, a
    /// `ChangedSize` warning is recorded and the archive stays well-formed.
    /// Formats that store a data checksum in the header read all of `data`
    /// into memory before writing anything.
    ///
    /// # Errors
    ///
    /// Entries the format cannot represent (a name too long, a number too
    /// wide for its field, an unsupported kind) are not errors: they are
    /// reported as `Outcome::Skipped` and recorded on the session. An error
    /// is returned only for I/O failures, after which the archive is
    /// unusable.
    ///
    /// # Examples
    ///
    /// ```
    /// use pax_engine::{format, ArchiveEntry, Builder};
    ///
    /// let mut ar = Builder::new(Vec::new(), &format::USTAR);
    /// let data: &[u8] = &[1, 2, 3, 4];
    /// ar.append(&ArchiveEntry::file(b"foo", 4), data).unwrap();
    /// let data = ar.into_inner().unwrap();
    /// assert_eq!(data.len(), 512 * 4);
    /// ```
    pub fn append<R: Read>(&mut self, entry: &ArchiveEntry, mut data: R) -> io::Result<Outcome> {
        let mut entry = entry.clone();
        if self.omit_dirs && entry.kind == EntryKind::Directory {
            log::debug!("omitting directory {}", entry.display_name());
            return Ok(Outcome::Omitted);
        }

        // The data sum goes in the header, so the data is read first. The
        // header is checked beforehand so an entry that cannot be stored is
        // skipped without touching its data.
        let mut buffered = None;
        if self.format.descriptor().data_checksum && entry.kind == EntryKind::Regular {
            entry.checksum = Some(0);
            if let Err(e) = self.format.encode(&mut entry.clone()) {
                return self.reject(&entry, e);
            }
            let mut buf = Vec::new();
            (&mut data).take(entry.size).read_to_end(&mut buf)?;
            // A short source is zero filled below, which adds nothing to
            // the sum.
            entry.checksum = Some(byte_sum(&buf));
            buffered = Some(buf);
        }

        let header = match self.format.encode(&mut entry) {
            Ok(header) => header,
            Err(e) => return self.reject(&entry, e),
        };

        let (skip, pad) = (entry.skip, entry.pad);
        let dst = self.inner()?;
        let copied = match buffered {
            Some(buf) => write_member(dst, &header, &buf[..], skip, pad)?,
            None => write_member(dst, &header, &mut data, skip, pad)?,
        };
        if copied < skip {
            self.changed_size(&entry, copied);
        }
        log::debug!(
            "{}: wrote {} ({} bytes)",
            self.format.descriptor().name,
            entry.display_name(),
            skip
        );
        self.session.add_file();
        self.written += 1;
        Ok(Outcome::Written)
    }

    /// Adds a file on the local filesystem to this archive under `name`.
    ///
    /// The entry's metadata is taken from the file and its contents are
    /// copied as the member data.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use pax_engine::{format, Builder};
    ///
    /// let mut ar = Builder::new(Vec::new(), &format::SV4CPIO);
    ///
    /// // Open the file at one location, but insert it into the archive with a
    /// // different name.
    /// let mut f = File::open("foo/bar/baz.txt").unwrap();
    /// ar.append_file(b"bar/baz.txt", &mut f).unwrap();
    /// ```
    pub fn append_file(&mut self, name: &[u8], file: &mut fs::File) -> io::Result<Outcome> {
        let meta = file.metadata()?;
        let entry = ArchiveEntry::from_metadata(name, &meta);
        self.append(&entry, file)
    }

    /// Finish writing this archive, emitting the format's trailer.
    ///
    /// An archive that received no members gets no trailer. This function is
    /// called automatically when the builder is dropped, where errors are
    /// ignored.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.written > 0 {
            let trailer = self.format.trailer()?;
            self.inner()?.write_all(&trailer)?;
        }
        self.inner()?.flush()
    }

    fn reject(&mut self, entry: &ArchiveEntry, e: Error) -> io::Result<Outcome> {
        if !e.is_entry_local() {
            return Err(e.into());
        }
        self.session.warn(Warning::Skipped {
            name: entry.display_name(),
            reason: e.to_string(),
        });
        self.session.add_skipped();
        Ok(Outcome::Skipped(e))
    }

    fn changed_size(&mut self, entry: &ArchiveEntry, actual: u64) {
        self.session.warn(Warning::ChangedSize {
            name: entry.display_name(),
            expected: entry.skip.max(entry.size),
            actual,
        });
    }
}

impl<W: Read + Write + Seek> Builder<W> {
    /// Opens an existing archive for appending.
    ///
    /// The archive is read to its end in the format it was written in; any
    /// damage is fatal here rather than skipped, since writing past a flaw
    /// would bury the new members. The object is then positioned over the
    /// old trailer, which is rewritten by `finish` if anything is appended.
    pub fn append_to(obj: W) -> io::Result<Builder<W>> {
        let mut archive = Archive::new(obj);
        archive.set_strict(true);
        for entry in archive.entries()? {
            entry.map_err(|e| io::Error::new(e.kind(), format!("unable to append: {}", e)))?;
        }
        let format = archive
            .format()
            .ok_or_else(|| other("unable to append: unknown archive format"))?;
        let trailer = archive.trailer_pos();
        let (mut obj, session) = archive.into_parts();
        let pos = match trailer {
            Some(pos) => obj.seek(SeekFrom::Start(pos))?,
            None => obj.seek(SeekFrom::End(0))?,
        };
        log::debug!("appending to {} archive at offset {}", format.descriptor().name, pos);
        Ok(Builder::with_session(obj, format, session))
    }
}

/// Writes a header, then `skip` bytes of data zero-filled if `data` runs
/// short, then `pad` zeros. Returns how much data was actually copied.
fn write_member<W: Write, R: Read>(
    dst: &mut W,
    header: &[u8],
    data: R,
    skip: u64,
    pad: u64,
) -> io::Result<u64> {
    dst.write_all(header)?;
    let copied = io::copy(&mut data.take(skip), dst)?;
    io::copy(&mut io::repeat(0).take(skip - copied + pad), dst)?;
    Ok(copied)
}

impl<W: Write> Drop for Builder<W> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
