use std::cell::{Cell, Ref, RefCell};
use std::cmp;
use std::io;
use std::io::prelude::*;
use std::marker;
use std::mem;

use crate::entry::{DataSum, EntryFields};
use crate::error::Error;
use crate::field;
use crate::format::{Format, TrailerCheck, TrailerStyle};
use crate::registry::FormatRegistry;
use crate::session::{Session, Warning};
use crate::{other, ArchiveEntry, Entry, EntryKind, BLOCK_SIZE};

macro_rules! try_iter {
    ($me:expr, $e:expr) => {
        match $e {
            Ok(e) => e,
            Err(e) => {
                $me.done = true;
                return Some(Err(e));
            }
        }
    };
}

/// Stream-level recoveries allowed before a read error becomes fatal.
const DEFAULT_MAX_FAULTS: u32 = 10;

/// Largest GNU long name payload accepted by default.
const DEFAULT_MAX_LONG_NAME: u64 = 64 * 1024;

/// A top-level representation of an archive being read.
///
/// The format is identified from the first bytes of the stream unless one is
/// set with `set_format`. Damaged regions are skipped by searching byte by
/// byte for the next valid header; every such recovery is reported on the
/// archive's `Session`.
pub struct Archive<R: ?Sized + Read> {
    inner: ArchiveInner<R>,
}

pub(crate) struct ArchiveInner<R: ?Sized> {
    pos: Cell<u64>,
    format: Cell<Option<&'static dyn Format>>,
    registry: FormatRegistry,
    strict: bool,
    max_faults: u32,
    max_long_name: u64,
    trailer_pos: Cell<Option<u64>>,
    session: RefCell<Session>,
    pushback: RefCell<Vec<u8>>,
    obj: RefCell<R>,
}

/// An iterator over the entries of an archive.
pub struct Entries<'a, R: 'a + Read> {
    fields: EntriesFields<'a>,
    _ignored: marker::PhantomData<&'a Archive<R>>,
}

struct EntriesFields<'a> {
    archive: &'a Archive<dyn Read + 'a>,
    next: u64,
    done: bool,
}

impl<R: Read> Archive<R> {
    /// Create a new archive with the underlying object as the reader.
    pub fn new(obj: R) -> Archive<R> {
        Archive::with_session(obj, Session::new())
    }

    /// Create a new archive that records its counters and warnings on
    /// `session`.
    pub fn with_session(obj: R, session: Session) -> Archive<R> {
        Archive {
            inner: ArchiveInner {
                pos: Cell::new(0),
                format: Cell::new(None),
                registry: FormatRegistry::default(),
                strict: false,
                max_faults: DEFAULT_MAX_FAULTS,
                max_long_name: DEFAULT_MAX_LONG_NAME,
                trailer_pos: Cell::new(None),
                session: RefCell::new(session),
                pushback: RefCell::new(Vec::new()),
                obj: RefCell::new(obj),
            },
        }
    }

    /// Unwrap this archive, returning the underlying object.
    ///
    /// Bytes buffered while identifying the format but not yet consumed are
    /// lost.
    pub fn into_inner(self) -> R {
        self.inner.obj.into_inner()
    }

    /// Unwrap this archive, returning its session.
    pub fn into_session(self) -> Session {
        self.inner.session.into_inner()
    }

    pub(crate) fn into_parts(self) -> (R, Session) {
        (self.inner.obj.into_inner(), self.inner.session.into_inner())
    }

    /// Read the archive as `format` instead of identifying it from the
    /// stream.
    pub fn set_format(&mut self, format: &'static dyn Format) {
        self.inner.format.set(Some(format));
    }

    /// Replace the list of formats tried, in order, when identifying the
    /// archive.
    pub fn set_registry(&mut self, registry: FormatRegistry) {
        self.inner.registry = registry;
    }

    /// Set how many read errors are recovered from before giving up.
    ///
    /// Defaults to 10.
    pub fn set_max_faults(&mut self, max: u32) {
        self.inner.max_faults = max;
    }

    /// Set the largest GNU long name or long link payload accepted.
    ///
    /// Defaults to 64 KiB.
    pub fn set_max_long_name(&mut self, max: u64) {
        self.inner.max_long_name = max;
    }

    /// Make every header flaw and read error fatal, as needed before
    /// appending to an archive.
    pub(crate) fn set_strict(&mut self, strict: bool) {
        self.inner.strict = strict;
    }

    /// The format being read, once it is known.
    pub fn format(&self) -> Option<&'static dyn Format> {
        self.inner.format.get()
    }

    /// Byte offset at which the archive's trailer began, once the iterator
    /// has reached it.
    ///
    /// For formats with an in-header trailer this is the offset of the
    /// trailer header; otherwise it is the first of the zero blocks.
    pub fn trailer_pos(&self) -> Option<u64> {
        self.inner.trailer_pos.get()
    }

    /// Counters and warnings for this archive so far.
    pub fn session(&self) -> Ref<Session> {
        self.inner.session.borrow()
    }

    /// Construct an iterator over the entries in this archive.
    ///
    /// Note that care must be taken to consider each entry within an archive in
    /// sequence. If entries are processed out of sequence (from what the
    /// iterator returns), then the contents read for each entry may be
    /// corrupted.
    pub fn entries(&mut self) -> io::Result<Entries<R>> {
        let me: &mut Archive<dyn Read> = self;
        me._entries().map(|fields| Entries {
            fields,
            _ignored: marker::PhantomData,
        })
    }
}

impl<'a> Archive<dyn Read + 'a> {
    fn _entries(&self) -> io::Result<EntriesFields> {
        if self.inner.pos.get() != 0 {
            return Err(other(
                "cannot call entries unless archive is at \
                 position 0",
            ));
        }
        Ok(EntriesFields {
            archive: self,
            done: false,
            next: 0,
        })
    }

    fn skip(&self, mut amt: u64) -> io::Result<()> {
        let mut buf = [0u8; 4096 * 8];
        while amt > 0 {
            let n = cmp::min(amt, buf.len() as u64);
            let n = (&self.inner).read(&mut buf[..n as usize])?;
            if n == 0 {
                self.inner.warn(Warning::PrematureEof);
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected EOF during skip",
                ));
            }
            amt -= n as u64;
        }
        Ok(())
    }

    /// Reads into `buf` until it is full or the input ends, returning the
    /// number of bytes read.
    fn fill(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read = 0;
        while read < buf.len() {
            match (&self.inner).read(&mut buf[read..]) {
                Ok(0) => break,
                Ok(n) => read += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(read)
    }

    /// Accounts for a failed read of the archive. The read can be retried
    /// unless the fault budget is spent or the archive is read strictly; the
    /// first recovery of a search is announced with `notice`.
    fn fault(&self, err: io::Error, searching: &mut bool, notice: Warning) -> io::Result<()> {
        let faults = self.inner.session.borrow_mut().add_fault();
        if faults > self.inner.max_faults {
            self.inner.warn(Warning::PrematureEof);
            return Err(Error::StreamFault(err).into());
        }
        if !*searching {
            if self.inner.strict {
                return Err(Error::StreamFault(err).into());
            }
            self.inner.warn(notice);
            *searching = true;
        }
        Ok(())
    }

    /// Identifies the archive's format from the first bytes of the stream.
    ///
    /// On a match the bytes examined are pushed back so the first header is
    /// read through the normal path. With no match the window slides one
    /// byte at a time until some format matches or the input runs out.
    fn probe(&self) -> io::Result<&'static dyn Format> {
        let min = self.inner.registry.min_header_size();
        let mut buf = vec![0u8; cmp::max(BLOCK_SIZE, min)];
        let mut have = 0;
        let mut searching = false;
        loop {
            loop {
                match self.fill(&mut buf[have..]) {
                    Ok(n) => {
                        have += n;
                        if have >= min {
                            break;
                        }
                        self.inner.warn(Warning::UnknownFormat);
                        return Err(Error::UnknownFormat.into());
                    }
                    Err(e) => {
                        // Nothing buffered around an error can be trusted.
                        self.fault(e, &mut searching, Warning::FormatSearch)?;
                        have = 0;
                    }
                }
            }

            if let Some(format) = self.inner.registry.probe(&buf[..have]) {
                log::debug!("identified archive format {}", format.descriptor().name);
                self.inner.push_back(&buf[..have]);
                self.inner.format.set(Some(format));
                return Ok(format);
            }

            if !searching {
                if self.inner.strict {
                    return Err(Error::UnknownFormat.into());
                }
                self.inner.warn(Warning::FormatSearch);
                searching = true;
            }
            buf.copy_within(1..have, 0);
            have -= 1;
            self.inner.session.borrow_mut().add_resync_byte();
        }
    }

    /// Reads the next header, returning `None` at the end of the archive.
    fn next_head(&self) -> io::Result<Option<ArchiveEntry>> {
        let format = match self.inner.format.get() {
            Some(format) => format,
            None => self.probe()?,
        };
        let desc = format.descriptor();
        let hsz = desc.header_size;
        let mut buf = vec![0u8; hsz];
        let mut have = 0;
        let mut in_resync = false;
        let mut first = true;
        let mut zero_run = 0;
        let mut zero_start = None;

        let (entry, start) = loop {
            // Accumulate a full header's worth of contiguous bytes.
            while have < hsz {
                match self.fill(&mut buf[have..]) {
                    Ok(n) if have + n == hsz => have = hsz,
                    Ok(0) if first && have == 0 && !in_resync => {
                        // Archives missing their trailer just end.
                        log::debug!("archive ended without a trailer");
                        return Ok(None);
                    }
                    Ok(_) => {
                        self.inner.warn(Warning::PrematureEof);
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "premature end of archive",
                        ));
                    }
                    Err(e) => {
                        first = false;
                        self.fault(e, &mut in_resync, Warning::IoRecovery)?;
                        have = 0;
                    }
                }
            }

            let start = self.inner.pos.get() - hsz as u64;
            match format.decode(&buf, &mut &self.inner) {
                Ok(entry) => break (entry, start),
                Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.inner.warn(Warning::PrematureEof);
                    return Err(e);
                }
                Err(Error::Io(e)) => {
                    // Whatever the decoder read past the header is lost with it.
                    first = false;
                    self.fault(e, &mut in_resync, Warning::IoRecovery)?;
                    have = 0;
                    continue;
                }
                Err(e) => log::trace!("{}", e),
            }

            if let TrailerStyle::ZeroBlocks(_) = desc.trailer {
                match format.trailer_check(&buf, in_resync, &mut zero_run) {
                    TrailerCheck::Trailer => {
                        self.inner.trailer_pos.set(Some(zero_start.unwrap_or(start)));
                        return Ok(None);
                    }
                    TrailerCheck::Unparseable => {
                        if zero_start.is_none() && zero_run > 0 {
                            zero_start = Some(start);
                        }
                        have = 0;
                        continue;
                    }
                    TrailerCheck::NotTrailer => {}
                }
            }

            // Brute force: slide the window one byte and try again.
            if !in_resync {
                if self.inner.strict {
                    return Err(Error::format(desc.name, "archive header flaw").into());
                }
                self.inner.warn(Warning::InvalidHeader);
                in_resync = true;
            }
            buf.copy_within(1.., 0);
            have = hsz - 1;
            self.inner.session.borrow_mut().add_resync_byte();
        };

        if format.is_trailer(&entry) {
            self.inner.trailer_pos.set(Some(start));
            return Ok(None);
        }
        log::debug!(
            "{} header at {}: {} ({}, {} bytes)",
            desc.name,
            start,
            String::from_utf8_lossy(&entry.name),
            entry.kind,
            entry.size
        );
        self.inner.session.borrow_mut().add_file();
        Ok(Some(entry))
    }

    fn fields(&'a self, header: ArchiveEntry) -> EntryFields<'a> {
        let checked = self
            .inner
            .format
            .get()
            .map_or(false, |f| f.descriptor().data_checksum);
        let sum = match header.checksum {
            Some(sum) if checked && header.skip > 0 => Some(DataSum::new(sum)),
            _ => None,
        };
        EntryFields {
            data: (&self.inner).take(header.skip),
            header,
            sum,
        }
    }
}

impl<R: ?Sized> ArchiveInner<R> {
    pub(crate) fn warn(&self, warning: Warning) {
        self.session.borrow_mut().warn(warning);
    }

    fn push_back(&self, bytes: &[u8]) {
        let mut pushback = self.pushback.borrow_mut();
        let rest = mem::replace(&mut *pushback, bytes.to_vec());
        pushback.extend(rest);
        self.pos.set(self.pos.get() - bytes.len() as u64);
    }
}

impl<'a, R: Read> Iterator for Entries<'a, R> {
    type Item = io::Result<Entry<'a, R>>;

    fn next(&mut self) -> Option<io::Result<Entry<'a, R>>> {
        self.fields
            .next()
            .map(|result| result.map(|fields| fields.into_entry()))
    }
}

impl<'a> Iterator for EntriesFields<'a> {
    type Item = io::Result<EntryFields<'a>>;

    fn next(&mut self) -> Option<io::Result<EntryFields<'a>>> {
        // If we hit a previous error, or we reached the end, we're done here
        if self.done {
            return None;
        }

        let mut long_name = None;
        let mut long_link = None;
        loop {
            // Seek to the start of the next header in the archive
            let delta = self.next - self.archive.inner.pos.get();
            try_iter!(self, self.archive.skip(delta));

            let header = match try_iter!(self, self.archive.next_head()) {
                Some(header) => header,
                None => {
                    self.done = true;
                    if long_name.is_some() || long_link.is_some() {
                        return Some(Err(other("long name entry not followed by an entry")));
                    }
                    return None;
                }
            };
            self.next = self.archive.inner.pos.get() + header.skip + header.pad;

            // GNU long names carry the name of the entry that follows them.
            if header.kind.is_continuation() {
                if header.skip > self.archive.inner.max_long_name {
                    self.done = true;
                    return Some(Err(other("long name entry exceeds the size limit")));
                }
                let kind = header.kind;
                let mut fields = self.archive.fields(header);
                let mut data = try_iter!(self, fields.read_all());
                let len = field::truncate(&data).len();
                data.truncate(len);
                if kind == EntryKind::LongName {
                    long_name = Some(data);
                } else {
                    long_link = Some(data);
                }
                continue;
            }

            let mut header = header;
            if let Some(mut name) = long_name.take() {
                if header.kind == EntryKind::Directory {
                    while name.len() > 1 && name.last() == Some(&b'/') {
                        name.pop();
                    }
                }
                header.name = name;
            }
            if let Some(link) = long_link.take() {
                header.link_name = Some(link);
            }
            return Some(Ok(self.archive.fields(header)));
        }
    }
}

impl<'a, R: ?Sized + Read> Read for &'a ArchiveInner<R> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let n = {
            let mut pushback = self.pushback.borrow_mut();
            if pushback.is_empty() {
                self.obj.borrow_mut().read(into)?
            } else {
                let n = cmp::min(into.len(), pushback.len());
                into[..n].copy_from_slice(&pushback[..n]);
                pushback.drain(..n);
                n
            }
        };
        self.pos.set(self.pos.get() + n as u64);
        Ok(n)
    }
}
