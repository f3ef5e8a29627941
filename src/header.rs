use std::fmt;
use std::mem;

use crate::BLOCK_SIZE;

/// A single 512-byte tar header block.
///
/// The block itself is format agnostic; the `as_old` and `as_ustar` methods
/// return typed views of the fields each tar dialect stores at fixed
/// offsets.
#[repr(C)]
#[derive(Clone)]
pub struct HeaderBlock {
    bytes: [u8; BLOCK_SIZE],
}

/// Field layout of a pre-POSIX (V7 / BSD) tar header.
#[repr(C)]
#[allow(missing_docs)]
pub struct OldHeader {
    pub name: [u8; 100],
    pub mode: [u8; 8],
    pub uid: [u8; 8],
    pub gid: [u8; 8],
    pub size: [u8; 12],
    pub mtime: [u8; 12],
    pub cksum: [u8; 8],
    pub linkflag: [u8; 1],
    pub linkname: [u8; 100],
    pub pad: [u8; 255],
}

/// Field layout of a POSIX.1-1988 ustar header.
#[repr(C)]
#[allow(missing_docs)]
pub struct UstarHeader {
    pub name: [u8; 100],
    pub mode: [u8; 8],
    pub uid: [u8; 8],
    pub gid: [u8; 8],
    pub size: [u8; 12],
    pub mtime: [u8; 12],
    pub cksum: [u8; 8],
    pub typeflag: [u8; 1],
    pub linkname: [u8; 100],

    pub magic: [u8; 6],
    pub version: [u8; 2],
    pub uname: [u8; 32],
    pub gname: [u8; 32],
    pub devmajor: [u8; 8],
    pub devminor: [u8; 8],
    pub prefix: [u8; 155],
    pub pad: [u8; 12],
}

/// Offset and width of the checksum field, identical in every tar dialect.
pub(crate) const CKSUM_OFFSET: usize = 148;
pub(crate) const CKSUM_LEN: usize = 8;

const _: () = assert!(mem::size_of::<OldHeader>() == BLOCK_SIZE);
const _: () = assert!(mem::size_of::<UstarHeader>() == BLOCK_SIZE);

impl HeaderBlock {
    /// Creates a new all-zero header block.
    pub fn new() -> HeaderBlock {
        HeaderBlock { bytes: [0; BLOCK_SIZE] }
    }

    /// Copies the first 512 bytes of `bytes` into a new block.
    ///
    /// Returns `None` if fewer than 512 bytes are available.
    pub fn from_byte_slice(bytes: &[u8]) -> Option<HeaderBlock> {
        let bytes = bytes.get(..BLOCK_SIZE)?;
        let mut block = HeaderBlock::new();
        block.bytes.copy_from_slice(bytes);
        Some(block)
    }

    /// Returns a view into this block as a byte array.
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.bytes
    }

    /// Returns a mutable view into this block as a byte array.
    pub fn as_mut_bytes(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.bytes
    }

    /// Views this block as an old-style tar header.
    pub fn as_old(&self) -> &OldHeader {
        unsafe { cast(self) }
    }

    /// Same as `as_old`, but the mutable version.
    pub fn as_old_mut(&mut self) -> &mut OldHeader {
        unsafe { cast_mut(self) }
    }

    /// Views this block as a ustar header.
    ///
    /// This always succeeds; use `is_ustar` to test whether the magic is
    /// actually present.
    pub fn as_ustar(&self) -> &UstarHeader {
        unsafe { cast(self) }
    }

    /// Same as `as_ustar`, but the mutable version.
    pub fn as_ustar_mut(&mut self) -> &mut UstarHeader {
        unsafe { cast_mut(self) }
    }

    /// Returns whether the block carries the ustar magic.
    ///
    /// Only the first five bytes are compared; some writers put a space
    /// rather than a NUL in the sixth.
    pub fn is_ustar(&self) -> bool {
        &self.as_ustar().magic[..5] == b"ustar"
    }

    /// Returns whether every byte of this block is zero.
    pub fn is_zero(&self) -> bool {
        is_zero(&self.bytes)
    }

    /// Computes the header checksum: the unsigned sum of every byte in the
    /// block with the checksum field itself counted as eight spaces.
    pub fn checksum(&self) -> u64 {
        checksum(&self.bytes)
    }
}

impl Default for HeaderBlock {
    fn default() -> HeaderBlock {
        HeaderBlock::new()
    }
}

impl fmt::Debug for HeaderBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let old = self.as_old();
        f.debug_struct("HeaderBlock")
            .field("name", &String::from_utf8_lossy(crate::field::truncate(&old.name)))
            .field("linkflag", &old.linkflag[0])
            .field("ustar", &self.is_ustar())
            .finish()
    }
}

/// Checksum of a raw tar header block; see `HeaderBlock::checksum`.
pub(crate) fn checksum(block: &[u8]) -> u64 {
    let field = CKSUM_OFFSET..CKSUM_OFFSET + CKSUM_LEN;
    block
        .iter()
        .enumerate()
        .map(|(i, b)| if field.contains(&i) { b' ' as u64 } else { *b as u64 })
        .sum()
}

pub(crate) fn is_zero(block: &[u8]) -> bool {
    block.iter().all(|b| *b == 0)
}

unsafe fn cast<T>(block: &HeaderBlock) -> &T {
    assert_eq!(mem::size_of_val(block), mem::size_of::<T>());
    &*(block as *const HeaderBlock as *const T)
}

unsafe fn cast_mut<T>(block: &mut HeaderBlock) -> &mut T {
    assert_eq!(mem::size_of_val(block), mem::size_of::<T>());
    &mut *(block as *mut HeaderBlock as *mut T)
}
