//! Fixed-width header field codec.
//!
//! Every header format in this crate stores its metadata as ASCII numbers
//! and byte strings at fixed offsets. The helpers here render and parse
//! those fields. Encoders never truncate: a value or name that does not fit
//! is reported as an error so the caller can skip the entry instead of
//! writing a damaged header.

use crate::error::{Error, Result};

/// The trailing bytes that close an octal number field.
///
/// Historical tar readers are picky about field terminators and each field
/// of each dialect has its own convention, so the writer picks one per
/// field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminator {
    /// Digits fill the whole field.
    None,
    /// Digits followed by a single space.
    Space,
    /// Digits followed by a single NUL.
    Nul,
    /// Digits followed by a space, then a NUL.
    SpaceNul,
    /// Digits followed by a NUL, then a space.
    NulSpace,
}

impl Terminator {
    fn bytes(&self) -> &'static [u8] {
        match *self {
            Terminator::None => b"",
            Terminator::Space => b" ",
            Terminator::Nul => b"\0",
            Terminator::SpaceNul => b" \0",
            Terminator::NulSpace => b"\0 ",
        }
    }
}

/// Renders `value` as zero-padded octal digits right-justified in `dst`,
/// closed by `term`.
///
/// On overflow `dst` is left in an unspecified state and must not be
/// written out.
pub fn encode_octal(dst: &mut [u8], value: u64, term: Terminator) -> Result<()> {
    encode_radix(dst, value, term, 8)
}

/// Renders `value` as zero-padded lower case hex digits filling all of
/// `dst`, as the SVR4 cpio formats store their numbers.
pub fn encode_hex(dst: &mut [u8], value: u64) -> Result<()> {
    encode_radix(dst, value, Terminator::None, 16)
}

fn encode_radix(dst: &mut [u8], value: u64, term: Terminator, radix: u64) -> Result<()> {
    let tail = term.bytes();
    let overflow = Error::Overflow { value, width: dst.len() };
    if dst.len() < tail.len() {
        return Err(overflow);
    }
    let digits = dst.len() - tail.len();
    dst[digits..].copy_from_slice(tail);

    let mut rest = value;
    for slot in dst[..digits].iter_mut().rev() {
        let digit = (rest % radix) as u8;
        *slot = if digit < 10 { b'0' + digit } else { b'a' + digit - 10 };
        rest /= radix;
    }
    if rest != 0 {
        return Err(overflow);
    }
    Ok(())
}

/// Parses an octal number field.
///
/// Leading spaces and NULs are skipped, then digits are consumed up to the
/// first byte that is not an octal digit. This never fails: garbage yields
/// whatever prefix parsed, and values too large for a `u64` saturate.
pub fn decode_octal(src: &[u8]) -> u64 {
    decode_radix(src, 8)
}

/// Parses a hex number field the same permissive way as `decode_octal`.
pub fn decode_hex(src: &[u8]) -> u64 {
    decode_radix(src, 16)
}

fn decode_radix(src: &[u8], radix: u32) -> u64 {
    src.iter()
        .skip_while(|b| **b == b' ' || **b == 0)
        .map_while(|b| (*b as char).to_digit(radix))
        .fold(0u64, |acc, d| {
            acc.saturating_mul(radix as u64).saturating_add(d as u64)
        })
}

/// Copies `src` into the start of `dst`, zero filling the remainder.
///
/// With `require_nul` the value must leave room for at least one NUL;
/// without it the value may occupy the entire field unterminated, which
/// ustar allows for its name fields. Over-long values and values containing
/// a NUL are rejected.
pub fn encode_string(dst: &mut [u8], src: &[u8], require_nul: bool) -> Result<()> {
    let max = if require_nul { dst.len().saturating_sub(1) } else { dst.len() };
    if src.len() > max || src.contains(&0) {
        return Err(Error::name_too_long(src, max));
    }
    dst[..src.len()].copy_from_slice(src);
    for slot in &mut dst[src.len()..] {
        *slot = 0;
    }
    Ok(())
}

/// Returns the bytes of a string field up to its first NUL, or the whole
/// field if it is unterminated.
pub fn truncate(slice: &[u8]) -> &[u8] {
    match slice.iter().position(|i| *i == 0) {
        Some(i) => &slice[..i],
        None => slice,
    }
}

/// Splits `name` into a `(prefix, suffix)` pair for formats that store long
/// paths in two fields joined by an implied `/`.
///
/// A name that fits in `suffix_budget` is returned whole with an empty
/// prefix. Otherwise the separator chosen is the one leaving the longest
/// suffix that still fits, so the prefix stays as short as possible. The
/// separator itself is dropped. Splitting fails when the name exceeds
/// `total_budget`, when no separator leaves a fitting suffix, when the prefix
/// would not fit in `prefix_budget`, and when the prefix would be empty
/// (a name like `/` followed by a full-width component cannot be stored
/// without changing its meaning).
pub fn split_path(
    name: &[u8],
    total_budget: usize,
    prefix_budget: usize,
    suffix_budget: usize,
) -> Result<(&[u8], &[u8])> {
    if name.len() <= suffix_budget {
        return Ok((&name[..0], name));
    }
    if name.len() > total_budget {
        return Err(Error::name_too_long(name, total_budget));
    }

    let start = name.len() - suffix_budget - 1;
    let pos = match name[start..].iter().position(|b| *b == b'/') {
        Some(i) => start + i,
        None => return Err(Error::name_too_long(name, suffix_budget)),
    };
    if pos == 0 || pos > prefix_budget || pos + 1 == name.len() {
        return Err(Error::name_too_long(name, total_budget));
    }
    Ok((&name[..pos], &name[pos + 1..]))
}

/// Number of filler bytes that round `size` up to a multiple of `align`.
pub fn pad_to(size: u64, align: u64) -> u64 {
    if align <= 1 {
        return 0;
    }
    match size % align {
        0 => 0,
        rem => align - rem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octal_terminators() {
        let mut field = [0xffu8; 8];
        encode_octal(&mut field, 0o644, Terminator::SpaceNul).unwrap();
        assert_eq!(&field, b"000644 \0");
        encode_octal(&mut field, 0o644, Terminator::NulSpace).unwrap();
        assert_eq!(&field, b"000644\0 ");
        encode_octal(&mut field, 0o644, Terminator::Nul).unwrap();
        assert_eq!(&field, b"0000644\0");
        encode_octal(&mut field, 0o644, Terminator::Space).unwrap();
        assert_eq!(&field, b"0000644 ");
        encode_octal(&mut field, 0o644, Terminator::None).unwrap();
        assert_eq!(&field, b"00000644");
    }

    #[test]
    fn octal_overflow() {
        let mut field = [0u8; 12];
        assert!(encode_octal(&mut field, 0o77777777777, Terminator::Nul).is_ok());
        let err = encode_octal(&mut field, 0o100000000000, Terminator::Nul).unwrap_err();
        assert!(err.is_entry_local());
        assert!(encode_octal(&mut field[..1], 0, Terminator::SpaceNul).is_err());
    }

    #[test]
    fn octal_parsing_is_permissive() {
        assert_eq!(decode_octal(b"0000644\0"), 0o644);
        assert_eq!(decode_octal(b"   644 \0"), 0o644);
        assert_eq!(decode_octal(b"\0\0\0644 "), 0o644);
        assert_eq!(decode_octal(b"12x45"), 0o12);
        assert_eq!(decode_octal(b"129"), 0o12);
        assert_eq!(decode_octal(b"\0\0\0\0"), 0);
        assert_eq!(decode_octal(b"hello"), 0);
        assert_eq!(decode_octal(&[b'7'; 40]), u64::MAX);
    }

    #[test]
    fn hex_fields() {
        let mut field = [0u8; 8];
        encode_hex(&mut field, 0x81a4).unwrap();
        assert_eq!(&field, b"000081a4");
        assert_eq!(decode_hex(&field), 0x81a4);
        assert_eq!(decode_hex(b"000081A4"), 0x81a4);
        assert!(encode_hex(&mut field, 1 << 32).is_err());
    }

    #[test]
    fn strings() {
        let mut field = [0xffu8; 4];
        encode_string(&mut field, b"abc", true).unwrap();
        assert_eq!(&field, b"abc\0");
        assert!(encode_string(&mut field, b"abcd", true).is_err());
        encode_string(&mut field, b"abcd", false).unwrap();
        assert_eq!(&field, b"abcd");
        assert_eq!(truncate(&field), b"abcd");
        assert!(encode_string(&mut field, b"abcde", false).is_err());
        assert!(encode_string(&mut field, b"a\0", false).is_err());
    }

    #[test]
    fn padding() {
        assert_eq!(pad_to(0, 512), 0);
        assert_eq!(pad_to(1, 512), 511);
        assert_eq!(pad_to(512, 512), 0);
        assert_eq!(pad_to(513, 512), 511);
        assert_eq!(pad_to(5, 4), 3);
        assert_eq!(pad_to(5, 1), 0);
    }
}
