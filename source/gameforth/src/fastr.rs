//! Word names with a precomputed length and hash.
//!
//! Dictionary lookups compare the packed [`LenHash`] first, and only fall
//! back to a byte comparison when it matches.

use core::hash::Hasher as _;
use core::{fmt, ops::Deref};
use hash32::{FnvHasher, Hasher};

/// An owned, hashed word name, as stored in the dictionary.
pub struct FaStr {
    text: Box<str>,
    len_hash: LenHash,
}

/// A borrowed, hashed word name, used for lookups.
pub struct TmpFaStr<'a> {
    text: &'a str,
    len_hash: LenHash,
}

impl FaStr {
    pub fn new(text: &str) -> Self {
        Self {
            len_hash: LenHash::new(text),
            text: text.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len_hash(&self) -> LenHash {
        self.len_hash
    }
}

impl<'a> TmpFaStr<'a> {
    pub fn new_from(text: &'a str) -> Self {
        Self {
            text,
            len_hash: LenHash::new(text),
        }
    }
}

impl Deref for FaStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for FaStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.text, f)
    }
}

impl fmt::Display for FaStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq<TmpFaStr<'_>> for FaStr {
    fn eq(&self, other: &TmpFaStr<'_>) -> bool {
        // hashes can collide, so equal hashes still need the text compared
        self.len_hash == other.len_hash && *self.text == *other.text
    }
}

impl PartialEq for FaStr {
    fn eq(&self, other: &Self) -> bool {
        self.len_hash == other.len_hash && self.text == other.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LenHash {
    // 24..32: 8-bit len, saturating at 255
    // 00..24: 24-bit FnvHash
    inner: u32,
}

impl LenHash {
    const HASH_MASK: u32 = 0x00FF_FFFF;
    const LEN_MASK: u32 = 0xFF00_0000;

    pub fn new(name: &str) -> Self {
        let mut fnv = FnvHasher::default();
        fnv.write(name.as_bytes());
        let len = name.len().min(0xFF) as u32;
        Self {
            inner: (len << 24) | (fnv.finish32() & Self::HASH_MASK),
        }
    }

    /// The hashed length, saturating at 255.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        ((self.inner & Self::LEN_MASK) >> 24) as usize
    }
}
