//! Registry of the digest functions an index can be built with.

use std::fmt;

use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::error::{Error, Result};
use crate::format::PREFIX_SIZE;

/// Largest digest any registered function produces (SHA-512).
pub const MAX_DIGEST_SIZE: usize = 64;

pub const SUPPORTED_HASHES: &str = "md5, sha1, sha256, sha384, sha512";

/// Computes the digest of the first argument into the second, which is exactly
/// the function's digest size.
pub type DigestFn = fn(&[u8], &mut [u8]);

fn rust_crypto<D: sha2::Digest>(data: &[u8], out: &mut [u8]) {
    out.copy_from_slice(&D::digest(data));
}

const REGISTRY: &[HashFunction] = &[
    HashFunction::new("md5", 16, rust_crypto::<Md5>),
    HashFunction::new("sha1", 20, rust_crypto::<Sha1>),
    HashFunction::new("sha256", 32, rust_crypto::<Sha256>),
    HashFunction::new("sha384", 48, rust_crypto::<Sha384>),
    HashFunction::new("sha512", 64, rust_crypto::<Sha512>),
];

/// A named digest function and its output size.
#[derive(Clone, Copy)]
pub struct HashFunction {
    name: &'static str,
    size: usize,
    f: DigestFn,
}

impl HashFunction {
    /// Wraps an arbitrary digest function. Registered functions come from
    /// [`HashFunction::from_name`]; this is for callers bringing their own.
    ///
    /// # Panics
    ///
    /// Panics if `size` is shorter than the 8-byte prefix or longer than
    /// [`MAX_DIGEST_SIZE`].
    pub const fn new(name: &'static str, size: usize, f: DigestFn) -> Self {
        assert!(size >= PREFIX_SIZE && size <= MAX_DIGEST_SIZE);
        Self { name, size, f }
    }

    /// Looks up a registered function by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        REGISTRY.iter().find(|hash| hash.name.eq_ignore_ascii_case(name)).copied().ok_or_else(
            || Error::UnknownHash { name: name.to_string(), supported: SUPPORTED_HASHES },
        )
    }

    pub fn supported() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|hash| hash.name)
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn digest(&self, data: &[u8]) -> Digest {
        let mut digest = Digest { bytes: [0u8; MAX_DIGEST_SIZE], len: self.size as u8 };
        (self.f)(data, &mut digest.bytes[..self.size]);
        digest
    }
}

impl fmt::Debug for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashFunction").field("name", &self.name).field("size", &self.size).finish()
    }
}

/// A full digest held on the stack.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Digest {
    bytes: [u8; MAX_DIGEST_SIZE],
    len: u8,
}

impl Digest {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_DIGEST_SIZE {
            return None;
        }

        let mut digest = Digest { bytes: [0u8; MAX_DIGEST_SIZE], len: bytes.len() as u8 };
        digest.bytes[..bytes.len()].copy_from_slice(bytes);
        Some(digest)
    }

    /// Parses a hex string (either case). Returns `None` on odd length,
    /// non-hex characters or digests longer than [`MAX_DIGEST_SIZE`].
    pub fn from_hex(hex: &[u8]) -> Option<Self> {
        if hex.len() % 2 != 0 || hex.len() / 2 > MAX_DIGEST_SIZE {
            return None;
        }

        let len = hex.len() / 2;
        let mut digest = Digest { bytes: [0u8; MAX_DIGEST_SIZE], len: len as u8 };
        hex::decode_to_slice(hex, &mut digest.bytes[..len]).ok()?;
        Some(digest)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The 8-byte key stored in index entries, if the digest is long enough.
    #[inline]
    pub fn prefix(&self) -> Option<&[u8]> {
        self.as_bytes().get(..PREFIX_SIZE)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}
