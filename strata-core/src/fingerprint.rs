// SPDX-License-Identifier: AGPL-3.0-or-later
//! Content fingerprints
//!
//! A fingerprint is the first 64 bits of a BLAKE3 digest. It is used for
//! change detection only: equal content always gives equal fingerprints, but
//! backends are allowed to hash a prefix, in which case equal fingerprints say
//! nothing about the unhashed tail beyond its length.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Opaque 64-bit content identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Fingerprint of a complete buffer
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = FingerprintHasher::new();
        hasher.update(data);
        hasher.finish()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Incremental fingerprint computation
///
/// Implements [`io::Write`] so a reader can be streamed in with
/// [`io::copy`].
#[derive(Debug, Clone, Default)]
pub struct FingerprintHasher {
    hasher: blake3::Hasher,
}

impl FingerprintHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(data);
        self
    }

    /// Fingerprint of everything fed in so far.
    pub fn finish(&self) -> Fingerprint {
        let digest = self.hasher.finalize();
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest.as_bytes()[..8]);
        Fingerprint(u64::from_le_bytes(raw))
    }

    /// Fingerprint of a prefix of a larger file.
    ///
    /// The total size is folded in so files sharing the hashed prefix but
    /// differing in length stay distinguishable.
    pub fn finish_truncated(&mut self, total_size: u64) -> Fingerprint {
        self.hasher.update(b"\0size");
        self.hasher.update(&total_size.to_le_bytes());
        self.finish()
    }
}

impl io::Write for FingerprintHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_content_equal_fingerprint() {
        assert_eq!(Fingerprint::of(b"hello"), Fingerprint::of(b"hello"));
        assert_ne!(Fingerprint::of(b"hello"), Fingerprint::of(b"hellp"));
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = FingerprintHasher::new();
        hasher.update(b"hel").update(b"lo");
        assert_eq!(hasher.finish(), Fingerprint::of(b"hello"));
    }

    #[test]
    fn test_streamed_matches_one_shot() {
        let data = vec![7u8; 100_000];
        let mut hasher = FingerprintHasher::new();
        io::copy(&mut &data[..], &mut hasher).unwrap();
        assert_eq!(hasher.finish(), Fingerprint::of(&data));
    }

    #[test]
    fn test_truncated_folds_size() {
        let prefix = b"same prefix";
        let a = FingerprintHasher::new().update(prefix).finish_truncated(100);
        let b = FingerprintHasher::new().update(prefix).finish_truncated(200);
        assert_ne!(a, b);
        assert_ne!(a, Fingerprint::of(prefix));
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(Fingerprint::from_raw(0xab).to_string(), "00000000000000ab");
        assert_eq!(Fingerprint::from_raw(42).as_u64(), 42);
    }
}
