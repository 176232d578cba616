// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage backend trait
//!
//! A backend is a read-only byte store addressed by [`Path`]. Backends only
//! look at [`Path::path`]; the domain has already been used by the router to
//! pick the backend and is ignored here.

use bytes::Bytes;
use std::any::Any;

use crate::{
    entry::Entry,
    error::{VfsError, VfsResult},
    Fingerprint, Path,
};

/// Prefix length hashed by default when an exact fingerprint is not forced.
pub const DEFAULT_FINGERPRINT_PREFIX: u64 = 1024 * 1024;

/// Storage backend capabilities
#[derive(Debug, Clone, Default)]
pub struct BackendCapabilities {
    /// Has a notion of directories
    pub directories: bool,
    /// Follows symlinks when resolving paths
    pub symlinks: bool,
    /// `file_contents` hands out views without copying
    pub zero_copy: bool,
    /// Fingerprints always cover the whole file, even without `force_exact`
    pub exact_fingerprints: bool,
}

impl BackendCapabilities {
    pub fn filesystem() -> Self {
        Self { directories: true, symlinks: true, ..Default::default() }
    }

    pub fn memory() -> Self {
        Self { zero_copy: true, exact_fingerprints: true, ..Default::default() }
    }
}

/// Storage backend trait
pub trait Backend: Send + Sync + 'static {
    fn display_name(&self) -> &str;
    fn capabilities(&self) -> &BackendCapabilities;

    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    fn file_size(&self, path: &Path) -> VfsResult<u64>;

    /// Content fingerprint. Without `force_exact` a backend may hash only a
    /// prefix, folding the full size in when it does.
    fn file_fingerprint(&self, path: &Path, force_exact: bool) -> VfsResult<Fingerprint>;

    /// Reads from the start of the file into `buf`, up to its length.
    ///
    /// Returns the number of bytes read and the exact fingerprint of those
    /// bytes; it comes for free since every byte passes through anyway.
    fn read_full(&self, path: &Path, buf: &mut [u8]) -> VfsResult<(usize, Fingerprint)>;

    /// Reads up to `buf.len()` bytes starting at `offset`. An offset at or
    /// past the end reads nothing.
    fn read_bytes(&self, path: &Path, buf: &mut [u8], offset: u64) -> VfsResult<usize>;

    /// Bytes from `offset` to `offset + len`, clamped to the end of the file.
    /// `None` reads to the end. An offset past the end is an error.
    fn file_contents(&self, path: &Path, offset: u64, len: Option<u64>) -> VfsResult<Bytes>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    // Provided methods

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn read_all(&self, path: &Path) -> VfsResult<Bytes> {
        self.file_contents(path, 0, None)
    }

    fn stat(&self, path: &Path) -> VfsResult<Entry> {
        if self.is_file(path) {
            let size = self.file_size(path)?;
            let fingerprint = self.file_fingerprint(path, false)?;
            Ok(Entry::file(path.clone(), size, fingerprint))
        } else if self.is_dir(path) {
            Ok(Entry::directory(path.clone()))
        } else {
            Err(VfsError::NotFound(path.to_string()))
        }
    }
}

/// Start and end of a `[offset, offset + len)` window clamped to `size`.
pub fn clamp_range(path: &Path, size: u64, offset: u64, len: Option<u64>) -> VfsResult<(u64, u64)> {
    if offset > size {
        return Err(VfsError::OutOfRange { path: path.to_string(), offset, size });
    }
    let end = match len {
        Some(len) => offset.saturating_add(len).min(size),
        None => size,
    };
    Ok((offset, end))
}
