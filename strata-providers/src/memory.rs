// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory backend
//!
//! Holds registered buffers keyed by the path part of a [`Path`]. Buffers are
//! [`Bytes`], so externally provided data is shared rather than copied and
//! every read out of the backend is a cheap slice.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use strata_core::{
    backend::{clamp_range, Backend, BackendCapabilities},
    error::{VfsError, VfsResult},
    Fingerprint, Path,
};
use tracing::debug;

struct MemoryFile {
    data: Bytes,
    owned: bool,
    fingerprint: OnceLock<Fingerprint>,
}

impl MemoryFile {
    fn new(data: Bytes, owned: bool) -> Self {
        Self { data, owned, fingerprint: OnceLock::new() }
    }

    fn fingerprint(&self) -> Fingerprint {
        *self.fingerprint.get_or_init(|| Fingerprint::of(&self.data))
    }
}

/// Backend serving buffers registered at runtime
pub struct MemoryBackend {
    name: String,
    files: BTreeMap<String, MemoryFile>,
    capabilities: BackendCapabilities,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            files: BTreeMap::new(),
            capabilities: BackendCapabilities::memory(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a buffer owned by someone else. Only a reference is taken.
    pub fn set_file_external(&mut self, path: impl Into<Path>, data: Bytes) {
        self.register(path.into(), data, false);
    }

    /// Registers a private copy of `data`.
    pub fn set_file(&mut self, path: impl Into<Path>, data: &[u8]) {
        self.register(path.into(), Bytes::copy_from_slice(data), true);
    }

    /// Registers `data`, taking ownership of the buffer.
    pub fn set_file_owned(&mut self, path: impl Into<Path>, data: Vec<u8>) {
        self.register(path.into(), Bytes::from(data), true);
    }

    /// Unregisters `path`. Returns whether it was registered.
    pub fn forget_file(&mut self, path: &Path) -> bool {
        self.files.remove(key(path)).is_some()
    }

    /// Whether the backend holds its own copy of `path`.
    pub fn is_owned(&self, path: &Path) -> Option<bool> {
        self.files.get(key(path)).map(|f| f.owned)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Registered paths in sorted order, relative to the backend root.
    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.keys().map(String::as_str)
    }

    fn register(&mut self, path: Path, data: Bytes, owned: bool) {
        debug!(backend = %self.name, path = %path, bytes = data.len(), owned, "registering file");
        self.files.insert(key(&path).to_string(), MemoryFile::new(data, owned));
    }

    fn get(&self, path: &Path) -> VfsResult<&MemoryFile> {
        self.files
            .get(key(path))
            .ok_or_else(|| VfsError::NotFound(path.to_string()))
    }
}

/// `/x` and `x` name the same file, as they do under a directory root.
fn key(path: &Path) -> &str {
    path.path().trim_start_matches('/')
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &self.capabilities
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(key(path))
    }

    fn is_dir(&self, _path: &Path) -> bool {
        false
    }

    fn file_size(&self, path: &Path) -> VfsResult<u64> {
        Ok(self.get(path)?.data.len() as u64)
    }

    fn file_fingerprint(&self, path: &Path, _force_exact: bool) -> VfsResult<Fingerprint> {
        Ok(self.get(path)?.fingerprint())
    }

    fn read_full(&self, path: &Path, buf: &mut [u8]) -> VfsResult<(usize, Fingerprint)> {
        let file = self.get(path)?;
        let n = buf.len().min(file.data.len());
        buf[..n].copy_from_slice(&file.data[..n]);
        let fingerprint = if n == file.data.len() {
            file.fingerprint()
        } else {
            Fingerprint::of(&buf[..n])
        };
        Ok((n, fingerprint))
    }

    fn read_bytes(&self, path: &Path, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        let data = &self.get(path)?.data;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn file_contents(&self, path: &Path, offset: u64, len: Option<u64>) -> VfsResult<Bytes> {
        let data = &self.get(path)?.data;
        let (start, end) = clamp_range(path, data.len() as u64, offset, len)?;
        Ok(data.slice(start as usize..end as usize))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
