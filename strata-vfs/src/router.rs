// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain router
//!
//! [`Vfs`] owns one backend per domain and sends every request to the
//! backend named by the request path's domain.

use bytes::Bytes;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use strata_cache::{CacheStats, LruCache};
use strata_core::{Backend, Entry, Fingerprint, Path, VfsError, VfsResult};
use strata_providers::FilesystemBackend;
use tracing::{debug, trace, warn};

use crate::config::{FingerprintCacheConfig, VfsConfig};

/// Contents of a text file along with the fingerprint of exactly those bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFile {
    pub text: String,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Copy)]
struct CachedFingerprint {
    fingerprint: Fingerprint,
    updated: Instant,
}

struct FingerprintMemo {
    entries: RefCell<LruCache<Path, CachedFingerprint>>,
    ttl: Duration,
}

/// Virtual filesystem routing paths to backends by domain
///
/// Not `Sync`: the fingerprint memo is updated through `&self`. Share a `Vfs`
/// between threads behind a lock, or give each thread its own.
pub struct Vfs {
    backends: BTreeMap<String, Box<dyn Backend>>,
    memo: Option<FingerprintMemo>,
}

impl Vfs {
    /// Empty router with the default fingerprint memo.
    pub fn new() -> Self {
        Self::with_fingerprint_cache(&FingerprintCacheConfig::default())
    }

    pub fn with_fingerprint_cache(config: &FingerprintCacheConfig) -> Self {
        let memo = config.enabled.then(|| FingerprintMemo {
            entries: RefCell::new(LruCache::new(
                Some(config.max_entries),
                Some(config.max_age_ticks),
            )),
            ttl: config.ttl(),
        });
        Self { backends: BTreeMap::new(), memo }
    }

    /// Builds a router with a [`FilesystemBackend`] per configured mount.
    pub fn from_config(config: &VfsConfig) -> VfsResult<Self> {
        let mut vfs = Self::with_fingerprint_cache(&config.fingerprint_cache);
        for mount in &config.mounts {
            if !mount.root.is_dir() {
                return Err(VfsError::Config(format!(
                    "mount {}: {} is not a directory",
                    mount.domain,
                    mount.root.display()
                )));
            }
            let mut backend = FilesystemBackend::new(&mount.root)
                .with_name(mount.root.display().to_string());
            if let Some(prefix) = mount.fingerprint_prefix_bytes {
                backend = backend.with_fingerprint_prefix(prefix);
            }
            if let Some(hops) = mount.max_symlink_hops {
                backend = backend.with_max_symlink_hops(hops);
            }
            vfs.add_backend(&mount.domain, backend);
        }
        Ok(vfs)
    }

    /// Registers `backend` under `domain`, adding the trailing `:` if missing.
    ///
    /// Returns the backend previously registered under that domain.
    pub fn add_backend<B: Backend>(
        &mut self,
        domain: impl AsRef<str>,
        backend: B,
    ) -> Option<Box<dyn Backend>> {
        let domain = normalize_domain(domain.as_ref());
        debug!(domain = %domain, backend = backend.display_name(), "adding backend");
        let previous = self.backends.insert(domain.clone(), Box::new(backend));
        if let Some(previous) = &previous {
            warn!(domain = %domain, replaced = previous.display_name(), "replaced backend");
        }
        self.clear_fingerprint_cache();
        previous
    }

    pub fn remove_backend(&mut self, domain: impl AsRef<str>) -> bool {
        let domain = normalize_domain(domain.as_ref());
        let removed = self.backends.remove(&domain).is_some();
        if removed {
            debug!(domain = %domain, "removed backend");
            self.clear_fingerprint_cache();
        }
        removed
    }

    pub fn get_backend(&self, domain: impl AsRef<str>) -> Option<&dyn Backend> {
        self.backends
            .get(&normalize_domain(domain.as_ref()))
            .map(|b| b.as_ref())
    }

    /// Typed access to a registered backend, e.g. to add files to a
    /// [`MemoryBackend`](strata_providers::MemoryBackend).
    ///
    /// Fingerprints remembered for that domain may stay stale for up to the
    /// memo's TTL; call [`Vfs::invalidate_fingerprint`] to drop them early.
    pub fn backend_mut<B: Backend>(&mut self, domain: impl AsRef<str>) -> Option<&mut B> {
        self.backends
            .get_mut(&normalize_domain(domain.as_ref()))?
            .as_any_mut()
            .downcast_mut::<B>()
    }

    /// Registered domains in probing order.
    pub fn domains(&self) -> impl Iterator<Item = &str> + '_ {
        self.backends.keys().map(String::as_str)
    }

    /// The backend serving `path`, if its domain is set and registered.
    pub fn lookup_backend(&self, path: &Path) -> Option<&dyn Backend> {
        let domain = path.domain();
        if domain.is_empty() {
            return None;
        }
        self.backends.get(domain).map(|b| b.as_ref())
    }

    /// Gives a domain-less path the domain of the first backend (in domain
    /// order) holding a file or directory at it.
    ///
    /// Paths that already have a domain are returned as they are. When
    /// several backends hold the path, the first domain wins.
    pub fn make_canonical(&self, path: &Path) -> Option<Path> {
        if !path.domain().is_empty() {
            return Some(path.clone());
        }
        self.backends
            .iter()
            .find(|(_, backend)| backend.exists(path))
            .map(|(domain, _)| Path::new(format!("{domain}{path}")))
    }

    pub fn read_text_file(&self, path: &Path) -> VfsResult<TextFile> {
        let backend = self.resolve(path)?;
        if !backend.is_file(path) {
            return Err(if backend.is_dir(path) {
                VfsError::NotAFile(path.to_string())
            } else {
                VfsError::NotFound(path.to_string())
            });
        }

        let size = backend.file_size(path)?;
        let mut buf = vec![0u8; size as usize];
        let (n, fingerprint) = backend.read_full(path, &mut buf)?;
        buf.truncate(n);
        debug!(path = %path, bytes = n, "read text file");

        let text = String::from_utf8(buf).map_err(|_| VfsError::NotText(path.to_string()))?;
        Ok(TextFile { text, fingerprint })
    }

    pub fn read_file(&self, path: &Path) -> VfsResult<Bytes> {
        self.resolve(path)?.read_all(path)
    }

    pub fn stat(&self, path: &Path) -> VfsResult<Entry> {
        self.resolve(path)?.stat(path)
    }

    /// Fingerprint of `path` as computed by its backend.
    ///
    /// With `allow_cached` a value computed less than the memo's TTL ago may
    /// be returned instead of asking the backend. Every value the backend
    /// produces is remembered, cached or not.
    pub fn get_fingerprint(&self, path: &Path, allow_cached: bool) -> VfsResult<Fingerprint> {
        let backend = self.resolve(path)?;

        if let (true, Some(memo)) = (allow_cached, &self.memo) {
            let mut entries = memo.entries.borrow_mut();
            entries.advance_clock();
            let hit = entries
                .lookup_or_remove(path, |_, cached| cached.updated.elapsed() > memo.ttl)
                .map(|cached| cached.fingerprint);
            if let Some(fingerprint) = hit {
                trace!(path = %path, "fingerprint cache hit");
                return Ok(fingerprint);
            }
            debug!(path = %path, "fingerprint cache miss");
        }

        let result = backend.file_fingerprint(path, false);
        if let Some(memo) = &self.memo {
            let mut entries = memo.entries.borrow_mut();
            match &result {
                Ok(fingerprint) => entries.insert(
                    path.clone(),
                    CachedFingerprint { fingerprint: *fingerprint, updated: Instant::now() },
                ),
                Err(_) => {
                    entries.remove(path);
                }
            }
        }
        result
    }

    /// Forgets the remembered fingerprint of `path`.
    pub fn invalidate_fingerprint(&self, path: &Path) -> bool {
        match &self.memo {
            Some(memo) => memo.entries.borrow_mut().remove(path),
            None => false,
        }
    }

    pub fn clear_fingerprint_cache(&self) {
        if let Some(memo) = &self.memo {
            memo.entries.borrow_mut().clear();
        }
    }

    /// Memo statistics, `None` when the memo is disabled.
    pub fn fingerprint_cache_stats(&self) -> Option<CacheStats> {
        self.memo.as_ref().map(|memo| memo.entries.borrow().stats())
    }

    fn resolve(&self, path: &Path) -> VfsResult<&dyn Backend> {
        let domain = path.domain();
        if domain.is_empty() {
            return Err(VfsError::MissingDomain(path.to_string()));
        }
        self.lookup_backend(path)
            .ok_or_else(|| VfsError::BackendNotFound(domain.to_string()))
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Vfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vfs")
            .field("domains", &self.backends.keys().collect::<Vec<_>>())
            .field("fingerprint_cache", &self.memo.is_some())
            .finish()
    }
}

fn normalize_domain(domain: &str) -> String {
    if domain.ends_with(':') {
        domain.to_string()
    } else {
        format!("{domain}:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use strata_providers::MemoryBackend;

    fn memory(files: &[(&str, &[u8])]) -> MemoryBackend {
        let mut mem = MemoryBackend::new();
        for (path, data) in files {
            mem.set_file(*path, data);
        }
        mem
    }

    fn long_ttl() -> FingerprintCacheConfig {
        FingerprintCacheConfig { ttl_ms: 3_600_000, ..Default::default() }
    }

    #[test]
    fn test_vfs_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Vfs>();
    }

    #[test]
    fn test_domain_normalization() {
        let mut vfs = Vfs::new();
        assert!(vfs.add_backend("mem", MemoryBackend::new()).is_none());
        assert!(vfs.get_backend("mem:").is_some());
        assert!(vfs.get_backend("mem").is_some());
        assert_eq!(vfs.domains().collect::<Vec<_>>(), vec!["mem:"]);

        assert!(vfs.add_backend("mem:", MemoryBackend::new()).is_some());
        assert_eq!(vfs.domains().count(), 1);

        assert!(vfs.remove_backend("mem"));
        assert!(!vfs.remove_backend("mem:"));
        assert!(vfs.get_backend("mem").is_none());
    }

    #[test]
    fn test_lookup_backend() {
        let mut vfs = Vfs::new();
        vfs.add_backend("a", memory(&[]).with_name("first"));

        let backend = vfs.lookup_backend(&Path::new("a:/x")).unwrap();
        assert_eq!(backend.display_name(), "first");
        assert!(vfs.lookup_backend(&Path::new("/x")).is_none());
        assert!(vfs.lookup_backend(&Path::new("b:/x")).is_none());
    }

    #[test]
    fn test_resolve_errors() {
        let vfs = Vfs::new();
        assert!(matches!(
            vfs.read_file(&Path::new("/x")),
            Err(VfsError::MissingDomain(_))
        ));
        assert!(matches!(
            vfs.get_fingerprint(&Path::new("nope:/x"), true),
            Err(VfsError::BackendNotFound(d)) if d == "nope:"
        ));
    }

    #[test]
    fn test_make_canonical_probes_in_domain_order() {
        let mut vfs = Vfs::new();
        vfs.add_backend("zeta", memory(&[("/shared.txt", b"z"), ("/only_z.txt", b"z")]));
        vfs.add_backend("alpha", memory(&[("/shared.txt", b"a")]));

        assert_eq!(
            vfs.make_canonical(&Path::new("/shared.txt")),
            Some(Path::new("alpha:/shared.txt"))
        );
        assert_eq!(
            vfs.make_canonical(&Path::new("/only_z.txt")),
            Some(Path::new("zeta:/only_z.txt"))
        );
        assert_eq!(vfs.make_canonical(&Path::new("/missing.txt")), None);
        assert_eq!(
            vfs.make_canonical(&Path::new("other:/missing.txt")),
            Some(Path::new("other:/missing.txt"))
        );
    }

    #[test]
    fn test_read_text_file() {
        let mut vfs = Vfs::new();
        vfs.add_backend("m", memory(&[("/hello.txt", b"hello"), ("/bin", &[0xff, 0xfe])]));

        let file = vfs.read_text_file(&Path::new("m:/hello.txt")).unwrap();
        assert_eq!(file.text, "hello");
        assert_eq!(file.fingerprint, Fingerprint::of(b"hello"));

        assert!(matches!(
            vfs.read_text_file(&Path::new("m:/bin")),
            Err(VfsError::NotText(_))
        ));
        assert!(vfs.read_text_file(&Path::new("m:/nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_read_text_file_rejects_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut vfs = Vfs::new();
        vfs.add_backend("d", FilesystemBackend::new(dir.path()));

        assert!(matches!(
            vfs.read_text_file(&Path::new("d:/sub")),
            Err(VfsError::NotAFile(_))
        ));
        assert!(vfs.stat(&Path::new("d:/sub")).unwrap().is_directory());
    }

    #[test]
    fn test_cached_fingerprint_within_ttl() {
        let mut vfs = Vfs::with_fingerprint_cache(&long_ttl());
        vfs.add_backend("m", memory(&[("/f", b"one")]));
        let p = Path::new("m:/f");

        let first = vfs.get_fingerprint(&p, true).unwrap();
        vfs.backend_mut::<MemoryBackend>("m").unwrap().set_file("/f", b"two");

        // The memo still answers with the old value.
        assert_eq!(vfs.get_fingerprint(&p, true).unwrap(), first);

        // An uncached call sees the change and refreshes the memo.
        let second = vfs.get_fingerprint(&p, false).unwrap();
        assert_ne!(second, first);
        assert_eq!(vfs.get_fingerprint(&p, true).unwrap(), second);
    }

    #[test]
    fn test_cached_fingerprint_expires() {
        let config = FingerprintCacheConfig { ttl_ms: 10, ..Default::default() };
        let mut vfs = Vfs::with_fingerprint_cache(&config);
        vfs.add_backend("m", memory(&[("/f", b"one")]));
        let p = Path::new("m:/f");

        let first = vfs.get_fingerprint(&p, true).unwrap();
        vfs.backend_mut::<MemoryBackend>("m").unwrap().set_file("/f", b"two");
        thread::sleep(Duration::from_millis(30));

        assert_ne!(vfs.get_fingerprint(&p, true).unwrap(), first);
    }

    #[test]
    fn test_invalidate_fingerprint() {
        let mut vfs = Vfs::with_fingerprint_cache(&long_ttl());
        vfs.add_backend("m", memory(&[("/f", b"one")]));
        let p = Path::new("m:/f");

        let first = vfs.get_fingerprint(&p, true).unwrap();
        vfs.backend_mut::<MemoryBackend>("m").unwrap().set_file("/f", b"two");
        assert!(vfs.invalidate_fingerprint(&p));
        assert!(!vfs.invalidate_fingerprint(&p));
        assert_ne!(vfs.get_fingerprint(&p, true).unwrap(), first);
    }

    #[test]
    fn test_failed_fingerprint_is_forgotten() {
        let mut vfs = Vfs::with_fingerprint_cache(&long_ttl());
        vfs.add_backend("m", memory(&[("/f", b"one")]));
        let p = Path::new("m:/f");

        vfs.get_fingerprint(&p, true).unwrap();
        vfs.backend_mut::<MemoryBackend>("m").unwrap().forget_file(&p);
        assert!(vfs.get_fingerprint(&p, false).is_err());
        assert!(vfs.get_fingerprint(&p, true).is_err());
    }

    #[test]
    fn test_disabled_memo() {
        let config = FingerprintCacheConfig { enabled: false, ..Default::default() };
        let mut vfs = Vfs::with_fingerprint_cache(&config);
        vfs.add_backend("m", memory(&[("/f", b"one")]));
        let p = Path::new("m:/f");

        let first = vfs.get_fingerprint(&p, true).unwrap();
        vfs.backend_mut::<MemoryBackend>("m").unwrap().set_file("/f", b"two");
        assert_ne!(vfs.get_fingerprint(&p, true).unwrap(), first);
        assert!(vfs.fingerprint_cache_stats().is_none());
    }

    #[test]
    fn test_memo_is_bounded() {
        let config = FingerprintCacheConfig { max_entries: 2, ..long_ttl() };
        let mut vfs = Vfs::with_fingerprint_cache(&config);
        vfs.add_backend("m", memory(&[("/a", b"a"), ("/b", b"b"), ("/c", b"c")]));

        for name in ["m:/a", "m:/b", "m:/c"] {
            vfs.get_fingerprint(&Path::new(name), true).unwrap();
        }
        let stats = vfs.fingerprint_cache_stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.eviction_count, 1);
    }

    #[test]
    fn test_replacing_backend_clears_memo() {
        let mut vfs = Vfs::with_fingerprint_cache(&long_ttl());
        vfs.add_backend("m", memory(&[("/f", b"one")]));
        let p = Path::new("m:/f");
        let first = vfs.get_fingerprint(&p, true).unwrap();

        vfs.add_backend("m", memory(&[("/f", b"two")]));
        assert_ne!(vfs.get_fingerprint(&p, true).unwrap(), first);
    }

    #[test]
    fn test_backend_mut_type_mismatch() {
        let mut vfs = Vfs::new();
        vfs.add_backend("m", MemoryBackend::new());
        assert!(vfs.backend_mut::<FilesystemBackend>("m").is_none());
        assert!(vfs.backend_mut::<MemoryBackend>("other").is_none());
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();

        let mut config = VfsConfig::default();
        config.mounts.push(crate::MountConfig::new("data", dir.path()));
        let vfs = Vfs::from_config(&config).unwrap();
        assert_eq!(
            vfs.read_text_file(&Path::new("data:/a.txt")).unwrap().text,
            "alpha"
        );

        config.mounts.push(crate::MountConfig::new("bad", dir.path().join("a.txt")));
        assert!(matches!(Vfs::from_config(&config), Err(VfsError::Config(_))));
    }
}
