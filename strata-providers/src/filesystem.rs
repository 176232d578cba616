// SPDX-License-Identifier: AGPL-3.0-or-later
//! Local filesystem backend

use bytes::Bytes;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use strata_core::{
    backend::{clamp_range, Backend, BackendCapabilities, DEFAULT_FINGERPRINT_PREFIX},
    error::{VfsError, VfsResult},
    Fingerprint, FingerprintHasher, Path,
};
use tracing::trace;

/// Symlink dereferences allowed before giving up on a path.
pub const DEFAULT_MAX_SYMLINK_HOPS: usize = 40;

/// Serves files below a host directory
///
/// The path part of a [`Path`] is taken relative to the root, so `assets:/a`
/// and `assets:a` both name `<root>/a`. Symlinks at the final component are
/// followed by the backend itself, relative targets against the directory
/// holding the link.
pub struct FilesystemBackend {
    name: String,
    root: PathBuf,
    fingerprint_prefix: u64,
    max_symlink_hops: usize,
    capabilities: BackendCapabilities,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            name: "filesystem".to_string(),
            root: root.into(),
            fingerprint_prefix: DEFAULT_FINGERPRINT_PREFIX,
            max_symlink_hops: DEFAULT_MAX_SYMLINK_HOPS,
            capabilities: BackendCapabilities::filesystem(),
        }
    }

    /// Bytes hashed by a non-exact fingerprint.
    pub fn with_fingerprint_prefix(mut self, bytes: u64) -> Self {
        self.fingerprint_prefix = bytes;
        self
    }

    pub fn with_max_symlink_hops(mut self, hops: usize) -> Self {
        self.max_symlink_hops = hops;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn fingerprint_prefix(&self) -> u64 {
        self.fingerprint_prefix
    }

    pub fn max_symlink_hops(&self) -> usize {
        self.max_symlink_hops
    }

    fn to_real_path(&self, path: &Path) -> PathBuf {
        self.root.join(path.path().trim_start_matches('/'))
    }

    /// Host path with symlinks at the last component dereferenced.
    fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let mut real = self.to_real_path(path);
        for hop in 0..=self.max_symlink_hops {
            let meta = fs::symlink_metadata(&real).map_err(|e| map_io(path, e))?;
            if !meta.file_type().is_symlink() {
                return Ok(real);
            }
            let target = fs::read_link(&real)?;
            trace!(path = %path, hop, target = %target.display(), "following symlink");
            real = match real.parent() {
                Some(dir) if target.is_relative() => dir.join(target),
                _ => target,
            };
        }
        Err(VfsError::SymlinkLimit { path: path.to_string(), hops: self.max_symlink_hops })
    }

    fn metadata(&self, path: &Path) -> VfsResult<(PathBuf, Metadata)> {
        let real = self.resolve(path)?;
        let meta = fs::metadata(&real).map_err(|e| map_io(path, e))?;
        Ok((real, meta))
    }

    fn open_file(&self, path: &Path) -> VfsResult<(File, u64)> {
        let (real, meta) = self.metadata(path)?;
        if !meta.is_file() {
            return Err(VfsError::NotAFile(path.to_string()));
        }
        let file = File::open(&real).map_err(|e| map_io(path, e))?;
        Ok((file, meta.len()))
    }
}

impl Backend for FilesystemBackend {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &self.capabilities
    }

    fn is_file(&self, path: &Path) -> bool {
        self.metadata(path).map(|(_, m)| m.is_file()).unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.metadata(path).map(|(_, m)| m.is_dir()).unwrap_or(false)
    }

    fn file_size(&self, path: &Path) -> VfsResult<u64> {
        let (_, meta) = self.metadata(path)?;
        if !meta.is_file() {
            return Err(VfsError::NotAFile(path.to_string()));
        }
        Ok(meta.len())
    }

    fn file_fingerprint(&self, path: &Path, force_exact: bool) -> VfsResult<Fingerprint> {
        let (mut file, size) = self.open_file(path)?;
        let mut hasher = FingerprintHasher::new();
        if force_exact || size <= self.fingerprint_prefix {
            io::copy(&mut file, &mut hasher)?;
            return Ok(hasher.finish());
        }
        io::copy(&mut file.take(self.fingerprint_prefix), &mut hasher)?;
        Ok(hasher.finish_truncated(size))
    }

    fn read_full(&self, path: &Path, buf: &mut [u8]) -> VfsResult<(usize, Fingerprint)> {
        let (mut file, size) = self.open_file(path)?;
        let n = read_up_to(&mut file, buf)?;
        trace!(path = %path, bytes = n, "read_full");
        // Same value as file_fingerprint(path, false) whenever the buffer
        // holds at least the hashed prefix.
        let prefix = usize::try_from(self.fingerprint_prefix).unwrap_or(usize::MAX);
        let fingerprint = if size > self.fingerprint_prefix && n >= prefix {
            FingerprintHasher::new().update(&buf[..prefix]).finish_truncated(size)
        } else {
            Fingerprint::of(&buf[..n])
        };
        Ok((n, fingerprint))
    }

    fn read_bytes(&self, path: &Path, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        let (mut file, _) = self.open_file(path)?;
        file.seek(SeekFrom::Start(offset))?;
        let n = read_up_to(&mut file, buf)?;
        trace!(path = %path, offset, bytes = n, "read_bytes");
        Ok(n)
    }

    fn file_contents(&self, path: &Path, offset: u64, len: Option<u64>) -> VfsResult<Bytes> {
        let (mut file, size) = self.open_file(path)?;
        let (start, end) = clamp_range(path, size, offset, len)?;
        file.seek(SeekFrom::Start(start))?;

        let mut buffer = Vec::with_capacity((end - start) as usize);
        file.take(end - start).read_to_end(&mut buffer)?;
        trace!(path = %path, offset = start, bytes = buffer.len(), "file_contents");
        Ok(Bytes::from(buffer))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn map_io(path: &Path, err: io::Error) -> VfsError {
    if err.kind() == io::ErrorKind::NotFound {
        VfsError::NotFound(path.to_string())
    } else {
        VfsError::Io(err)
    }
}

/// Fills `buf` as far as the reader allows.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FilesystemBackend) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("shaders")).unwrap();
        fs::write(dir.path().join("shaders/basic.glsl"), b"void main() {}").unwrap();
        fs::write(dir.path().join("empty.txt"), b"").unwrap();
        let backend = FilesystemBackend::new(dir.path());
        (dir, backend)
    }

    #[test]
    fn test_is_file_is_dir() {
        let (_dir, fs_backend) = setup();
        assert!(fs_backend.is_file(&Path::new("a:/shaders/basic.glsl")));
        assert!(!fs_backend.is_dir(&Path::new("a:/shaders/basic.glsl")));
        assert!(fs_backend.is_dir(&Path::new("a:/shaders")));
        assert!(!fs_backend.is_file(&Path::new("a:/shaders")));
        assert!(!fs_backend.exists(&Path::new("a:/missing")));
    }

    #[test]
    fn test_leading_slash_is_relative_to_root() {
        let (_dir, fs_backend) = setup();
        assert!(fs_backend.is_file(&Path::new("/shaders/basic.glsl")));
        assert!(fs_backend.is_file(&Path::new("shaders/basic.glsl")));
        assert!(fs_backend.is_dir(&Path::new("x:/")));
    }

    #[test]
    fn test_file_size() {
        let (_dir, fs_backend) = setup();
        assert_eq!(fs_backend.file_size(&Path::new("/shaders/basic.glsl")).unwrap(), 14);
        assert_eq!(fs_backend.file_size(&Path::new("/empty.txt")).unwrap(), 0);
        assert!(fs_backend.file_size(&Path::new("/missing")).unwrap_err().is_not_found());
        assert!(matches!(
            fs_backend.file_size(&Path::new("/shaders")),
            Err(VfsError::NotAFile(_))
        ));
    }

    #[test]
    fn test_file_contents_ranges() {
        let (_dir, fs_backend) = setup();
        let p = Path::new("/shaders/basic.glsl");
        assert_eq!(&fs_backend.read_all(&p).unwrap()[..], b"void main() {}");
        assert_eq!(&fs_backend.file_contents(&p, 5, Some(4)).unwrap()[..], b"main");
        assert_eq!(&fs_backend.file_contents(&p, 12, Some(100)).unwrap()[..], b"{}");
        assert!(fs_backend.file_contents(&p, 14, None).unwrap().is_empty());
        assert!(matches!(
            fs_backend.file_contents(&p, 15, None),
            Err(VfsError::OutOfRange { offset: 15, size: 14, .. })
        ));
    }

    #[test]
    fn test_read_full_and_read_bytes() {
        let (_dir, fs_backend) = setup();
        let p = Path::new("/shaders/basic.glsl");

        let mut buf = [0u8; 64];
        let (n, fp) = fs_backend.read_full(&p, &mut buf).unwrap();
        assert_eq!(n, 14);
        assert_eq!(fp, Fingerprint::of(b"void main() {}"));

        let mut small = [0u8; 4];
        let (n, fp) = fs_backend.read_full(&p, &mut small).unwrap();
        assert_eq!((n, &small), (4, b"void"));
        assert_eq!(fp, Fingerprint::of(b"void"));

        let n = fs_backend.read_bytes(&p, &mut small, 5).unwrap();
        assert_eq!(&small[..n], b"main");
        assert_eq!(fs_backend.read_bytes(&p, &mut small, 100).unwrap(), 0);
    }

    #[test]
    fn test_fingerprint_stable_and_detects_change() {
        let (dir, fs_backend) = setup();
        let p = Path::new("/shaders/basic.glsl");

        let first = fs_backend.file_fingerprint(&p, false).unwrap();
        assert_eq!(first, fs_backend.file_fingerprint(&p, false).unwrap());
        assert_eq!(first, Fingerprint::of(b"void main() {}"));

        fs::write(dir.path().join("shaders/basic.glsl"), b"void main() { discard; }").unwrap();
        assert_ne!(first, fs_backend.file_fingerprint(&p, false).unwrap());
    }

    #[test]
    fn test_truncated_fingerprint_folds_size() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"prefix-aaaa").unwrap();
        fs::write(dir.path().join("b"), b"prefix-bbbb").unwrap();
        fs::write(dir.path().join("c"), b"prefix-cccccc").unwrap();
        let fs_backend = FilesystemBackend::new(dir.path()).with_fingerprint_prefix(6);

        let a = Path::new("/a");
        let b = Path::new("/b");
        let c = Path::new("/c");

        // Same prefix and size: indistinguishable unless exact.
        assert_eq!(
            fs_backend.file_fingerprint(&a, false).unwrap(),
            fs_backend.file_fingerprint(&b, false).unwrap()
        );
        assert_ne!(
            fs_backend.file_fingerprint(&a, true).unwrap(),
            fs_backend.file_fingerprint(&b, true).unwrap()
        );

        // Same prefix, different size.
        assert_ne!(
            fs_backend.file_fingerprint(&a, false).unwrap(),
            fs_backend.file_fingerprint(&c, false).unwrap()
        );

        assert_eq!(
            fs_backend.file_fingerprint(&a, true).unwrap(),
            Fingerprint::of(b"prefix-aaaa")
        );
    }

    #[test]
    fn test_stat() {
        let (_dir, fs_backend) = setup();
        let entry = fs_backend.stat(&Path::new("a:/shaders/basic.glsl")).unwrap();
        assert!(entry.is_file());
        assert_eq!(entry.size, Some(14));
        assert_eq!(entry.name(), "basic.glsl");

        assert!(fs_backend.stat(&Path::new("a:/shaders")).unwrap().is_directory());
        assert!(fs_backend.stat(&Path::new("a:/nope")).unwrap_err().is_not_found());
    }

    #[cfg(unix)]
    mod symlinks {
        use super::*;
        use std::os::unix::fs::symlink;

        #[test]
        fn test_relative_target_resolves_against_link_dir() {
            let (dir, fs_backend) = setup();
            fs::create_dir(dir.path().join("links")).unwrap();
            symlink("../shaders/basic.glsl", dir.path().join("links/basic")).unwrap();

            let p = Path::new("/links/basic");
            assert!(fs_backend.is_file(&p));
            assert_eq!(&fs_backend.read_all(&p).unwrap()[..], b"void main() {}");
        }

        #[test]
        fn test_chain_within_limit() {
            let (dir, fs_backend) = setup();
            symlink("shaders/basic.glsl", dir.path().join("l1")).unwrap();
            symlink("l1", dir.path().join("l2")).unwrap();

            assert_eq!(fs_backend.file_size(&Path::new("/l2")).unwrap(), 14);

            let strict = FilesystemBackend::new(dir.path()).with_max_symlink_hops(1);
            assert!(strict.is_file(&Path::new("/l1")));
            assert!(matches!(
                strict.file_size(&Path::new("/l2")),
                Err(VfsError::SymlinkLimit { hops: 1, .. })
            ));
        }

        #[test]
        fn test_loop_hits_limit() {
            let (dir, fs_backend) = setup();
            symlink("loop_b", dir.path().join("loop_a")).unwrap();
            symlink("loop_a", dir.path().join("loop_b")).unwrap();

            let p = Path::new("/loop_a");
            assert!(!fs_backend.is_file(&p));
            assert!(matches!(
                fs_backend.file_fingerprint(&p, false),
                Err(VfsError::SymlinkLimit { hops: DEFAULT_MAX_SYMLINK_HOPS, .. })
            ));
        }

        #[test]
        fn test_dangling_link_is_not_found() {
            let (dir, fs_backend) = setup();
            symlink("nowhere", dir.path().join("dangling")).unwrap();
            assert!(fs_backend.file_size(&Path::new("/dangling")).unwrap_err().is_not_found());
        }
    }
}
