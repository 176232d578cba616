// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain-addressed virtual filesystem
//!
//! A [`Vfs`] maps domains such as `assets:` or `shaders:` to read-only
//! backends and resolves [`Path`]s like `assets:/textures/stone.png` against
//! them. Fingerprints let callers notice changed inputs cheaply; a
//! [`ChangeTracker`] turns that into created/changed/deleted events for hot
//! reload.
//!
//! ```no_run
//! use strata_vfs::{Path, Vfs};
//! use strata_providers::FilesystemBackend;
//!
//! let mut vfs = Vfs::new();
//! vfs.add_backend("assets", FilesystemBackend::new("/srv/game/assets"));
//!
//! let shader = Path::new("assets:/shaders/main.glsl");
//! let source = vfs.read_text_file(&shader)?;
//! let include = vfs.read_text_file(&(shader.parent_path() / "common.glsl"))?;
//! # Ok::<(), strata_vfs::VfsError>(())
//! ```

pub mod config;
pub mod router;
pub mod watch;

pub use config::{FingerprintCacheConfig, MountConfig, VfsConfig};
pub use router::{TextFile, Vfs};
pub use watch::{Change, ChangeEvent, ChangeTracker, WatchHandle};

pub use strata_core::{Backend, Entry, Fingerprint, Path, VfsError, VfsResult};
