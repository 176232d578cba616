// SPDX-License-Identifier: AGPL-3.0-or-later
//! VFS configuration
//!
//! ```toml
//! [fingerprint_cache]
//! enabled = true
//! max_entries = 1000
//! max_age_ticks = 100
//! ttl_ms = 500
//!
//! [[mount]]
//! domain = "assets"
//! root = "/srv/game/assets"
//! fingerprint_prefix_bytes = 65536
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path as StdPath, PathBuf};
use std::time::Duration;
use strata_core::{VfsError, VfsResult};

const CONFIG_FILE_NAME: &str = "strata.toml";

/// Fingerprint memo settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintCacheConfig {
    pub enabled: bool,
    /// Most paths remembered at once
    pub max_entries: usize,
    /// Cached lookups an entry may go untouched before it is dropped
    pub max_age_ticks: u32,
    /// Wall-clock lifetime of a remembered fingerprint
    pub ttl_ms: u64,
}

impl FingerprintCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for FingerprintCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            max_age_ticks: 100,
            ttl_ms: 500,
        }
    }
}

/// A host directory served under a domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub domain: String,
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint_prefix_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_symlink_hops: Option<usize>,
}

impl MountConfig {
    pub fn new(domain: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            domain: domain.into(),
            root: root.into(),
            fingerprint_prefix_bytes: None,
            max_symlink_hops: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VfsConfig {
    #[serde(default)]
    pub fingerprint_cache: FingerprintCacheConfig,
    #[serde(default, rename = "mount")]
    pub mounts: Vec<MountConfig>,
}

impl VfsConfig {
    pub fn from_toml_str(s: &str) -> VfsResult<Self> {
        toml::from_str(s).map_err(|e| VfsError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> VfsResult<String> {
        toml::to_string_pretty(self).map_err(|e| VfsError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<StdPath>) -> VfsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), mounts = config.mounts.len(), "loaded config");
        Ok(config)
    }

    /// `strata.toml` in the per-user config directory, if there is one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "strata", "strata")
            .map(|d| d.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Loads the default config file, or the defaults when it does not exist.
    pub fn load_default() -> VfsResult<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }
}
