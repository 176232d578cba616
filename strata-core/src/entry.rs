// SPDX-License-Identifier: AGPL-3.0-or-later
//! File system entries

use crate::{Fingerprint, Path};
use serde::{Deserialize, Serialize};

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// What a backend knows about one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: Path,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub fingerprint: Option<Fingerprint>,
}

impl Entry {
    pub fn file(path: Path, size: u64, fingerprint: Fingerprint) -> Self {
        Self {
            path,
            kind: EntryKind::File,
            size: Some(size),
            fingerprint: Some(fingerprint),
        }
    }

    pub fn directory(path: Path) -> Self {
        Self { path, kind: EntryKind::Directory, size: None, fingerprint: None }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn name(&self) -> &str {
        self.path.filename()
    }
}
