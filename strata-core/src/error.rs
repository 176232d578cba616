// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for Strata

use thiserror::Error;

/// Result type alias
pub type VfsResult<T> = Result<T, VfsError>;

/// Main error type
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Backend not found: {0}")]
    BackendNotFound(String),

    #[error("Path has no domain: {0}")]
    MissingDomain(String),

    #[error("Offset {offset} is past the end of {path} ({size} bytes)")]
    OutOfRange { path: String, offset: u64, size: u64 },

    #[error("Too many symlink hops ({hops}) resolving {path}")]
    SymlinkLimit { path: String, hops: usize },

    #[error("Not valid UTF-8 text: {0}")]
    NotText(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// True for every flavour of "there is nothing at this address".
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) | VfsError::BackendNotFound(_) | VfsError::MissingDomain(_) => true,
            VfsError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
