// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage backends for Strata
//!
//! - [`FilesystemBackend`]: files below a host directory
//! - [`MemoryBackend`]: buffers registered at runtime

pub mod filesystem;
pub mod memory;

pub use filesystem::{FilesystemBackend, DEFAULT_MAX_SYMLINK_HOPS};
pub use memory::MemoryBackend;
