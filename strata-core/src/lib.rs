//! Strata Core
//!
//! Core types for the domain-addressed virtual filesystem: paths, the
//! read-only backend trait, fingerprints and errors.

pub mod backend;
pub mod entry;
pub mod error;
pub mod fingerprint;
pub mod path;

pub use backend::{Backend, BackendCapabilities, DEFAULT_FINGERPRINT_PREFIX};
pub use entry::{Entry, EntryKind};
pub use error::{VfsError, VfsResult};
pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use path::{Part, Path};
