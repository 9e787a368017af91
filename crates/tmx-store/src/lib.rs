//! TMX Content Store
//!
//! The storage collaborator of the migration engine: live content per
//! interface, migration payloads, and pre-apply backups.
//!
//! # Backends
//!
//! - [`InMemoryContentStore`]: concurrent map, for tests and embedding
//! - [`FsContentStore`]: directory tree standing in for an object store
//!
//! Other backends (object storage, etc.) implement the four primitives of
//! [`ContentStore`] and inherit the interface-level operations.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod fs;
mod memory;
mod store;

pub use error::StoreError;
pub use fs::FsContentStore;
pub use memory::{InMemoryContentStore, StoredObject};
pub use store::ContentStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
