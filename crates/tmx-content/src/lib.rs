//! TMX Content Primitives
//!
//! Opaque content bundles addressed per client interface.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: SHA-256 integrity digest over a payload
//! - [`Interface`]: closed set of client surfaces, each owning one live bundle
//! - [`ContentFormat`]: declared serialization of a stored blob
//! - [`ObjectKey`]: validated key inside the content store
//!
//! # Example
//!
//! ```rust
//! use tmx_content::{ContentHash, Interface, ObjectKey};
//!
//! let payload = br#"{"welcome":{"fr":"Bienvenue"}}"#;
//! let checksum = ContentHash::compute(payload);
//! assert!(checksum.matches(&checksum.to_string()));
//!
//! let key = ObjectKey::migration(Interface::Mobile, "current.json").unwrap();
//! assert_eq!(key.as_str(), "migrations/mobile/current.json");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod format;
mod hash;
mod interface;
mod key;

pub use format::ContentFormat;
pub use hash::{ContentHash, HashError};
pub use interface::{Interface, UnknownInterface};
pub use key::{KeyError, ObjectKey, BACKUP_TIMESTAMP_FORMAT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
