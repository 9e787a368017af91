//! TMX Core - translation migration engine
//!
//! Applies versioned translation payloads as the live content of an
//! interface and rolls them back to the snapshot taken just before:
//! - Records carry status, checksum, batch and an additive metadata map
//! - Every apply or rollback runs in a unit of work holding the record lock
//! - Anticipated failures are [`MigrationResult`]s; faults are [`EngineError`]s
//! - Outcomes are published to an [`EventBus`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tmx_core::prelude::*;
//! use tmx_store::InMemoryContentStore;
//!
//! # async fn example() -> Result<(), EngineError> {
//! let store = Arc::new(InMemoryContentStore::new());
//! let repository = Arc::new(InMemoryMigrationRepository::new());
//! let engine = MigrationEngine::new(store, repository, EngineConfig::default(), EventBus::new());
//!
//! let record = engine
//!     .track(Interface::Mobile, "mobile_v1.2.0.json", "v1.2.0", Metadata::new())
//!     .await?;
//! let result = engine.apply_migration(record.id, true, true).await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod apply;
pub mod config;
pub mod dto;
pub mod engine;
pub mod error;
pub mod events;
pub mod metadata;
pub mod record;
pub mod repository;
pub mod rollback;
pub mod service;
pub mod status;
pub mod transaction;

pub use apply::ApplyOrchestrator;
pub use config::EngineConfig;
pub use dto::{ApplyRequest, FailureKind, MigrationResult, RollbackRequest};
pub use engine::MigrationEngine;
pub use error::EngineError;
pub use events::{ChannelSink, EventBus, EventCollector, EventSink, MigrationEvent, TracingSink};
pub use metadata::{Metadata, MetadataError};
pub use record::{MigrationId, MigrationRecord, NewMigration, RecordError};
pub use repository::{
    InMemoryMigrationRepository, JsonFileRepository, MigrationFilter, MigrationRepository,
    RepositoryError,
};
pub use rollback::RollbackOrchestrator;
pub use service::MigrationService;
pub use status::{MigrationStatus, TransitionError};
pub use transaction::UnitOfWork;
pub use tmx_content::Interface;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the engine
    pub use crate::{
        ApplyRequest, EngineConfig, EngineError, EventBus, Interface, InMemoryMigrationRepository,
        Metadata, MigrationEngine, MigrationId, MigrationRecord, MigrationRepository,
        MigrationResult, MigrationStatus, RollbackRequest,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
