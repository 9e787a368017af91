//! Testing utilities for TMX workspace
//!
//! Shared fixtures, a fault-injecting store and an engine harness.

#![allow(missing_docs)]

mod fault;

pub use fault::FaultyStore;

use std::sync::Arc;
use tmx_content::{ContentHash, Interface};
use tmx_core::{
    EngineConfig, EventBus, EventCollector, InMemoryMigrationRepository, Metadata,
    MigrationEngine, MigrationId, MigrationRecord, MigrationRepository, MigrationStatus,
    NewMigration, TracingSink,
};
use tmx_store::ContentStore;

/// Translation payload for a version, as JSON
pub fn translation_payload(version: &str) -> String {
    serde_json::json!({
        "app.version": { "fr": version, "en": version },
        "home.title": { "fr": format!("Accueil {version}"), "en": format!("Home {version}") },
        "login.button": { "fr": "Connexion", "en": "Log in" },
    })
    .to_string()
}

/// Conventional migration file name
pub fn migration_filename(interface: Interface, version: &str) -> String {
    format!("{interface}_{version}_2025-09-01.json")
}

/// Engine over a [`FaultyStore`] and an in-memory repository, collecting
/// every published event.
#[derive(Debug)]
pub struct EngineHarness {
    pub store: Arc<FaultyStore>,
    pub repository: Arc<InMemoryMigrationRepository>,
    pub events: Arc<EventCollector>,
    pub config: EngineConfig,
    pub engine: MigrationEngine,
}

impl Default for EngineHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(FaultyStore::new());
        let repository = Arc::new(InMemoryMigrationRepository::new());
        let events = Arc::new(EventCollector::new());
        let bus = EventBus::new()
            .with_sink(events.clone())
            .with_sink(Arc::new(TracingSink));
        let engine = MigrationEngine::new(store.clone(), repository.clone(), config.clone(), bus);
        Self {
            store,
            repository,
            events,
            config,
            engine,
        }
    }

    /// Set the live content of an interface
    pub fn seed_live(&self, interface: Interface, content: &str) {
        self.store
            .inner()
            .seed(interface, &self.config.current_file_name(), content)
            .unwrap();
    }

    /// Live content of an interface, `None` if never written
    pub async fn live(&self, interface: Interface) -> Option<Vec<u8>> {
        match self
            .store
            .download(interface, &self.config.current_file_name())
            .await
        {
            Ok(content) => Some(content),
            Err(error) if error.is_not_found() => None,
            Err(error) => panic!("reading live content: {error}"),
        }
    }

    /// Seed a payload for `version` and track it with its real checksum
    pub async fn track(&self, interface: Interface, version: &str) -> MigrationRecord {
        let filename = migration_filename(interface, version);
        self.store
            .inner()
            .seed(interface, &filename, translation_payload(version))
            .unwrap();
        self.engine
            .track(interface, &filename, version, Metadata::new())
            .await
            .unwrap()
    }

    /// Seed a payload for `version` and insert a record with `checksum`
    pub async fn track_with_checksum(
        &self,
        interface: Interface,
        version: &str,
        checksum: &str,
    ) -> MigrationRecord {
        let filename = migration_filename(interface, version);
        self.store
            .inner()
            .seed(interface, &filename, translation_payload(version))
            .unwrap();
        self.repository
            .insert(NewMigration::new(interface, &filename, version, checksum))
            .await
            .unwrap()
    }

    /// Insert a record with caller-supplied metadata
    pub async fn track_with_metadata(
        &self,
        interface: Interface,
        version: &str,
        metadata: Metadata,
    ) -> MigrationRecord {
        let filename = migration_filename(interface, version);
        let payload = translation_payload(version);
        self.store.inner().seed(interface, &filename, payload.clone()).unwrap();
        let checksum = ContentHash::compute(payload.as_bytes()).to_string();
        self.repository
            .insert(NewMigration::new(interface, &filename, version, checksum).with_metadata(metadata))
            .await
            .unwrap()
    }

    /// Overwrite a record's status without going through the state machine
    pub async fn force_status(&self, id: MigrationId, status: MigrationStatus) -> MigrationRecord {
        let mut record = self.record(id);
        record.status = status;
        if status == MigrationStatus::Completed && record.executed_at.is_none() {
            record.executed_at = Some(chrono::Utc::now());
        }
        self.repository.save(&record).await.unwrap();
        record
    }

    /// Persisted record
    pub fn record(&self, id: MigrationId) -> MigrationRecord {
        self.repository.get(id).unwrap()
    }
}
