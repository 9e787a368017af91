//! Caller-facing entry point
//!
//! [`MigrationEngine`] wires a content store, a repository and an event bus
//! into the service and both orchestrators.

use crate::apply::ApplyOrchestrator;
use crate::config::EngineConfig;
use crate::dto::{ApplyRequest, MigrationResult, RollbackRequest};
use crate::error::EngineError;
use crate::events::EventBus;
use crate::metadata::Metadata;
use crate::record::{MigrationId, MigrationRecord};
use crate::repository::{MigrationFilter, MigrationRepository};
use crate::rollback::RollbackOrchestrator;
use crate::service::MigrationService;
use std::sync::Arc;
use tmx_content::Interface;
use tmx_store::ContentStore;

/// Migration engine
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    repository: Arc<dyn MigrationRepository>,
    service: Arc<MigrationService>,
    apply: ApplyOrchestrator,
    rollback: RollbackOrchestrator,
}

impl MigrationEngine {
    /// Create engine
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        repository: Arc<dyn MigrationRepository>,
        config: EngineConfig,
        events: EventBus,
    ) -> Self {
        let service = Arc::new(MigrationService::new(store, repository.clone(), config));
        Self {
            apply: ApplyOrchestrator::new(service.clone(), repository.clone(), events.clone()),
            rollback: RollbackOrchestrator::new(service.clone(), repository.clone(), events),
            repository,
            service,
        }
    }

    /// Promote a migration's payload to live content
    ///
    /// # Errors
    /// See [`ApplyOrchestrator::execute`]
    pub async fn apply_migration(
        &self,
        id: MigrationId,
        create_backup: bool,
        validate_checksum: bool,
    ) -> Result<MigrationResult, EngineError> {
        self.apply
            .execute(
                ApplyRequest::new(id)
                    .create_backup(create_backup)
                    .validate_checksum(validate_checksum),
            )
            .await
    }

    /// Apply several migrations under one batch number
    ///
    /// # Errors
    /// See [`ApplyOrchestrator::execute_batch`]
    pub async fn apply_batch(
        &self,
        ids: &[MigrationId],
        create_backup: bool,
        validate_checksum: bool,
    ) -> Result<Vec<MigrationResult>, EngineError> {
        self.apply
            .execute_batch(ids, create_backup, validate_checksum)
            .await
    }

    /// Restore the content replaced by an applied migration
    ///
    /// # Errors
    /// See [`RollbackOrchestrator::execute`]
    pub async fn rollback_migration(
        &self,
        id: MigrationId,
        reason: impl Into<String>,
    ) -> Result<MigrationResult, EngineError> {
        self.rollback.execute(RollbackRequest::new(id, reason)).await
    }

    /// Start tracking an artifact already in the store
    ///
    /// # Errors
    /// See [`MigrationService::track`]
    pub async fn track(
        &self,
        interface: Interface,
        filename: &str,
        version: &str,
        metadata: Metadata,
    ) -> Result<MigrationRecord, EngineError> {
        self.service.track(interface, filename, version, metadata).await
    }

    /// Load one record
    ///
    /// # Errors
    /// `EngineError::NotFound` for an unknown id
    pub async fn migration(&self, id: MigrationId) -> Result<MigrationRecord, EngineError> {
        self.repository
            .find(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    /// Records matching `filter`, by id
    ///
    /// # Errors
    /// Repository faults
    pub async fn migrations(
        &self,
        filter: MigrationFilter,
    ) -> Result<Vec<MigrationRecord>, EngineError> {
        Ok(self.repository.list(filter).await?)
    }

    /// Underlying service
    #[inline]
    #[must_use]
    pub fn service(&self) -> &MigrationService {
        &self.service
    }
}
