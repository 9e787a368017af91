//! Rollback orchestrator
//!
//! Restores the snapshot taken before a migration was applied and marks the
//! record rolled back. Only completed records with a recorded backup qualify.

use crate::apply::display_metadata;
use crate::dto::{FailureKind, MigrationResult, RollbackRequest};
use crate::error::EngineError;
use crate::events::{EventBus, MigrationEvent};
use crate::repository::MigrationRepository;
use crate::service::MigrationService;
use crate::status::MigrationStatus;
use crate::transaction::UnitOfWork;
use chrono::Utc;
use std::sync::Arc;

/// Runs [`RollbackRequest`]s
#[derive(Debug, Clone)]
pub struct RollbackOrchestrator {
    service: Arc<MigrationService>,
    repository: Arc<dyn MigrationRepository>,
    events: EventBus,
}

impl RollbackOrchestrator {
    /// Create orchestrator
    #[must_use]
    pub fn new(
        service: Arc<MigrationService>,
        repository: Arc<dyn MigrationRepository>,
        events: EventBus,
    ) -> Self {
        Self {
            service,
            repository,
            events,
        }
    }

    /// Roll back one migration
    ///
    /// Precondition failures and a failed restore publish no event.
    ///
    /// # Errors
    /// - `EngineError::NotFound` for an unknown id
    /// - Store and repository faults; the record then stays completed
    pub async fn execute(&self, request: RollbackRequest) -> Result<MigrationResult, EngineError> {
        tracing::info!(
            migration_id = %request.migration_id,
            reason = %request.reason,
            "rolling back migration"
        );
        match self.rollback_once(&request).await {
            Ok(result) => Ok(result),
            Err(error) => {
                tracing::error!(
                    migration_id = %request.migration_id,
                    error = %error,
                    "rollback aborted"
                );
                Err(error)
            }
        }
    }

    async fn rollback_once(&self, request: &RollbackRequest) -> Result<MigrationResult, EngineError> {
        let id = request.migration_id;
        let mut uow = UnitOfWork::begin(self.repository.as_ref(), id).await?;
        let metadata = display_metadata(uow.record());

        let status = uow.record().status;
        if status != MigrationStatus::Completed {
            let failure = if status == MigrationStatus::RolledBack {
                FailureKind::AlreadyRolledBack
            } else {
                FailureKind::NotCompleted
            };
            tracing::warn!(migration_id = %id, status = %status, "migration is not completed");
            return Ok(MigrationResult::failure(id, failure).with_metadata(metadata));
        }

        let Some(backup_path) = uow.record().backup_path().map(str::to_string) else {
            tracing::warn!(migration_id = %id, "no backup recorded for migration");
            return Ok(MigrationResult::failure(id, FailureKind::NoBackup).with_metadata(metadata));
        };

        if !self.service.rollback(uow.record()).await? {
            return Ok(
                MigrationResult::failure(id, FailureKind::RollbackFailed).with_metadata(metadata)
            );
        }

        uow.record_mut().mark_rolled_back(&request.reason, Utc::now())?;
        let record = uow.commit().await?;

        self.events.publish(&MigrationEvent::RolledBack {
            record,
            reason: request.reason.clone(),
        });
        tracing::info!(migration_id = %id, backup_path = %backup_path, "migration rolled back");
        Ok(MigrationResult::success(id, Some(backup_path)).with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::ApplyOrchestrator;
    use crate::config::EngineConfig;
    use crate::dto::ApplyRequest;
    use crate::events::EventCollector;
    use crate::metadata::ROLLBACK_REASON;
    use crate::record::{MigrationId, NewMigration};
    use crate::repository::InMemoryMigrationRepository;
    use tmx_content::Interface;
    use tmx_store::{ContentStore, InMemoryContentStore};

    struct Fixture {
        store: Arc<InMemoryContentStore>,
        repository: Arc<InMemoryMigrationRepository>,
        events: Arc<EventCollector>,
        apply: ApplyOrchestrator,
        rollback: RollbackOrchestrator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryContentStore::new());
        let repository = Arc::new(InMemoryMigrationRepository::new());
        let events = Arc::new(EventCollector::new());
        let bus = EventBus::new().with_sink(events.clone());
        let service = Arc::new(MigrationService::new(
            store.clone(),
            repository.clone(),
            EngineConfig::default(),
        ));
        Fixture {
            apply: ApplyOrchestrator::new(service.clone(), repository.clone(), bus.clone()),
            rollback: RollbackOrchestrator::new(service, repository.clone(), bus),
            store,
            repository,
            events,
        }
    }

    async fn applied(f: &Fixture) -> MigrationId {
        f.store.seed(Interface::Mobile, "current.json", r#"{"v":"previous"}"#).unwrap();
        f.store.seed(Interface::Mobile, "mobile_v3.json", r#"{"v":"next"}"#).unwrap();
        let id = f
            .repository
            .insert(NewMigration::new(Interface::Mobile, "mobile_v3.json", "v3", "ignored"))
            .await
            .unwrap()
            .id;
        let result = f
            .apply
            .execute(ApplyRequest::new(id).validate_checksum(false))
            .await
            .unwrap();
        assert!(result.success);
        id
    }

    #[tokio::test]
    async fn rollback_restores_previous_content() {
        let f = fixture();
        let id = applied(&f).await;

        let result = f
            .rollback
            .execute(RollbackRequest::new(id, "wrong wording on the login screen"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(
            f.store.download(Interface::Mobile, "current.json").await.unwrap(),
            br#"{"v":"previous"}"#
        );
        let record = f.repository.get(id).unwrap();
        assert_eq!(record.status, MigrationStatus::RolledBack);
        assert!(record.rolled_back_at.is_some());
        assert_eq!(
            record.metadata.get_str(ROLLBACK_REASON),
            Some("wrong wording on the login screen")
        );
        assert_eq!(f.events.count("rolled_back"), 1);
    }

    #[tokio::test]
    async fn second_rollback_is_refused() {
        let f = fixture();
        let id = applied(&f).await;
        let request = RollbackRequest::new(id, "regression in onboarding copy");

        assert!(f.rollback.execute(request.clone()).await.unwrap().success);
        let again = f.rollback.execute(request).await.unwrap();

        assert_eq!(again.failure, Some(FailureKind::AlreadyRolledBack));
        assert!(again.error_message().contains("already been rolled back"));
        assert_eq!(f.events.count("rolled_back"), 1);
    }

    #[tokio::test]
    async fn unreadable_backup_keeps_record_completed() {
        let f = fixture();
        let id = f
            .repository
            .insert(NewMigration::new(Interface::Mobile, "mobile_v4.json", "v4", "abc"))
            .await
            .unwrap()
            .id;
        {
            let mut uow = UnitOfWork::begin(&*f.repository, id).await.unwrap();
            uow.record_mut().mark_completed(1, Utc::now()).unwrap();
            uow.record_mut()
                .record_backup("backups/mobile/mobile_before-apply-migration_2025-01-01_000000.json")
                .unwrap();
            uow.commit().await.unwrap();
        }

        let result = f
            .rollback
            .execute(RollbackRequest::new(id, "snapshot was purged"))
            .await
            .unwrap();

        assert_eq!(result.failure, Some(FailureKind::RollbackFailed));
        assert_eq!(f.repository.get(id).unwrap().status, MigrationStatus::Completed);
        assert!(f.events.events().is_empty());
    }
}
