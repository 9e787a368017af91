//! Apply orchestrator
//!
//! Promotes a pending migration's payload to live content inside one unit
//! of work. Checksum mismatches, wrong statuses and refused writes come back
//! as failed [`MigrationResult`]s; anything else propagates and leaves the
//! persisted record as it was.

use crate::dto::{ApplyRequest, FailureKind, MigrationResult};
use crate::error::EngineError;
use crate::events::{EventBus, MigrationEvent};
use crate::metadata::Metadata;
use crate::record::{MigrationId, MigrationRecord};
use crate::repository::MigrationRepository;
use crate::service::MigrationService;
use crate::status::MigrationStatus;
use crate::transaction::UnitOfWork;
use std::sync::Arc;

/// Result metadata key naming the failed validation
pub const VALIDATION_TYPE: &str = "validation_type";
/// Result metadata key carrying the recorded checksum
pub const CHECKSUM_EXPECTED: &str = "checksum_expected";

/// Runs [`ApplyRequest`]s
#[derive(Debug, Clone)]
pub struct ApplyOrchestrator {
    service: Arc<MigrationService>,
    repository: Arc<dyn MigrationRepository>,
    events: EventBus,
}

impl ApplyOrchestrator {
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

    /// Apply one migration
    ///
    /// # Workflow
    /// 1. Lock and load the record
    /// 2. Refuse records that are not pending
    /// 3. Validate the checksum if requested
    /// 4. Snapshot live content and record its path if requested
    /// 5. Write the payload as live content
    /// 6. Commit, publish `Applied`
    ///
    /// # Errors
    /// - `EngineError::NotFound` for an unknown id
    /// - Store and repository faults; the record is then left unchanged
    pub async fn execute(&self, request: ApplyRequest) -> Result<MigrationResult, EngineError> {
        tracing::info!(
            migration_id = %request.migration_id,
            create_backup = request.create_backup,
            validate_checksum = request.validate_checksum,
            "applying migration"
        );
        self.run(request, None).await
    }

    /// Apply several migrations as one batch.
    ///
    /// Every applied record gets the same batch number, one above the
    /// latest. Each id runs in its own unit of work, in order; failed results
    /// do not stop the batch.
    ///
    /// # Errors
    /// The first propagating error stops the batch. Records applied before it
    /// stay applied.
    pub async fn execute_batch(
        &self,
        ids: &[MigrationId],
        create_backup: bool,
        validate_checksum: bool,
    ) -> Result<Vec<MigrationResult>, EngineError> {
        let batch_number = self.repository.latest_batch_number().await? + 1;
        tracing::info!(batch_number, count = ids.len(), "applying migration batch");

        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let request = ApplyRequest::new(id)
                .create_backup(create_backup)
                .validate_checksum(validate_checksum);
            results.push(self.run(request, Some(batch_number)).await?);
        }

        let applied = results.iter().filter(|r| r.success).count();
        tracing::info!(batch_number, applied, failed = results.len() - applied, "batch finished");
        Ok(results)
    }

    async fn run(
        &self,
        request: ApplyRequest,
        batch_number: Option<u64>,
    ) -> Result<MigrationResult, EngineError> {
        match self.apply_once(request, batch_number).await {
            Ok(result) => Ok(result),
            Err(error) => {
                tracing::error!(
                    migration_id = %request.migration_id,
                    error = %error,
                    "apply aborted"
                );
                Err(error)
            }
        }
    }

    async fn apply_once(
        &self,
        request: ApplyRequest,
        batch_number: Option<u64>,
    ) -> Result<MigrationResult, EngineError> {
        let id = request.migration_id;

        // 1. Lock and load
        let mut uow = UnitOfWork::begin(self.repository.as_ref(), id).await?;

        // 2. Status precondition
        if let Some(failure) = precondition_failure(uow.record().status) {
            tracing::warn!(
                migration_id = %id,
                status = %uow.record().status,
                "migration is not pending"
            );
            return Ok(MigrationResult::failure(id, failure)
                .with_metadata(display_metadata(uow.record())));
        }

        // 3. Checksum gate
        if request.validate_checksum && !self.service.validate_checksum(uow.record()).await? {
            let record = uow.record().clone();
            drop(uow);
            tracing::warn!(
                migration_id = %id,
                expected = %record.checksum,
                "checksum mismatch"
            );
            let metadata = display_metadata(&record)
                .with(VALIDATION_TYPE, "checksum")
                .with(CHECKSUM_EXPECTED, record.checksum.clone());
            return Ok(self.fail(record, FailureKind::ChecksumMismatch, metadata));
        }

        // 4. Snapshot; backup_path is write-once, so refuse before any store write
        let backup_path = if request.create_backup {
            uow.record().ensure_backup_unset()?;
            let path = self
                .service
                .snapshot_current(uow.record().interface_origin)
                .await?;
            uow.record_mut().record_backup(&path)?;
            tracing::debug!(migration_id = %id, backup_path = %path, "live content snapshotted");
            Some(path)
        } else {
            None
        };

        // 5. Live write
        let applied = match batch_number {
            Some(batch) => self.service.apply_in_batch(uow.record_mut(), batch).await?,
            None => self.service.apply(uow.record_mut()).await?,
        };
        if !applied {
            let record = uow.record().clone();
            drop(uow);
            let metadata = display_metadata(&record);
            let mut result = self.fail(record, FailureKind::ApplyFailed, metadata);
            result.backup_path = backup_path;
            return Ok(result);
        }

        // 6. Commit
        let record = uow.commit().await?;

        self.events.publish(&MigrationEvent::Applied {
            record: record.clone(),
            backup_path: backup_path.clone(),
        });
        tracing::info!(
            migration_id = %id,
            batch_number = record.batch_number,
            backup_path = backup_path.as_deref().unwrap_or("-"),
            "migration applied"
        );
        Ok(MigrationResult::success(id, backup_path).with_metadata(display_metadata(&record)))
    }

    fn fail(&self, record: MigrationRecord, failure: FailureKind, metadata: Metadata) -> MigrationResult {
        let result = MigrationResult::failure(record.id, failure).with_metadata(metadata);
        self.events.publish(&MigrationEvent::Failed {
            record,
            error: failure.message().to_string(),
        });
        result
    }
}

fn precondition_failure(status: MigrationStatus) -> Option<FailureKind> {
    match status {
        MigrationStatus::Pending => None,
        MigrationStatus::Completed => Some(FailureKind::AlreadyApplied),
        MigrationStatus::RolledBack => Some(FailureKind::AlreadyRolledBack),
        MigrationStatus::Failed => Some(FailureKind::NotPending),
    }
}

/// Facts about a record shown alongside a result
pub(crate) fn display_metadata(record: &MigrationRecord) -> Metadata {
    Metadata::new()
        .with("filename", record.filename.clone())
        .with("interface", record.interface_origin.as_str())
        .with("version", record.version.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::EventCollector;
    use crate::metadata::BACKUP_PATH;
    use crate::record::NewMigration;
    use crate::repository::InMemoryMigrationRepository;
    use tmx_content::{ContentHash, Interface};
    use tmx_store::{ContentStore, InMemoryContentStore};

    const PAYLOAD: &str = r#"{"login.button":{"fr":"Connexion","en":"Log in"}}"#;

    struct Fixture {
        store: Arc<InMemoryContentStore>,
        repository: Arc<InMemoryMigrationRepository>,
        events: Arc<EventCollector>,
        orchestrator: ApplyOrchestrator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryContentStore::new());
        let repository = Arc::new(InMemoryMigrationRepository::new());
        let events = Arc::new(EventCollector::new());
        let service = Arc::new(MigrationService::new(
            store.clone(),
            repository.clone(),
            EngineConfig::default(),
        ));
        let orchestrator = ApplyOrchestrator::new(
            service,
            repository.clone(),
            EventBus::new().with_sink(events.clone()),
        );
        Fixture {
            store,
            repository,
            events,
            orchestrator,
        }
    }

    async fn track(f: &Fixture, name: &str, checksum: Option<&str>) -> MigrationId {
        f.store.seed(Interface::WebFinancer, name, PAYLOAD).unwrap();
        let checksum = checksum.map_or_else(
            || ContentHash::compute(PAYLOAD.as_bytes()).to_string(),
            str::to_string,
        );
        f.repository
            .insert(NewMigration::new(Interface::WebFinancer, name, "v2.0.0", checksum))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn apply_with_backup_records_path_and_publishes() {
        let f = fixture();
        f.store.seed(Interface::WebFinancer, "current.json", "{}").unwrap();
        let id = track(&f, "web_financer_v2.0.0.json", None).await;

        let result = f.orchestrator.execute(ApplyRequest::new(id)).await.unwrap();

        assert!(result.success);
        let backup_path = result.backup_path.clone().unwrap();
        assert!(backup_path.starts_with("backups/web_financer/web_financer_before-apply-migration_"));

        let record = f.repository.get(id).unwrap();
        assert_eq!(record.status, MigrationStatus::Completed);
        assert_eq!(record.metadata.get_str(BACKUP_PATH), Some(backup_path.as_str()));
        assert_eq!(f.events.count("applied"), 1);
        assert_eq!(result.metadata.get_str("interface"), Some("web_financer"));
    }

    #[tokio::test]
    async fn checksum_mismatch_reports_expected_value() {
        let f = fixture();
        let id = track(&f, "web_financer_v2.0.0.json", Some("abc")).await;

        let result = f.orchestrator.execute(ApplyRequest::new(id)).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.error_message(), "Checksum validation failed");
        assert_eq!(result.metadata.get_str(VALIDATION_TYPE), Some("checksum"));
        assert_eq!(result.metadata.get_str(CHECKSUM_EXPECTED), Some("abc"));
        assert!(f.repository.get(id).unwrap().is_pending());
        assert_eq!(f.events.count("failed"), 1);
        assert!(f.store.list_backups(Interface::WebFinancer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_apply_is_a_precondition_failure() {
        let f = fixture();
        let id = track(&f, "web_financer_v2.0.0.json", None).await;

        assert!(f.orchestrator.execute(ApplyRequest::new(id)).await.unwrap().success);
        let again = f.orchestrator.execute(ApplyRequest::new(id)).await.unwrap();

        assert_eq!(again.failure, Some(FailureKind::AlreadyApplied));
        assert_eq!(f.events.count("applied"), 1);
        assert_eq!(f.events.count("failed"), 0);
    }

    #[tokio::test]
    async fn apply_without_backup_leaves_no_snapshot() {
        let f = fixture();
        let id = track(&f, "web_financer_v2.0.0.json", None).await;

        let result = f
            .orchestrator
            .execute(ApplyRequest::new(id).create_backup(false).validate_checksum(false))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.backup_path.is_none());
        assert!(f.repository.get(id).unwrap().backup_path().is_none());
    }

    #[tokio::test]
    async fn batch_shares_one_batch_number() {
        let f = fixture();
        let first = track(&f, "web_financer_v2.0.0.json", None).await;
        let second = track(&f, "web_financer_v2.1.0.json", None).await;
        let bad = track(&f, "web_financer_v2.2.0.json", Some("abc")).await;

        let results = f
            .orchestrator
            .execute_batch(&[first, second, bad], true, true)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].success && results[1].success && !results[2].success);
        assert_eq!(f.repository.get(first).unwrap().batch_number, Some(1));
        assert_eq!(f.repository.get(second).unwrap().batch_number, Some(1));
        assert_eq!(f.repository.get(bad).unwrap().batch_number, None);
    }

    #[tokio::test]
    async fn preset_backup_path_is_refused_before_any_write() {
        let f = fixture();
        f.store.seed(Interface::WebFinancer, "current.json", "{}").unwrap();
        f.store
            .seed(Interface::WebFinancer, "web_financer_v2.0.0.json", PAYLOAD)
            .unwrap();
        let id = f
            .repository
            .insert(
                NewMigration::new(
                    Interface::WebFinancer,
                    "web_financer_v2.0.0.json",
                    "v2.0.0",
                    ContentHash::compute(PAYLOAD.as_bytes()).to_string(),
                )
                .with_metadata(Metadata::new().with(BACKUP_PATH, "backups/web_financer/imported.json")),
            )
            .await
            .unwrap()
            .id;

        let err = f.orchestrator.execute(ApplyRequest::new(id)).await.unwrap_err();

        assert!(matches!(err, EngineError::Record(_)));
        assert!(f.repository.get(id).unwrap().is_pending());
        assert_eq!(
            f.store.download(Interface::WebFinancer, "current.json").await.unwrap(),
            b"{}"
        );
        assert!(f.store.list_backups(Interface::WebFinancer).await.unwrap().is_empty());
        assert!(f.events.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_id_propagates_without_event() {
        let f = fixture();
        let err = f
            .orchestrator
            .execute(ApplyRequest::new(MigrationId(404)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(f.events.events().is_empty());
    }
}
