//! Command handlers
//!
//! Each handler prints its outcome to stdout and returns whether the
//! requested operation went through.

use crate::config::CliConfig;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};
use tmx_content::{Interface, BACKUP_TIMESTAMP_FORMAT};
use tmx_core::{
    EventBus, JsonFileRepository, Metadata, MigrationEngine, MigrationFilter, MigrationId,
    MigrationRecord, MigrationResult, MigrationStatus, TracingSink,
};
use tmx_store::{ContentStore, FsContentStore};

/// Accepted rollback reason length, in characters
pub const REASON_LENGTH: std::ops::RangeInclusive<usize> = 10..=500;

/// Engine over the configured filesystem store and record file
#[derive(Debug)]
pub struct App {
    store: Arc<FsContentStore>,
    engine: MigrationEngine,
}

impl App {
    /// Open store and repository from `config`
    ///
    /// # Errors
    /// Returns error if the record file cannot be loaded
    pub async fn open(config: &CliConfig) -> Result<Self> {
        let store = Arc::new(FsContentStore::new(&config.store_root));
        let repository = JsonFileRepository::open(&config.records_path)
            .await
            .with_context(|| format!("opening records at {}", config.records_path.display()))?;
        let engine = MigrationEngine::new(
            store.clone(),
            Arc::new(repository),
            config.engine.clone(),
            EventBus::new().with_sink(Arc::new(TracingSink)),
        );
        Ok(Self { store, engine })
    }

    /// Apply one migration, or several as one batch
    pub async fn apply(
        &self,
        ids: &[MigrationId],
        create_backup: bool,
        validate_checksum: bool,
    ) -> Result<bool> {
        let results = match ids {
            [] => bail!("no migration id given"),
            [id] => vec![
                self.engine
                    .apply_migration(*id, create_backup, validate_checksum)
                    .await?,
            ],
            _ => {
                self.engine
                    .apply_batch(ids, create_backup, validate_checksum)
                    .await?
            }
        };
        for result in &results {
            println!("{}", render_result("apply", result));
        }
        Ok(results.iter().all(|r| r.success))
    }

    /// Roll back one migration
    pub async fn rollback(&self, id: MigrationId, reason: &str) -> Result<bool> {
        validate_reason(reason)?;
        let result = self.engine.rollback_migration(id, reason).await?;
        println!("{}", render_result("rollback", &result));
        Ok(result.success)
    }

    /// Print one record as JSON
    pub async fn show(&self, id: MigrationId) -> Result<bool> {
        let record = self.engine.migration(id).await?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        Ok(true)
    }

    /// Print matching records, one per line
    pub async fn list(
        &self,
        interface: Option<Interface>,
        status: Option<MigrationStatus>,
    ) -> Result<bool> {
        let filter = MigrationFilter {
            interface,
            status,
        };
        let records = self.engine.migrations(filter).await?;
        if records.is_empty() {
            println!("no migrations");
        }
        for record in &records {
            println!("{}", render_record_line(record));
        }
        Ok(true)
    }

    /// Track an artifact already in the store
    pub async fn track(
        &self,
        interface: Interface,
        filename: &str,
        version: Option<&str>,
    ) -> Result<bool> {
        let version = version.map_or_else(|| version_from_filename(filename), str::to_string);
        let metadata = Metadata::new()
            .with("source_path", format!("migrations/{interface}/{filename}"))
            .with("tracked_at", Utc::now().to_rfc3339());
        let record = self
            .engine
            .track(interface, filename, &version, metadata)
            .await?;
        println!("{}", render_record_line(&record));
        Ok(true)
    }

    /// Print an interface's backups
    pub async fn backups(&self, interface: Interface) -> Result<bool> {
        let backups = self.store.list_backups(interface).await?;
        if backups.is_empty() {
            println!("no backups for {interface}");
        }
        for path in backups {
            println!("{path}");
        }
        Ok(true)
    }
}

/// Reject rollback reasons outside [`REASON_LENGTH`]
///
/// # Errors
/// Returns error naming the accepted bounds
pub fn validate_reason(reason: &str) -> Result<()> {
    let length = reason.trim().chars().count();
    if !REASON_LENGTH.contains(&length) {
        bail!(
            "rollback reason must be {} to {} characters, got {length}",
            REASON_LENGTH.start(),
            REASON_LENGTH.end()
        );
    }
    Ok(())
}

/// Version embedded in a migration file name (`2025-08-27_143005`), or the
/// current time in the same layout when the name carries none
#[must_use]
pub fn version_from_filename(filename: &str) -> String {
    static STAMP: OnceLock<Option<Regex>> = OnceLock::new();
    STAMP
        .get_or_init(|| Regex::new(r"\d{4}-\d{2}-\d{2}_\d{6}").ok())
        .as_ref()
        .and_then(|re| re.find(filename))
        .map_or_else(
            || Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string(),
            |m| m.as_str().to_string(),
        )
}

/// One-line summary of an apply or rollback outcome
#[must_use]
pub fn render_result(operation: &str, result: &MigrationResult) -> String {
    let mut line = if result.success {
        format!("{operation} #{}: ok", result.migration_id)
    } else {
        format!(
            "{operation} #{}: failed: {}",
            result.migration_id,
            result.error_message()
        )
    };
    if let Some(path) = &result.backup_path {
        let _ = write!(line, " (backup: {path})");
    }
    if let Some(filename) = result.metadata.get_str("filename") {
        let _ = write!(line, " [{filename}]");
    }
    line
}

/// One-line summary of a record
#[must_use]
pub fn render_record_line(record: &MigrationRecord) -> String {
    let batch = record
        .batch_number
        .map_or_else(|| "-".to_string(), |b| b.to_string());
    format!(
        "#{:<5} {:<16} {:<12} batch {:<4} {:<24} {}",
        record.id.0,
        record.interface_origin.as_str(),
        record.status.as_str(),
        batch,
        record.version,
        record.filename
    )
}
