//! Repository implementations for data persistence.
//!
//! Adapter families/versions, golden datasets, and evaluation results, using
//! SQLite as the backing store.

use crate::evaluation::{EvaluationResult, GoldenDataset};
use crate::registry::{AdapterFamily, AdapterVersion, ApprovalStatus};
use crate::storage::database::Database;
use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension, Row, params};
use semver::Version;
use std::path::PathBuf;
use tracing::{debug, info};

// ============================================================================
// Row Parsing Helpers
// ============================================================================

/// Parses a JSON field from a row into a deserializable type.
fn parse_json_field<T>(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let json_str: String = row.get(idx)?;
    serde_json::from_str(&json_str).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            column_name.to_string(),
            rusqlite::types::Type::Text,
        )
    })
}

/// Parses an RFC3339 timestamp string from a row into a `DateTime<Utc>`.
fn parse_timestamp(row: &Row, idx: usize, column_name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let timestamp_str: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&timestamp_str).map(|dt| dt.with_timezone(&Utc)).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            column_name.to_string(),
            rusqlite::types::Type::Text,
        )
    })
}

fn parse_status(row: &Row, idx: usize) -> rusqlite::Result<ApprovalStatus> {
    let status: String = row.get(idx)?;
    status.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, "status".to_string(), rusqlite::types::Type::Text)
    })
}

fn to_u64(value: i64, idx: usize, column_name: &str) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|_| {
        rusqlite::Error::InvalidColumnType(
            idx,
            column_name.to_string(),
            rusqlite::types::Type::Integer,
        )
    })
}

fn to_i64(value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::InvalidData(format!("{value} overflows i64")))
}

/// Maps unique-constraint violations to `Conflict`.
fn map_insert_error(err: rusqlite::Error, what: &str) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StorageError::Conflict(format!("{what}: {err}"))
        }
        _ => StorageError::Connection(err),
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Repository trait for adapter families and versions.
pub trait AdapterRepository {
    /// Creates a new family.
    fn create_family(&mut self, family: &AdapterFamily) -> StorageResult<()>;

    /// Retrieves a family by name, if it exists.
    fn find_family(&self, name: &str) -> StorageResult<Option<AdapterFamily>>;

    /// Retrieves all families ordered by name.
    fn get_families(&self) -> StorageResult<Vec<AdapterFamily>>;

    /// Inserts a new version.
    fn create_version(&mut self, version: &AdapterVersion) -> StorageResult<()>;

    /// Retrieves a version by ID.
    fn get_version(&self, id: &str) -> StorageResult<AdapterVersion>;

    /// Retrieves all versions of a family, ascending by semantic version.
    fn get_versions(&self, family: &str) -> StorageResult<Vec<AdapterVersion>>;

    /// Highest version number issued for a family.
    fn latest_version(&self, family: &str) -> StorageResult<Option<Version>>;

    /// Persists a version's status and audit trail. Nothing else is mutable.
    fn update_status(&mut self, version: &AdapterVersion) -> StorageResult<()>;
}

/// Repository trait for golden datasets.
pub trait GoldenDatasetRepository {
    /// Creates a new dataset.
    fn create(&mut self, dataset: &GoldenDataset) -> StorageResult<()>;

    /// Retrieves a dataset by ID.
    fn get_by_id(&self, id: &str) -> StorageResult<GoldenDataset>;

    /// Retrieves all datasets.
    fn get_all(&self) -> StorageResult<Vec<GoldenDataset>>;

    /// Highest version stored under `name`.
    fn latest_version(&self, name: &str) -> StorageResult<Option<u32>>;
}

/// Repository trait for evaluation results.
pub trait EvaluationRepository {
    /// Stores a result.
    fn create(&mut self, result: &EvaluationResult) -> StorageResult<()>;

    /// Retrieves a result by ID.
    fn get_by_id(&self, id: &str) -> StorageResult<EvaluationResult>;

    /// Retrieves all results for an adapter version, newest first.
    fn get_by_version(&self, adapter_version_id: &str) -> StorageResult<Vec<EvaluationResult>>;
}

// ============================================================================
// SQLite Adapter Repository
// ============================================================================

const VERSION_COLUMNS: &str = "id, family, major, minor, patch, artifact_path, base_model, method, hyperparams_json, checksum, status, audit_json, job_id, created_at";

fn version_from_row(row: &Row) -> rusqlite::Result<AdapterVersion> {
    let major = to_u64(row.get(2)?, 2, "major")?;
    let minor = to_u64(row.get(3)?, 3, "minor")?;
    let patch = to_u64(row.get(4)?, 4, "patch")?;
    let artifact_path: String = row.get(5)?;
    Ok(AdapterVersion {
        id: row.get(0)?,
        family: row.get(1)?,
        version: Version::new(major, minor, patch),
        artifact_path: PathBuf::from(artifact_path),
        base_model: row.get(6)?,
        method: row.get(7)?,
        hyperparams: parse_json_field(row, 8, "hyperparams_json")?,
        checksum: row.get(9)?,
        status: parse_status(row, 10)?,
        audit: parse_json_field(row, 11, "audit_json")?,
        job_id: row.get(12)?,
        created_at: parse_timestamp(row, 13, "created_at")?,
    })
}

/// SQLite implementation of AdapterRepository.
pub struct SqliteAdapterRepository<'a> {
    db: &'a mut Database,
}

impl<'a> SqliteAdapterRepository<'a> {
    /// Creates a new SQLite adapter repository.
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }
}

impl AdapterRepository for SqliteAdapterRepository<'_> {
    fn create_family(&mut self, family: &AdapterFamily) -> StorageResult<()> {
        self.db
            .conn_mut()
            .execute(
                "INSERT INTO adapter_families (name, domain, base_model, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![family.name, family.domain, family.base_model, family.created_at.to_rfc3339()],
            )
            .map_err(|e| map_insert_error(e, &format!("family {}", family.name)))?;
        info!(family = %family.name, domain = %family.domain, "Created adapter family");
        Ok(())
    }

    fn find_family(&self, name: &str) -> StorageResult<Option<AdapterFamily>> {
        let family = self
            .db
            .conn()
            .query_row(
                "SELECT name, domain, base_model, created_at FROM adapter_families WHERE name = ?1",
                params![name],
                |row| {
                    Ok(AdapterFamily {
                        name: row.get(0)?,
                        domain: row.get(1)?,
                        base_model: row.get(2)?,
                        created_at: parse_timestamp(row, 3, "created_at")?,
                    })
                },
            )
            .optional()?;
        Ok(family)
    }

    fn get_families(&self) -> StorageResult<Vec<AdapterFamily>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT name, domain, base_model, created_at FROM adapter_families ORDER BY name",
        )?;
        let families = stmt
            .query_map([], |row| {
                Ok(AdapterFamily {
                    name: row.get(0)?,
                    domain: row.get(1)?,
                    base_model: row.get(2)?,
                    created_at: parse_timestamp(row, 3, "created_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(families)
    }

    fn create_version(&mut self, version: &AdapterVersion) -> StorageResult<()> {
        let hyperparams_json = serde_json::to_string(&version.hyperparams)?;
        let audit_json = serde_json::to_string(&version.audit)?;
        self.db
            .conn_mut()
            .execute(
                &format!(
                    "INSERT INTO adapter_versions ({VERSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                params![
                    version.id,
                    version.family,
                    to_i64(version.version.major)?,
                    to_i64(version.version.minor)?,
                    to_i64(version.version.patch)?,
                    version.artifact_path.to_string_lossy(),
                    version.base_model,
                    version.method,
                    hyperparams_json,
                    version.checksum,
                    version.status.as_str(),
                    audit_json,
                    version.job_id,
                    version.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| map_insert_error(e, &format!("version {}", version.label())))?;
        debug!(version_id = %version.id, version = %version.label(), "Inserted adapter version");
        Ok(())
    }

    fn get_version(&self, id: &str) -> StorageResult<AdapterVersion> {
        self.db
            .conn()
            .query_row(
                &format!("SELECT {VERSION_COLUMNS} FROM adapter_versions WHERE id = ?1"),
                params![id],
                version_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("adapter version {id}")))
    }

    fn get_versions(&self, family: &str) -> StorageResult<Vec<AdapterVersion>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM adapter_versions WHERE family = ?1 ORDER BY major, minor, patch"
        ))?;
        let versions = stmt
            .query_map(params![family], version_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn latest_version(&self, family: &str) -> StorageResult<Option<Version>> {
        let row = self
            .db
            .conn()
            .query_row(
                "SELECT major, minor, patch FROM adapter_versions WHERE family = ?1 ORDER BY major DESC, minor DESC, patch DESC LIMIT 1",
                params![family],
                |row| {
                    Ok(Version::new(
                        to_u64(row.get(0)?, 0, "major")?,
                        to_u64(row.get(1)?, 1, "minor")?,
                        to_u64(row.get(2)?, 2, "patch")?,
                    ))
                },
            )
            .optional()?;
        Ok(row)
    }

    fn update_status(&mut self, version: &AdapterVersion) -> StorageResult<()> {
        let audit_json = serde_json::to_string(&version.audit)?;
        let rows_affected = self.db.conn_mut().execute(
            "UPDATE adapter_versions SET status = ?2, audit_json = ?3 WHERE id = ?1",
            params![version.id, version.status.as_str(), audit_json],
        )?;
        if rows_affected == 0 {
            return Err(StorageError::NotFound(format!("adapter version {}", version.id)));
        }
        debug!(version_id = %version.id, status = %version.status, "Updated adapter version status");
        Ok(())
    }
}

// ============================================================================
// SQLite Golden Dataset Repository
// ============================================================================

fn dataset_from_row(row: &Row) -> rusqlite::Result<GoldenDataset> {
    let version: i64 = row.get(2)?;
    Ok(GoldenDataset {
        id: row.get(0)?,
        name: row.get(1)?,
        version: u32::try_from(version).map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "version".to_string(), rusqlite::types::Type::Integer)
        })?,
        samples: parse_json_field(row, 3, "samples_json")?,
        created_at: parse_timestamp(row, 4, "created_at")?,
    })
}

/// SQLite implementation of GoldenDatasetRepository.
pub struct SqliteGoldenDatasetRepository<'a> {
    db: &'a mut Database,
}

impl<'a> SqliteGoldenDatasetRepository<'a> {
    /// Creates a new SQLite golden dataset repository.
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }
}

impl GoldenDatasetRepository for SqliteGoldenDatasetRepository<'_> {
    fn create(&mut self, dataset: &GoldenDataset) -> StorageResult<()> {
        let samples_json = serde_json::to_string(&dataset.samples)?;
        self.db
            .conn_mut()
            .execute(
                "INSERT INTO golden_datasets (id, name, version, samples_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![dataset.id, dataset.name, dataset.version, samples_json, dataset.created_at.to_rfc3339()],
            )
            .map_err(|e| map_insert_error(e, &format!("golden dataset {} v{}", dataset.name, dataset.version)))?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> StorageResult<GoldenDataset> {
        self.db
            .conn()
            .query_row(
                "SELECT id, name, version, samples_json, created_at FROM golden_datasets WHERE id = ?1",
                params![id],
                dataset_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("golden dataset {id}")))
    }

    fn get_all(&self) -> StorageResult<Vec<GoldenDataset>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT id, name, version, samples_json, created_at FROM golden_datasets ORDER BY name, version",
        )?;
        let datasets = stmt
            .query_map([], dataset_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(datasets)
    }

    fn latest_version(&self, name: &str) -> StorageResult<Option<u32>> {
        let version: Option<i64> = self.db.conn().query_row(
            "SELECT MAX(version) FROM golden_datasets WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        version
            .map(|v| {
                u32::try_from(v).map_err(|_| StorageError::InvalidData(format!("dataset version {v}")))
            })
            .transpose()
    }
}

// ============================================================================
// SQLite Evaluation Repository
// ============================================================================

const EVALUATION_COLUMNS: &str = "id, adapter_version_id, golden_dataset_id, aggregate_score, pass_rate, failed_samples, samples_json, created_at";

fn evaluation_from_row(row: &Row) -> rusqlite::Result<EvaluationResult> {
    let failed: i64 = row.get(5)?;
    Ok(EvaluationResult {
        id: row.get(0)?,
        adapter_version_id: row.get(1)?,
        golden_dataset_id: row.get(2)?,
        aggregate_score: row.get(3)?,
        pass_rate: row.get(4)?,
        failed_samples: usize::try_from(failed).map_err(|_| {
            rusqlite::Error::InvalidColumnType(5, "failed_samples".to_string(), rusqlite::types::Type::Integer)
        })?,
        samples: parse_json_field(row, 6, "samples_json")?,
        created_at: parse_timestamp(row, 7, "created_at")?,
    })
}

/// SQLite implementation of EvaluationRepository.
pub struct SqliteEvaluationRepository<'a> {
    db: &'a mut Database,
}

impl<'a> SqliteEvaluationRepository<'a> {
    /// Creates a new SQLite evaluation repository.
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }
}

impl EvaluationRepository for SqliteEvaluationRepository<'_> {
    fn create(&mut self, result: &EvaluationResult) -> StorageResult<()> {
        let samples_json = serde_json::to_string(&result.samples)?;
        let failed = to_i64(result.failed_samples as u64)?;
        self.db.conn_mut().execute(
            &format!("INSERT INTO evaluation_results ({EVALUATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                result.id,
                result.adapter_version_id,
                result.golden_dataset_id,
                result.aggregate_score,
                result.pass_rate,
                failed,
                samples_json,
                result.created_at.to_rfc3339(),
            ],
        )?;
        info!(
            evaluation_id = %result.id,
            version_id = %result.adapter_version_id,
            aggregate = result.aggregate_score,
            "Stored evaluation result"
        );
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> StorageResult<EvaluationResult> {
        self.db
            .conn()
            .query_row(
                &format!("SELECT {EVALUATION_COLUMNS} FROM evaluation_results WHERE id = ?1"),
                params![id],
                evaluation_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("evaluation result {id}")))
    }

    fn get_by_version(&self, adapter_version_id: &str) -> StorageResult<Vec<EvaluationResult>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT {EVALUATION_COLUMNS} FROM evaluation_results WHERE adapter_version_id = ?1 ORDER BY created_at DESC"
        ))?;
        let results = stmt
            .query_map(params![adapter_version_id], evaluation_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }
}
