//! Adapter registry.
//!
//! Families of versioned adapter artifacts with checksums, an approval state
//! machine, and an audit trail. Every mutation goes through the shared
//! database lock, which is what serializes version assignment per family.

mod diff;
mod version;

pub use diff::{FieldChange, VersionDiff};
pub use version::{
    AdapterFamily, AdapterVersion, Approval, ApprovalStatus, AuditAction, AuditEntry, BumpKind,
    Hyperparams,
};

use crate::error::{ForgeError, Result};
use crate::storage::{
    AdapterRepository, EvaluationRepository, SharedDatabase, SqliteAdapterRepository,
    SqliteEvaluationRepository, StorageError,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};
use tuneforge_training::artifact_checksum;

/// Registration payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub family: String,
    /// Domain recorded on the family when it is first created.
    pub domain: String,
    pub method: String,
    pub artifact_path: PathBuf,
    pub base_model: String,
    #[serde(default)]
    pub hyperparams: Hyperparams,
    #[serde(default)]
    pub bump: BumpKind,
    #[serde(default)]
    pub job_id: Option<String>,
}

impl RegisterRequest {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("family", &self.family),
            ("domain", &self.domain),
            ("method", &self.method),
            ("base_model", &self.base_model),
        ] {
            if value.trim().is_empty() {
                return Err(ForgeError::ValidationFailure(format!("{field} is required")));
            }
        }
        if !self.artifact_path.exists() {
            return Err(ForgeError::ValidationFailure(format!(
                "artifact not found: {}",
                self.artifact_path.display()
            )));
        }
        Ok(())
    }
}

/// Registry of adapter families and versions.
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    db: SharedDatabase,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Registers an artifact as the next version of its family, `pending`.
    ///
    /// The checksum is computed before the lock is taken; version assignment
    /// and insertion happen under it.
    pub fn register(&self, request: RegisterRequest) -> Result<AdapterVersion> {
        request.validate()?;
        let checksum = artifact_checksum(&request.artifact_path)?;
        let now = Utc::now();

        let mut db = self.db.lock();
        let mut repo = SqliteAdapterRepository::new(&mut db);

        match repo.find_family(&request.family)? {
            Some(family) if family.base_model != request.base_model => {
                return Err(ForgeError::ValidationFailure(format!(
                    "family {} is built on {}, not {}",
                    family.name, family.base_model, request.base_model
                )));
            }
            Some(family) if family.domain != request.domain => {
                return Err(ForgeError::ValidationFailure(format!(
                    "family {} belongs to domain {}, not {}",
                    family.name, family.domain, request.domain
                )));
            }
            Some(_) => {}
            None => {
                repo.create_family(&AdapterFamily {
                    name: request.family.clone(),
                    domain: request.domain.clone(),
                    base_model: request.base_model.clone(),
                    created_at: now,
                })?;
            }
        }

        let latest = repo.latest_version(&request.family)?;
        let version = AdapterVersion {
            id: uuid::Uuid::new_v4().to_string(),
            family: request.family,
            version: request.bump.next(latest.as_ref()),
            artifact_path: request.artifact_path,
            base_model: request.base_model,
            method: request.method,
            hyperparams: request.hyperparams,
            checksum,
            status: ApprovalStatus::Pending,
            audit: vec![AuditEntry {
                at: now,
                actor: "registry".to_string(),
                action: AuditAction::Registered,
                detail: format!("bump={:?}", request.bump).to_lowercase(),
            }],
            job_id: request.job_id,
            created_at: now,
        };

        repo.create_version(&version).map_err(|e| match e {
            StorageError::Conflict(msg) => ForgeError::InvalidState(msg),
            other => other.into(),
        })?;

        info!(
            version_id = %version.id,
            version = %version.label(),
            checksum = %version.checksum,
            "Registered adapter version"
        );
        Ok(version)
    }

    /// Approves a pending version.
    ///
    /// The artifact checksum is revalidated first, outside the lock. An
    /// evaluation-backed approval requires that evaluation to belong to this
    /// version and to meet the threshold.
    pub fn approve(&self, version_id: &str, approval: Approval) -> Result<AdapterVersion> {
        if approval.actor().trim().is_empty() {
            return Err(ForgeError::ValidationFailure("actor is required".to_string()));
        }

        let version = self.get(version_id)?;
        Self::ensure_approvable(&version)?;
        Self::verify_artifact(&version)?;

        let mut db = self.db.lock();
        // Status may have moved while the artifact was hashed.
        let mut version = Self::load(&mut SqliteAdapterRepository::new(&mut db), version_id)?;
        Self::ensure_approvable(&version)?;

        let detail = match &approval {
            Approval::Evaluation { evaluation_id, threshold, .. } => {
                let evaluation = SqliteEvaluationRepository::new(&mut db)
                    .get_by_id(evaluation_id)
                    .map_err(ForgeError::from_lookup)?;
                if evaluation.adapter_version_id != version.id {
                    return Err(ForgeError::ValidationFailure(format!(
                        "evaluation {} belongs to version {}, not {}",
                        evaluation.id, evaluation.adapter_version_id, version.id
                    )));
                }
                if !evaluation.meets(*threshold) {
                    return Err(ForgeError::InvalidState(format!(
                        "evaluation {} scored {:.2}, below threshold {:.2}",
                        evaluation.id, evaluation.aggregate_score, threshold
                    )));
                }
                format!(
                    "evaluation {} scored {:.2} >= {:.2}",
                    evaluation.id, evaluation.aggregate_score, threshold
                )
            }
            Approval::HumanOverride { note, .. } => format!("human override: {note}"),
        };

        version.status = ApprovalStatus::Approved;
        version.audit.push(AuditEntry {
            at: Utc::now(),
            actor: approval.actor().to_string(),
            action: AuditAction::Approved,
            detail,
        });
        SqliteAdapterRepository::new(&mut db).update_status(&version)?;

        info!(version_id = %version.id, version = %version.label(), actor = %approval.actor(), "Approved adapter version");
        Ok(version)
    }

    /// Rejects a pending version with a reason.
    pub fn reject(&self, version_id: &str, actor: &str, reason: &str) -> Result<AdapterVersion> {
        if actor.trim().is_empty() {
            return Err(ForgeError::ValidationFailure("actor is required".to_string()));
        }

        let mut db = self.db.lock();
        let mut repo = SqliteAdapterRepository::new(&mut db);
        let mut version = Self::load(&mut repo, version_id)?;

        match version.status {
            ApprovalStatus::Rejected => {
                return Err(ForgeError::AlreadyRejected(version.label()));
            }
            ApprovalStatus::Approved => {
                return Err(ForgeError::InvalidState(format!(
                    "{} was approved and cannot be rejected",
                    version.label()
                )));
            }
            ApprovalStatus::Pending => {}
        }

        version.status = ApprovalStatus::Rejected;
        version.audit.push(AuditEntry {
            at: Utc::now(),
            actor: actor.to_string(),
            action: AuditAction::Rejected,
            detail: reason.to_string(),
        });
        repo.update_status(&version)?;

        info!(version_id = %version.id, version = %version.label(), actor, reason, "Rejected adapter version");
        Ok(version)
    }

    /// Compares hyperparameters and metadata of two versions.
    pub fn diff(&self, version_a: &str, version_b: &str) -> Result<VersionDiff> {
        let mut db = self.db.lock();
        let mut repo = SqliteAdapterRepository::new(&mut db);
        let a = Self::load(&mut repo, version_a)?;
        let b = Self::load(&mut repo, version_b)?;
        Ok(diff::diff_versions(&a, &b))
    }

    /// Recomputes the artifact checksum and compares it with the stored one.
    /// A missing artifact counts as a mismatch.
    pub fn validate_checksum(&self, version_id: &str) -> Result<bool> {
        let version = self.get(version_id)?;
        Ok(Self::verify_artifact(&version).is_ok())
    }

    /// Highest approved version of a family, if any.
    pub fn current(&self, family: &str) -> Result<Option<AdapterVersion>> {
        Ok(self
            .list_versions(family)?
            .into_iter()
            .filter(|v| v.status == ApprovalStatus::Approved)
            .max_by(|a, b| a.version.cmp(&b.version)))
    }

    pub fn get(&self, version_id: &str) -> Result<AdapterVersion> {
        let mut db = self.db.lock();
        Self::load(&mut SqliteAdapterRepository::new(&mut db), version_id)
    }

    /// Versions of a family in ascending version order.
    pub fn list_versions(&self, family: &str) -> Result<Vec<AdapterVersion>> {
        let mut db = self.db.lock();
        let repo = SqliteAdapterRepository::new(&mut db);
        if repo.find_family(family)?.is_none() {
            return Err(ForgeError::NotFound(format!("adapter family {family}")));
        }
        let mut versions = repo.get_versions(family)?;
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(versions)
    }

    pub fn list_families(&self) -> Result<Vec<AdapterFamily>> {
        let mut db = self.db.lock();
        Ok(SqliteAdapterRepository::new(&mut db).get_families()?)
    }

    fn load(repo: &mut SqliteAdapterRepository<'_>, version_id: &str) -> Result<AdapterVersion> {
        repo.get_version(version_id).map_err(ForgeError::from_lookup)
    }

    fn ensure_approvable(version: &AdapterVersion) -> Result<()> {
        match version.status {
            ApprovalStatus::Pending => Ok(()),
            ApprovalStatus::Approved => Err(ForgeError::AlreadyApproved(version.label())),
            ApprovalStatus::Rejected => Err(ForgeError::InvalidState(format!(
                "{} was rejected and cannot be approved",
                version.label()
            ))),
        }
    }

    fn verify_artifact(version: &AdapterVersion) -> Result<()> {
        let actual = match artifact_checksum(&version.artifact_path) {
            Ok(sum) => sum,
            Err(e) => {
                warn!(version_id = %version.id, error = %e, "Artifact unreadable during checksum validation");
                format!("unreadable: {e}")
            }
        };
        if actual == version.checksum {
            Ok(())
        } else {
            warn!(version_id = %version.id, expected = %version.checksum, actual = %actual, "Checksum mismatch");
            Err(ForgeError::ChecksumMismatch {
                version_id: version.id.clone(),
                expected: version.checksum.clone(),
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::EvaluationResult;
    use crate::storage::Database;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        dir: PathBuf,
        db: SharedDatabase,
        registry: AdapterRegistry,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_path_buf();
        let db = Database::open_in_memory().unwrap().into_shared();
        let registry = AdapterRegistry::new(db.clone());
        Fixture { _temp: temp, dir, db, registry }
    }

    fn artifact(fx: &Fixture, name: &str, content: &str) -> PathBuf {
        let path = fx.dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn request(fx: &Fixture, name: &str, bump: BumpKind) -> RegisterRequest {
        RegisterRequest {
            family: "legal-qa".to_string(),
            domain: "legal".to_string(),
            method: "lora".to_string(),
            artifact_path: artifact(fx, name, name),
            base_model: "llama-3-8b".to_string(),
            hyperparams: Hyperparams { rank: Some(8), ..Default::default() },
            bump,
            job_id: None,
        }
    }

    fn store_evaluation(fx: &Fixture, version_id: &str, score: f64) -> String {
        let result = EvaluationResult {
            id: uuid::Uuid::new_v4().to_string(),
            adapter_version_id: version_id.to_string(),
            golden_dataset_id: "gd".to_string(),
            samples: Vec::new(),
            aggregate_score: score,
            pass_rate: 1.0,
            failed_samples: 0,
            created_at: Utc::now(),
        };
        // Evaluation rows reference a golden dataset.
        let mut db = fx.db.lock();
        db.conn_mut()
            .execute(
                "INSERT OR IGNORE INTO golden_datasets (id, name, version, samples_json, created_at) VALUES ('gd', 'gd', 1, '[]', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        SqliteEvaluationRepository::new(&mut db).create(&result).unwrap();
        result.id
    }

    #[test]
    fn test_version_sequence() {
        let fx = fixture();
        let v1 = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        let v2 = fx.registry.register(request(&fx, "a2", BumpKind::Patch)).unwrap();
        let v3 = fx.registry.register(request(&fx, "a3", BumpKind::Minor)).unwrap();
        let v4 = fx.registry.register(request(&fx, "a4", BumpKind::Major)).unwrap();

        assert_eq!(v1.version.to_string(), "1.0.0");
        assert_eq!(v2.version.to_string(), "1.0.1");
        assert_eq!(v3.version.to_string(), "1.1.0");
        assert_eq!(v4.version.to_string(), "2.0.0");
        assert_eq!(v1.status, ApprovalStatus::Pending);
        assert_eq!(v1.audit[0].action, AuditAction::Registered);
        assert_eq!(fx.registry.list_versions("legal-qa").unwrap().len(), 4);
    }

    #[test]
    fn test_register_rejects_missing_artifact() {
        let fx = fixture();
        let mut req = request(&fx, "a1", BumpKind::Patch);
        req.artifact_path = fx.dir.join("missing");
        assert!(matches!(fx.registry.register(req), Err(ForgeError::ValidationFailure(_))));
        assert!(fx.registry.list_families().unwrap().is_empty());
    }

    #[test]
    fn test_register_rejects_base_model_change() {
        let fx = fixture();
        fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        let mut req = request(&fx, "a2", BumpKind::Patch);
        req.base_model = "mistral-7b".to_string();
        assert!(matches!(fx.registry.register(req), Err(ForgeError::ValidationFailure(_))));
    }

    #[test]
    fn test_register_rejects_domain_change() {
        let fx = fixture();
        fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        let mut req = request(&fx, "a2", BumpKind::Patch);
        req.domain = "medical".to_string();

        assert!(matches!(fx.registry.register(req), Err(ForgeError::ValidationFailure(_))));
        assert_eq!(fx.registry.list_versions("legal-qa").unwrap().len(), 1);
        assert_eq!(fx.registry.list_families().unwrap()[0].domain, "legal");
    }

    #[test]
    fn test_approve_requires_actor() {
        let fx = fixture();
        let v = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        let eval_id = store_evaluation(&fx, &v.id, 95.0);

        let human = Approval::HumanOverride { actor: " ".to_string(), note: "looks fine".to_string() };
        assert!(matches!(fx.registry.approve(&v.id, human), Err(ForgeError::ValidationFailure(_))));

        let evaluated = Approval::Evaluation { actor: String::new(), evaluation_id: eval_id, threshold: 80.0 };
        assert!(matches!(fx.registry.approve(&v.id, evaluated), Err(ForgeError::ValidationFailure(_))));

        let stored = fx.registry.get(&v.id).unwrap();
        assert_eq!(stored.status, ApprovalStatus::Pending);
        assert_eq!(stored.audit.len(), 1);
    }

    #[test]
    fn test_concurrent_approvals_record_one_decision() {
        let fx = fixture();
        let v = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = fx.registry.clone();
                let id = v.id.clone();
                std::thread::spawn(move || {
                    registry.approve(&id, Approval::HumanOverride { actor: format!("reviewer-{i}"), note: "ok".to_string() })
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(e, ForgeError::AlreadyApproved(_))));
        assert_eq!(fx.registry.get(&v.id).unwrap().audit.len(), 2);
    }

    #[test]
    fn test_approve_twice_is_already_approved() {
        let fx = fixture();
        let v = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        let approval = Approval::HumanOverride { actor: "dana".to_string(), note: "spot checked".to_string() };

        let approved = fx.registry.approve(&v.id, approval.clone()).unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);

        let err = fx.registry.approve(&v.id, approval).unwrap_err();
        assert!(matches!(err, ForgeError::AlreadyApproved(_)));
        let stored = fx.registry.get(&v.id).unwrap();
        assert_eq!(stored.audit.len(), 2);
    }

    #[test]
    fn test_approve_requires_evaluation_meeting_threshold() {
        let fx = fixture();
        let v = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        let eval_id = store_evaluation(&fx, &v.id, 83.0);

        let err = fx
            .registry
            .approve(
                &v.id,
                Approval::Evaluation { actor: "pipeline".to_string(), evaluation_id: eval_id.clone(), threshold: 87.0 },
            )
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidState(_)));
        assert_eq!(fx.registry.get(&v.id).unwrap().status, ApprovalStatus::Pending);

        let approved = fx
            .registry
            .approve(
                &v.id,
                Approval::Evaluation { actor: "pipeline".to_string(), evaluation_id: eval_id, threshold: 80.0 },
            )
            .unwrap();
        assert_eq!(approved.status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_approve_blocked_by_checksum_mismatch() {
        let fx = fixture();
        let v = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        assert!(fx.registry.validate_checksum(&v.id).unwrap());

        std::fs::write(&v.artifact_path, "tampered").unwrap();
        assert!(!fx.registry.validate_checksum(&v.id).unwrap());

        let err = fx
            .registry
            .approve(&v.id, Approval::HumanOverride { actor: "dana".to_string(), note: "ok".to_string() })
            .unwrap_err();
        assert!(matches!(err, ForgeError::ChecksumMismatch { .. }));
        assert_eq!(fx.registry.get(&v.id).unwrap().status, ApprovalStatus::Pending);
    }

    #[test]
    fn test_reject_then_approve_is_invalid_state() {
        let fx = fixture();
        let v = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        fx.registry.reject(&v.id, "dana", "hallucinates citations").unwrap();

        assert!(matches!(
            fx.registry.reject(&v.id, "dana", "again"),
            Err(ForgeError::AlreadyRejected(_))
        ));
        assert!(matches!(
            fx.registry.approve(&v.id, Approval::HumanOverride { actor: "dana".to_string(), note: "n".to_string() }),
            Err(ForgeError::InvalidState(_))
        ));
    }

    #[test]
    fn test_current_is_highest_approved() {
        let fx = fixture();
        assert!(matches!(fx.registry.current("legal-qa"), Err(ForgeError::NotFound(_))));

        let v1 = fx.registry.register(request(&fx, "a1", BumpKind::Patch)).unwrap();
        let v2 = fx.registry.register(request(&fx, "a2", BumpKind::Minor)).unwrap();
        let _v3 = fx.registry.register(request(&fx, "a3", BumpKind::Patch)).unwrap();
        assert!(fx.registry.current("legal-qa").unwrap().is_none());

        let human = |n: &str| Approval::HumanOverride { actor: "dana".to_string(), note: n.to_string() };
        fx.registry.approve(&v2.id, human("b")).unwrap();
        fx.registry.approve(&v1.id, human("a")).unwrap();

        assert_eq!(fx.registry.current("legal-qa").unwrap().unwrap().id, v2.id);
    }

    #[test]
    fn test_unknown_version_is_not_found() {
        let fx = fixture();
        assert!(matches!(fx.registry.get("nope"), Err(ForgeError::NotFound(_))));
        assert!(matches!(fx.registry.reject("nope", "dana", "r"), Err(ForgeError::NotFound(_))));
    }
}
