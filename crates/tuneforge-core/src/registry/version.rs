//! Adapter registry records.

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A named lineage of adapters sharing a domain and base model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterFamily {
    pub name: String,
    pub domain: String,
    pub base_model: String,
    pub created_at: DateTime<Utc>,
}

/// Approval status of a single version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown approval status: {other}")),
        }
    }
}

/// Which part of the semantic version a registration bumps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BumpKind {
    #[default]
    Patch,
    Minor,
    Major,
}

impl BumpKind {
    /// Version following `latest`. The first version of a family is `1.0.0`
    /// whatever the bump kind.
    #[must_use]
    pub fn next(self, latest: Option<&Version>) -> Version {
        match latest {
            None => Version::new(1, 0, 0),
            Some(v) => match self {
                Self::Patch => Version::new(v.major, v.minor, v.patch + 1),
                Self::Minor => Version::new(v.major, v.minor + 1, 0),
                Self::Major => Version::new(v.major + 1, 0, 0),
            },
        }
    }
}

impl std::str::FromStr for BumpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(format!("unknown bump kind: {other}")),
        }
    }
}

/// Training hyperparameters recorded with a version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epochs: Option<u32>,
    /// Anything else the trainer was configured with.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Registered,
    Approved,
    Rejected,
}

/// One line of a version's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    /// Evaluation reference, override note, or rejection reason.
    pub detail: String,
}

/// One immutable adapter artifact record.
///
/// Only `status` and `audit` ever change after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterVersion {
    pub id: String,
    pub family: String,
    pub version: Version,
    pub artifact_path: PathBuf,
    pub base_model: String,
    pub method: String,
    pub hyperparams: Hyperparams,
    /// sha256 hex of the artifact at registration.
    pub checksum: String,
    pub status: ApprovalStatus,
    pub audit: Vec<AuditEntry>,
    /// Training job that produced the artifact, if any.
    pub job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AdapterVersion {
    /// `family@1.2.3`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}@{}", self.family, self.version)
    }
}

/// How an approval is justified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Approval {
    /// Backed by a stored evaluation whose aggregate meets `threshold`.
    Evaluation { actor: String, evaluation_id: String, threshold: f64 },
    /// Explicit human decision.
    HumanOverride { actor: String, note: String },
}

impl Approval {
    #[must_use]
    pub fn actor(&self) -> &str {
        match self {
            Self::Evaluation { actor, .. } | Self::HumanOverride { actor, .. } => actor,
        }
    }
}
