//! Field-level comparison of two adapter versions.

use crate::registry::AdapterVersion;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// One differing field. `before`/`after` are `null` when the field is unset
/// on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Value,
    pub after: Value,
}

/// Structured delta between two versions, hyperparameters and metadata only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDiff {
    pub from: String,
    pub to: String,
    pub changes: Vec<FieldChange>,
}

impl VersionDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[must_use]
    pub fn change(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }
}

fn push_if_changed(changes: &mut Vec<FieldChange>, field: &str, before: Value, after: Value) {
    if before != after {
        changes.push(FieldChange { field: field.to_string(), before, after });
    }
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Walks both objects key by key, recursing into nested objects so that
/// `extra` entries are reported individually.
fn diff_objects(
    changes: &mut Vec<FieldChange>,
    prefix: &str,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    for key in keys {
        let field = format!("{prefix}.{key}");
        let left = before.get(key).cloned().unwrap_or(Value::Null);
        let right = after.get(key).cloned().unwrap_or(Value::Null);
        match (&left, &right) {
            (Value::Object(l), Value::Object(r)) => diff_objects(changes, &field, l, r),
            _ => push_if_changed(changes, &field, left, right),
        }
    }
}

pub(crate) fn diff_versions(a: &AdapterVersion, b: &AdapterVersion) -> VersionDiff {
    let mut changes = Vec::new();

    push_if_changed(&mut changes, "family", Value::from(a.family.as_str()), Value::from(b.family.as_str()));
    push_if_changed(
        &mut changes,
        "version",
        Value::from(a.version.to_string()),
        Value::from(b.version.to_string()),
    );
    push_if_changed(
        &mut changes,
        "base_model",
        Value::from(a.base_model.as_str()),
        Value::from(b.base_model.as_str()),
    );
    push_if_changed(&mut changes, "method", Value::from(a.method.as_str()), Value::from(b.method.as_str()));
    push_if_changed(
        &mut changes,
        "artifact_path",
        Value::from(a.artifact_path.to_string_lossy().as_ref()),
        Value::from(b.artifact_path.to_string_lossy().as_ref()),
    );
    push_if_changed(&mut changes, "checksum", Value::from(a.checksum.as_str()), Value::from(b.checksum.as_str()));
    push_if_changed(&mut changes, "status", Value::from(a.status.as_str()), Value::from(b.status.as_str()));
    push_if_changed(
        &mut changes,
        "job_id",
        a.job_id.clone().map_or(Value::Null, Value::from),
        b.job_id.clone().map_or(Value::Null, Value::from),
    );

    let before = as_object(serde_json::to_value(&a.hyperparams).unwrap_or(Value::Null));
    let after = as_object(serde_json::to_value(&b.hyperparams).unwrap_or(Value::Null));
    diff_objects(&mut changes, "hyperparams", &before, &after);

    VersionDiff { from: a.label(), to: b.label(), changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ApprovalStatus, Hyperparams};
    use chrono::Utc;
    use semver::Version;
    use std::path::PathBuf;

    fn version(patch: u64, hyperparams: Hyperparams) -> AdapterVersion {
        AdapterVersion {
            id: format!("v{patch}"),
            family: "legal-qa".to_string(),
            version: Version::new(1, 0, patch),
            artifact_path: PathBuf::from("/tmp/adapter"),
            base_model: "llama-3-8b".to_string(),
            method: "lora".to_string(),
            hyperparams,
            checksum: "abc".to_string(),
            status: ApprovalStatus::Pending,
            audit: Vec::new(),
            job_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_identical_hyperparams_only_version_differs() {
        let hp = Hyperparams { rank: Some(8), ..Default::default() };
        let diff = diff_versions(&version(0, hp.clone()), &version(1, hp));
        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].field, "version");
        assert_eq!(diff.from, "legal-qa@1.0.0");
        assert_eq!(diff.to, "legal-qa@1.0.1");
    }

    #[test]
    fn test_hyperparam_changes_are_reported_per_field() {
        let mut before = Hyperparams { rank: Some(8), learning_rate: Some(2e-4), ..Default::default() };
        before.extra.insert("warmup".to_string(), serde_json::json!(100));
        let mut after = Hyperparams { rank: Some(16), learning_rate: Some(2e-4), epochs: Some(3), ..Default::default() };
        after.extra.insert("warmup".to_string(), serde_json::json!(50));

        let diff = diff_versions(&version(0, before), &version(1, after));

        let rank = diff.change("hyperparams.rank").unwrap();
        assert_eq!(rank.before, serde_json::json!(8));
        assert_eq!(rank.after, serde_json::json!(16));

        let epochs = diff.change("hyperparams.epochs").unwrap();
        assert_eq!(epochs.before, Value::Null);
        assert_eq!(epochs.after, serde_json::json!(3));

        assert!(diff.change("hyperparams.extra.warmup").is_some());
        assert!(diff.change("hyperparams.learning_rate").is_none());
    }
}
