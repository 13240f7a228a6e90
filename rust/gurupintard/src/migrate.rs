//! Versioned upgrade of persisted or imported snapshot documents.
//!
//! Documents written before versioning carry no `schemaVersion` and are
//! treated as version 0. Each step takes the raw JSON object one version
//! forward; the final object is deserialized into [`AppState`].

use crate::error::{Result, StoreError};
use crate::model::{AppState, SCHEMA_VERSION};
use serde_json::{Map, Value};

const ENTITY_KEYS: [&str; 10] = [
    "classes",
    "students",
    "assessments",
    "grades",
    "journals",
    "dailyAttendance",
    "questionnaires",
    "questionnaireResponses",
    "examPackages",
    "forumPosts",
];

pub fn document_version(doc: &Value) -> u64 {
    doc.get("schemaVersion")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

pub fn upgrade(doc: Value) -> Result<AppState> {
    let Value::Object(mut obj) = doc else {
        return Err(StoreError::ImportFormat(
            "snapshot must be a JSON object".to_string(),
        ));
    };

    let from = obj
        .get("schemaVersion")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    if from > SCHEMA_VERSION as u64 {
        tracing::warn!(
            from,
            current = SCHEMA_VERSION,
            "snapshot written by a newer version; unknown fields are ignored"
        );
    }
    if from < 1 {
        v0_to_v1(&mut obj)?;
    }
    // Documents at any version, newer ones included, may still lack keys.
    fill_absent_from_skeleton(&mut obj)?;
    obj.insert("schemaVersion".to_string(), Value::from(SCHEMA_VERSION));

    let state: AppState = serde_json::from_value(Value::Object(obj))?;
    Ok(state)
}

/// Unversioned documents predate forum posts and some settings fields.
fn v0_to_v1(obj: &mut Map<String, Value>) -> Result<()> {
    fill_absent_from_skeleton(obj)
}

/// Fills missing entity arrays and settings fields from the default
/// skeleton. Present values are never overwritten.
fn fill_absent_from_skeleton(obj: &mut Map<String, Value>) -> Result<()> {
    let skeleton = serde_json::to_value(AppState::skeleton())?;

    for key in ENTITY_KEYS {
        let absent = matches!(obj.get(key), None | Some(Value::Null));
        if absent {
            let fill = skeleton.get(key).cloned().unwrap_or(Value::Array(Vec::new()));
            obj.insert(key.to_string(), fill);
        }
    }

    let default_settings = skeleton
        .get("settings")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();
    match obj.get_mut("settings") {
        Some(Value::Object(settings)) => {
            for (k, v) in default_settings {
                settings.entry(k).or_insert(v);
            }
        }
        _ => {
            obj.insert("settings".to_string(), Value::Object(default_settings));
        }
    }
    Ok(())
}
