use crate::error::{Result, StoreError};
use crate::migrate;
use crate::model::AppState;
use anyhow::Context;
use chrono::NaiveDate;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Top-level keys a document must carry to be accepted as a backup.
pub const REQUIRED_KEYS: [&str; 3] = ["classes", "students", "settings"];

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub bytes: usize,
}

pub fn backup_file_name(date: NaiveDate) -> String {
    format!("backup_gurupintar_{}.json", date.format("%Y-%m-%d"))
}

pub fn export_snapshot(
    state: &AppState,
    out_dir: &Path,
    date: NaiveDate,
) -> anyhow::Result<ExportSummary> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create directory {}", out_dir.to_string_lossy()))?;

    let text = serde_json::to_string_pretty(state).context("failed to serialize snapshot")?;
    let out_path = out_dir.join(backup_file_name(date));
    let tmp_path = out_path.with_extension("json.writing");

    let mut f = File::create(&tmp_path).with_context(|| {
        format!(
            "failed to create output file {}",
            tmp_path.to_string_lossy()
        )
    })?;
    f.write_all(text.as_bytes())
        .context("failed to write backup")?;
    f.flush().context("failed to flush backup")?;
    drop(f);

    std::fs::rename(&tmp_path, &out_path).with_context(|| {
        format!(
            "failed to move backup to {}",
            out_path.to_string_lossy()
        )
    })?;

    Ok(ExportSummary {
        path: out_path,
        bytes: text.len(),
    })
}

pub fn import_snapshot(in_path: &Path) -> Result<AppState> {
    let text = std::fs::read_to_string(in_path).map_err(|e| {
        StoreError::ImportParse(format!("{}: {}", in_path.to_string_lossy(), e))
    })?;
    parse_backup(&text)
}

/// Validates and upgrades a backup document. Nothing here touches the
/// current snapshot; the caller replaces it only on success.
pub fn parse_backup(text: &str) -> Result<AppState> {
    let doc: serde_json::Value =
        serde_json::from_str(text).map_err(|e| StoreError::ImportParse(e.to_string()))?;
    upgrade_full_document(doc)
}

/// Accepts a whole-snapshot document only when it carries every required
/// top-level key, then upgrades it. Used for backups and for direct
/// snapshot replacement alike.
pub fn upgrade_full_document(doc: serde_json::Value) -> Result<AppState> {
    ensure_required_keys(&doc)?;
    migrate::upgrade(doc).map_err(|e| match e {
        StoreError::Serialization(inner) => StoreError::ImportFormat(inner.to_string()),
        other => other,
    })
}

fn ensure_required_keys(doc: &serde_json::Value) -> Result<()> {
    let Some(obj) = doc.as_object() else {
        return Err(StoreError::ImportFormat(
            "backup must be a JSON object".to_string(),
        ));
    };
    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|k| matches!(obj.get(*k), None | Some(serde_json::Value::Null)))
        .collect();
    if !missing.is_empty() {
        return Err(StoreError::ImportFormat(format!(
            "missing {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::{create_class, create_student, ClassDraft, StudentDraft};

    fn sample_state() -> AppState {
        let (s, class) = create_class(
            &AppState::skeleton(),
            ClassDraft {
                name: "XI IPA 1".to_string(),
                ..Default::default()
            },
        )
        .expect("class");
        let (s, _) = create_student(
            &s,
            &class.id,
            StudentDraft {
                nis: "1001".to_string(),
                name: "Ahmad".to_string(),
                ..Default::default()
            },
        )
        .expect("student");
        s
    }

    #[test]
    fn export_then_import_is_deep_equal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = sample_state();
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).expect("date");

        let summary = export_snapshot(&state, dir.path(), date).expect("export");
        assert_eq!(
            summary.path.file_name().and_then(|n| n.to_str()),
            Some("backup_gurupintar_2024-07-01.json")
        );
        assert!(summary.bytes > 0);

        let restored = import_snapshot(&summary.path).expect("import");
        assert_eq!(restored, state);
    }

    #[test]
    fn rejects_non_json() {
        let e = parse_backup("hello").expect_err("not json");
        assert_eq!(e.code(), "import_parse_failed");
    }

    #[test]
    fn rejects_document_without_students() {
        let e = parse_backup(r#"{"classes": [], "settings": {}}"#).expect_err("no students");
        assert_eq!(e.code(), "import_invalid_format");
        assert!(e.to_string().contains("students"));
    }

    #[test]
    fn empty_document_is_not_a_snapshot() {
        let e = upgrade_full_document(serde_json::json!({})).expect_err("empty");
        assert_eq!(e.code(), "import_invalid_format");
        assert!(e.to_string().contains("classes"));
        let e = upgrade_full_document(serde_json::json!({
            "classes": [], "students": null, "settings": {}
        }))
        .expect_err("null students");
        assert_eq!(e.code(), "import_invalid_format");
    }

    #[test]
    fn versioned_backup_without_assessments_is_accepted() {
        let state = parse_backup(
            r#"{"schemaVersion": 1, "classes": [], "students": [],
                "settings": {"kkm": 70, "schoolName": "SD 3", "teacherName": "Bu Rina"}}"#,
        )
        .expect("lenient import");
        assert!(state.assessments.is_empty());
        assert_eq!(state.settings.teacher_name, "Bu Rina");
    }

    #[test]
    fn rejects_wrongly_shaped_entities() {
        let e = parse_backup(r#"{"classes": 5, "students": [], "settings": {}}"#)
            .expect_err("bad shape");
        assert_eq!(e.code(), "import_invalid_format");
    }

    #[test]
    fn missing_file_is_a_parse_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let e = import_snapshot(&dir.path().join("nope.json")).expect_err("missing");
        assert_eq!(e.code(), "import_parse_failed");
    }
}
