//! The academic state store: one authoritative snapshot plus its persisted
//! copy in the workspace key-value table.

use crate::config::{CORRUPT_STORAGE_KEY, STORAGE_KEY};
use crate::db;
use crate::error::Result;
use crate::migrate;
use crate::model::AppState;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub struct AcademicStateStore {
    snapshot: AppState,
    conn: Connection,
    workspace: Option<PathBuf>,
}

impl AcademicStateStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)?;
        let snapshot = load_snapshot(&conn)?;
        tracing::info!(
            workspace = %workspace.to_string_lossy(),
            classes = snapshot.classes.len(),
            students = snapshot.students.len(),
            "workspace opened"
        );
        Ok(Self {
            snapshot,
            conn,
            workspace: Some(workspace.to_path_buf()),
        })
    }

    pub fn snapshot(&self) -> &AppState {
        &self.snapshot
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    /// Makes `next` the current snapshot and persists it. The in-memory
    /// snapshot is replaced even when saving fails; the failure comes back
    /// as a warning message for the caller to surface.
    pub fn commit(&mut self, next: AppState) -> Option<String> {
        self.snapshot = next;
        match persist(&self.conn, &self.snapshot) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(error = %e, "snapshot kept in memory but not saved");
                Some(format!("changes are kept in memory but were not saved: {}", e))
            }
        }
    }
}

fn persist(conn: &Connection, state: &AppState) -> Result<()> {
    let text = serde_json::to_string(state)?;
    db::kv_set(conn, STORAGE_KEY, &text)?;
    Ok(())
}

/// Reads the stored document and upgrades it. A missing document starts a
/// fresh skeleton; an unreadable one is kept aside under the corrupt key so
/// it is never silently overwritten.
fn load_snapshot(conn: &Connection) -> anyhow::Result<AppState> {
    let Some(text) = db::kv_get(conn, STORAGE_KEY)? else {
        let state = AppState::skeleton();
        persist(conn, &state)?;
        return Ok(state);
    };

    let upgraded = serde_json::from_str::<serde_json::Value>(&text)
        .map_err(crate::error::StoreError::from)
        .and_then(|doc| {
            let from = migrate::document_version(&doc);
            migrate::upgrade(doc).map(|state| (from, state))
        });

    match upgraded {
        Ok((from, state)) => {
            if from != state.schema_version as u64 {
                tracing::info!(from, to = state.schema_version, "snapshot migrated");
                persist(conn, &state)?;
            }
            Ok(state)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                key = CORRUPT_STORAGE_KEY,
                "stored snapshot unreadable; starting fresh"
            );
            db::kv_set(conn, CORRUPT_STORAGE_KEY, &text)?;
            let state = AppState::skeleton();
            persist(conn, &state)?;
            Ok(state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::{create_class, ClassDraft};

    #[test]
    fn fresh_workspace_starts_from_skeleton() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AcademicStateStore::open(dir.path()).expect("open");
        assert_eq!(store.snapshot(), &AppState::skeleton());
        assert_eq!(store.workspace(), Some(dir.path()));
    }

    #[test]
    fn committed_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = AcademicStateStore::open(dir.path()).expect("open");
        let (next, class) = create_class(
            store.snapshot(),
            ClassDraft {
                name: "X-A".to_string(),
                ..Default::default()
            },
        )
        .expect("create");
        assert!(store.commit(next).is_none());
        drop(store);

        let reopened = AcademicStateStore::open(dir.path()).expect("reopen");
        assert_eq!(reopened.snapshot().classes, vec![class]);
    }

    #[test]
    fn corrupt_document_is_set_aside() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let conn = db::open_db(dir.path()).expect("db");
            db::kv_set(&conn, STORAGE_KEY, "{not json").expect("seed");
        }
        let store = AcademicStateStore::open(dir.path()).expect("open");
        assert_eq!(store.snapshot(), &AppState::skeleton());

        let conn = db::open_db(dir.path()).expect("db");
        assert_eq!(
            db::kv_get(&conn, CORRUPT_STORAGE_KEY).expect("get").as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn legacy_document_is_migrated_on_load() {
        let conn = db::open_in_memory().expect("db");
        db::kv_set(
            &conn,
            STORAGE_KEY,
            r#"{"classes":[],"students":[],"settings":{"kkm":80}}"#,
        )
        .expect("seed");
        let state = load_snapshot(&conn).expect("load");
        assert_eq!(state.settings.kkm, 80.0);
        assert!(state.forum_posts.is_empty());

        let stored = db::kv_get(&conn, STORAGE_KEY).expect("get").expect("doc");
        assert!(stored.contains("\"schemaVersion\":1"));
    }
}
