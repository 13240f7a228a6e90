use crate::backup;
use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, reply, store, store_mut, HandlerErr, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use serde_json::json;
use std::path::PathBuf;

/// Writes the snapshot to `outDir`, or the workspace directory when no
/// directory is given.
fn handle_backup_export(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let store = store(state)?;
    let out_dir = match get_optional_str(params, "outDir") {
        Some(dir) => PathBuf::from(dir),
        None => store
            .workspace()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| HandlerErr::bad_params("missing outDir"))?,
    };
    let today = chrono::Local::now().date_naive();
    let summary = backup::export_snapshot(store.snapshot(), &out_dir, today).map_err(|e| {
        HandlerErr {
            code: "io_failed",
            message: format!("{e:?}"),
            details: Some(json!({ "outDir": out_dir.to_string_lossy() })),
        }
    })?;
    tracing::info!(path = %summary.path.to_string_lossy(), bytes = summary.bytes, "backup exported");
    Ok(json!({
        "path": summary.path.to_string_lossy(),
        "bytes": summary.bytes,
    }))
}

/// Replaces the whole snapshot with the file's content. Nothing changes
/// unless the file parses and has the required shape.
fn handle_backup_import(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let in_path = PathBuf::from(get_required_str(params, "path")?);
    let store = store_mut(state)?;
    let imported = backup::import_snapshot(&in_path)?;
    let counts = json!({
        "classes": imported.classes.len(),
        "students": imported.students.len(),
        "assessments": imported.assessments.len(),
        "grades": imported.grades.len(),
    });
    let warning = store.commit(imported);
    tracing::info!(path = %in_path.to_string_lossy(), "backup imported");
    Ok(with_warning(json!({ "imported": counts }), warning))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.export" => handle_backup_export(state, &req.params),
        "backup.import" => handle_backup_import(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
