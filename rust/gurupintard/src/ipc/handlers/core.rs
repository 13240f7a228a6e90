use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_required_str, reply, store, store_mut, to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::store::AcademicStateStore;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state
            .store
            .as_ref()
            .and_then(|s| s.workspace())
            .map(|p| p.to_string_lossy().to_string()),
        "aiConfigured": state.assistant.is_configured(),
    }))
}

pub fn open_workspace(state: &mut ServerState, path: PathBuf) -> HandlerResult {
    match AcademicStateStore::open(&path) {
        Ok(store) => {
            state.store = Some(store);
            state.session = None;
            Ok(json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => {
            tracing::error!(error = ?e, path = %path.to_string_lossy(), "workspace open failed");
            Err(HandlerErr {
                code: "db_open_failed",
                message: format!("{e:?}"),
                details: None,
            })
        }
    }
}

fn handle_workspace_select(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let path = get_required_str(params, "path")?;
    open_workspace(state, PathBuf::from(path))
}

fn handle_state_get(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    Ok(json!({ "state": to_json(snapshot)? }))
}

/// Replaces the whole snapshot with a client-built one after migrating it.
fn handle_state_replace(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let Some(doc) = params.get("state").cloned() else {
        return Err(HandlerErr::bad_params("missing state"));
    };
    let next = crate::backup::upgrade_full_document(doc)?;
    let store = store_mut(state)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "replaced": true }), warning))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, &req.params),
        "workspace.select" => handle_workspace_select(state, &req.params),
        "state.get" => handle_state_get(state, &req.params),
        "state.replace" => handle_state_replace(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
