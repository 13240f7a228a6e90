use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, parse_params, reply, store, store_mut, to_json,
    HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::mutations::{self, JournalDraft};
use serde_json::json;

/// Journals newest first, optionally narrowed to one class.
fn handle_journals_list(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    let class_id = get_optional_str(params, "classId");
    let journals: Vec<_> = snapshot
        .journals
        .iter()
        .filter(|j| class_id.as_deref().map(|c| j.class_id == c).unwrap_or(true))
        .collect();
    Ok(json!({ "journals": to_json(&journals)? }))
}

fn handle_journals_save(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let draft: JournalDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, journal) = mutations::save_journal(store.snapshot(), draft)?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({ "journalId": journal.id, "journal": to_json(&journal)? }),
        warning,
    ))
}

fn handle_journals_delete(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let journal_id = get_required_str(params, "journalId")?;
    let store = store_mut(state)?;
    let next = mutations::delete_journal(store.snapshot(), &journal_id)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "ok": true }), warning))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "journals.list" => handle_journals_list(state, &req.params),
        "journals.save" => handle_journals_save(state, &req.params),
        "journals.delete" => handle_journals_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
