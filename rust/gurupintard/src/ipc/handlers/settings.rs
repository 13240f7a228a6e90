use crate::ipc::error::with_warning;
use crate::ipc::helpers::{parse_params, reply, store, store_mut, to_json, HandlerResult};
use crate::ipc::types::{Request, ServerState};
use crate::mutations::{self, SettingsPatch};
use serde_json::json;

fn handle_settings_get(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let settings = &store(state)?.snapshot().settings;
    Ok(json!({ "settings": to_json(settings)? }))
}

fn handle_settings_update(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let patch: SettingsPatch = parse_params(params)?;
    let store = store_mut(state)?;
    let next = mutations::update_settings(store.snapshot(), patch)?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({ "settings": to_json(&store.snapshot().settings)? }),
        warning,
    ))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_settings_get(state, &req.params),
        "settings.update" => handle_settings_update(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
