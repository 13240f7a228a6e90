use crate::auth;
use crate::ipc::helpers::{get_required_str, reply, store, to_json, HandlerErr, HandlerResult};
use crate::ipc::types::{Request, ServerState};
use serde_json::json;

fn handle_auth_login(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let identifier = get_required_str(params, "identifier")?;
    let password = params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let Some(session) = auth::login(store(state)?.snapshot(), &identifier, password) else {
        return Err(HandlerErr {
            code: "auth_failed",
            message: "invalid credentials".to_string(),
            details: None,
        });
    };
    let result = json!({ "session": to_json(&session)? });
    state.session = Some(session);
    Ok(result)
}

fn handle_auth_logout(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    state.session = None;
    Ok(json!({ "ok": true }))
}

fn handle_auth_session(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let session = state.session.as_ref().map(to_json).transpose()?;
    Ok(json!({ "session": session }))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => handle_auth_login(state, &req.params),
        "auth.logout" => handle_auth_logout(state, &req.params),
        "auth.session" => handle_auth_session(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
