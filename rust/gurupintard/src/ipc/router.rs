use super::handlers;
use super::types::{Request, ServerState};
use crate::ipc::error::err;

type Handler = fn(&mut ServerState, &Request) -> Option<serde_json::Value>;

const HANDLERS: [Handler; 14] = [
    handlers::core::try_handle,
    handlers::settings::try_handle,
    handlers::classes::try_handle,
    handlers::students::try_handle,
    handlers::assessments::try_handle,
    handlers::attendance::try_handle,
    handlers::journals::try_handle,
    handlers::questionnaires::try_handle,
    handlers::exams::try_handle,
    handlers::forum::try_handle,
    handlers::analytics::try_handle,
    handlers::reports::try_handle,
    handlers::backup_exchange::try_handle,
    handlers::auth::try_handle,
];

pub fn handle_request(state: &mut ServerState, req: Request) -> serde_json::Value {
    let span = tracing::debug_span!("request", id = %req.id, method = %req.method);
    let _guard = span.enter();

    for handler in HANDLERS {
        if let Some(resp) = handler(state, &req) {
            if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
                let code = resp
                    .pointer("/error/code")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                tracing::debug!(code, "request failed");
            }
            return resp;
        }
    }

    tracing::debug!("unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
