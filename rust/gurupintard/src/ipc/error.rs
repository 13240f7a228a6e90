use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Attaches a non-fatal persistence warning to a mutation result.
pub fn with_warning(mut result: serde_json::Value, warning: Option<String>) -> serde_json::Value {
    if let (Some(w), Some(obj)) = (warning, result.as_object_mut()) {
        obj.insert("warning".to_string(), json!(w));
    }
    result
}
