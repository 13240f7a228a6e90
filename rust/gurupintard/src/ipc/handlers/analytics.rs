use crate::ai::INSIGHT_SCOPE_ALL_CLASSES;
use crate::calc;
use crate::config::INSIGHT_SAMPLE_LIMIT;
use crate::error::StoreError;
use crate::ipc::helpers::{get_required_str, reply, store, to_json, HandlerResult};
use crate::ipc::types::{Request, ServerState};
use crate::model::AppState;
use serde_json::json;

fn handle_dashboard_get(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let model = calc::dashboard(store(state)?.snapshot());
    to_json(&model)
}

fn handle_dashboard_insight(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let sample = calc::insight_sample(store(state)?.snapshot(), INSIGHT_SAMPLE_LIMIT);
    let insight = state
        .assistant
        .class_insight(INSIGHT_SCOPE_ALL_CLASSES, &sample);
    Ok(json!({ "insight": insight, "sampleSize": sample.len() }))
}

/// Both per-student views need the class and a student enrolled in it.
fn class_student(
    snapshot: &AppState,
    params: &serde_json::Value,
) -> Result<(String, String), StoreError> {
    let class_id = params
        .get("classId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StoreError::validation("missing classId"))?;
    let student_id = params
        .get("studentId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| StoreError::validation("missing studentId"))?;
    if snapshot.class(class_id).is_none() {
        return Err(StoreError::not_found("class", class_id));
    }
    match snapshot.student(student_id) {
        Some(s) if s.class_id == class_id => Ok((class_id.to_string(), student_id.to_string())),
        _ => Err(StoreError::not_found("student", student_id)),
    }
}

fn handle_student_radar(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    let (class_id, student_id) = class_student(snapshot, params)?;
    let points = calc::student_radar(snapshot, &class_id, &student_id);
    Ok(json!({ "studentId": student_id, "points": to_json(&points)? }))
}

fn handle_student_trend(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    let (class_id, student_id) = class_student(snapshot, params)?;
    let points = calc::student_trend(snapshot, &class_id, &student_id);
    Ok(json!({ "studentId": student_id, "points": to_json(&points)? }))
}

fn handle_student_attendance(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let snapshot = store(state)?.snapshot();
    let Some(student) = snapshot.student(&student_id) else {
        return Err(StoreError::not_found("student", &student_id).into());
    };
    let counts = calc::student_attendance(snapshot, &student.class_id, &student_id);
    let sessions = snapshot
        .daily_attendance
        .iter()
        .filter(|d| d.class_id == student.class_id)
        .count();
    Ok(json!({
        "studentId": student_id,
        "classId": student.class_id,
        "counts": to_json(&counts)?,
        "sessions": sessions,
        "presentRate": calc::present_rate(&counts, sessions),
    }))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "dashboard.get" => handle_dashboard_get(state, &req.params),
        "dashboard.insight" => handle_dashboard_insight(state, &req.params),
        "analytics.studentRadar" => handle_student_radar(state, &req.params),
        "analytics.studentTrend" => handle_student_trend(state, &req.params),
        "analytics.studentAttendance" => handle_student_attendance(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
