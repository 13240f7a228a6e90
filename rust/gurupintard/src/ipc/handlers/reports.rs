use crate::calc;
use crate::ipc::helpers::{get_required_str, reply, store, to_json, HandlerResult};
use crate::ipc::types::{Request, ServerState};
use serde_json::json;

fn handle_reports_card(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let card = calc::report_card(store(state)?.snapshot(), &class_id, &student_id)?;
    to_json(&card)
}

/// Narrative for the report card. Strengths are types averaging at least
/// 85, weaknesses those below the KKM.
fn handle_reports_feedback(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let card = calc::report_card(store(state)?.snapshot(), &class_id, &student_id)?;

    let strengths: Vec<&str> = card.strengths.iter().map(|k| k.label()).collect();
    let weaknesses: Vec<&str> = card.weaknesses.iter().map(|k| k.label()).collect();
    let feedback = state.assistant.student_feedback(
        &card.student_name,
        card.final_grade,
        &strengths,
        &weaknesses,
    );
    Ok(json!({
        "studentId": card.student_id,
        "finalGrade": card.final_grade,
        "feedback": feedback,
    }))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.card" => handle_reports_card(state, &req.params),
        "reports.feedback" => handle_reports_feedback(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
