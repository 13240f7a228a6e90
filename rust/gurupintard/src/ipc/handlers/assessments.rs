use crate::calc;
use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, parse_field, parse_params, reply, store, store_mut,
    to_json, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::mutations::{self, AssessmentDraft, GradeEntry};
use serde_json::json;

fn handle_assessments_list(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    let class_id = get_optional_str(params, "classId");
    let assessments: Vec<_> = snapshot
        .assessments
        .iter()
        .filter(|a| class_id.as_deref().map(|c| a.class_id == c).unwrap_or(true))
        .collect();
    Ok(json!({ "assessments": to_json(&assessments)? }))
}

fn handle_assessments_create(
    state: &mut ServerState,
    params: &serde_json::Value,
) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let draft: AssessmentDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, assessment) = mutations::create_assessment(store.snapshot(), &class_id, draft)?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({ "assessmentId": assessment.id, "assessment": to_json(&assessment)? }),
        warning,
    ))
}

fn handle_assessments_update(
    state: &mut ServerState,
    params: &serde_json::Value,
) -> HandlerResult {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let draft: AssessmentDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let next = mutations::update_assessment(store.snapshot(), &assessment_id, draft)?;
    let warning = store.commit(next);
    let assessment = store
        .snapshot()
        .assessment(&assessment_id)
        .map(to_json)
        .transpose()?;
    Ok(with_warning(json!({ "assessment": assessment }), warning))
}

fn handle_assessments_delete(
    state: &mut ServerState,
    params: &serde_json::Value,
) -> HandlerResult {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let store = store_mut(state)?;
    let next = mutations::delete_assessment(store.snapshot(), &assessment_id)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "ok": true }), warning))
}

fn handle_assessments_stats(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let stats = calc::assessment_stats(store(state)?.snapshot(), &assessment_id)?;
    to_json(&stats)
}

/// Grade sheet for one assessment: every student of its class with the
/// saved score, or null when nothing was entered yet.
fn handle_grades_list(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let snapshot = store(state)?.snapshot();
    let Some(assessment) = snapshot.assessment(&assessment_id) else {
        return Err(crate::error::StoreError::not_found("assessment", &assessment_id).into());
    };
    let rows: Vec<_> = snapshot
        .students_in_class(&assessment.class_id)
        .map(|s| {
            let grade = snapshot.grade_for(&assessment_id, &s.id);
            json!({
                "studentId": s.id,
                "name": s.name,
                "nis": s.nis,
                "score": grade.map(|g| g.score),
                "feedback": grade.and_then(|g| g.feedback.clone()),
            })
        })
        .collect();
    Ok(json!({
        "assessmentId": assessment_id,
        "maxScore": assessment.max_score,
        "rows": rows,
    }))
}

fn handle_grades_save(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let entries: Vec<GradeEntry> = parse_field(params, "grades")?;
    let count = entries.len();
    let store = store_mut(state)?;
    let next = mutations::save_grades(store.snapshot(), &assessment_id, entries)?;
    let warning = store.commit(next);
    tracing::debug!(assessment_id = %assessment_id, count, "grades saved");
    Ok(with_warning(json!({ "saved": count }), warning))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assessments.list" => handle_assessments_list(state, &req.params),
        "assessments.create" => handle_assessments_create(state, &req.params),
        "assessments.update" => handle_assessments_update(state, &req.params),
        "assessments.delete" => handle_assessments_delete(state, &req.params),
        "assessments.stats" => handle_assessments_stats(state, &req.params),
        "grades.list" => handle_grades_list(state, &req.params),
        "grades.save" => handle_grades_save(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
