use crate::ai::{QuestionRequest, GENERATE_FAILED};
use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_required_str, parse_params, reply, store, store_mut, to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::mutations::{self, ExamDraft};
use serde_json::json;

fn handle_exams_list(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    Ok(json!({ "exams": to_json(&snapshot.exam_packages)? }))
}

fn handle_exams_save(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let draft: ExamDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, exam) = mutations::save_exam(store.snapshot(), draft)?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({ "examId": exam.id, "exam": to_json(&exam)? }),
        warning,
    ))
}

fn handle_exams_delete(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let exam_id = get_required_str(params, "examId")?;
    let store = store_mut(state)?;
    let next = mutations::delete_exam(store.snapshot(), &exam_id)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "ok": true }), warning))
}

/// Generates questions with the AI service and merges them into the exam
/// package as it exists when the generation returns.
fn handle_exams_generate(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let exam_id = get_required_str(params, "examId")?;
    let request: QuestionRequest = parse_params(params)?;
    if request.topic.trim().is_empty() {
        return Err(HandlerErr::bad_params("missing topic"));
    }
    if request.count == 0 {
        return Err(HandlerErr::bad_params("count must be at least 1"));
    }
    if !store(state)?
        .snapshot()
        .exam_packages
        .iter()
        .any(|e| e.id == exam_id)
    {
        return Err(crate::error::StoreError::not_found("exam", &exam_id).into());
    }

    let generated = state.assistant.generate_questions(&request).map_err(|e| {
        tracing::warn!(error = %e, exam_id = %exam_id, "question generation failed");
        HandlerErr {
            code: "ai_failed",
            message: GENERATE_FAILED.to_string(),
            details: Some(json!({ "reason": e.to_string() })),
        }
    })?;

    let store = store_mut(state)?;
    let (next, added) =
        mutations::merge_generated_questions(store.snapshot(), &exam_id, generated)?;
    let warning = store.commit(next);
    let exam = store
        .snapshot()
        .exam_packages
        .iter()
        .find(|e| e.id == exam_id)
        .map(to_json)
        .transpose()?;
    Ok(with_warning(json!({ "added": added, "exam": exam }), warning))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "exams.list" => handle_exams_list(state, &req.params),
        "exams.save" => handle_exams_save(state, &req.params),
        "exams.delete" => handle_exams_delete(state, &req.params),
        "exams.generate" => handle_exams_generate(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
