use crate::calc;
use crate::error::StoreError;
use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_required_str, parse_params, reply, store, store_mut, to_json, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::model::response_id;
use crate::mutations::{self, QuestionnaireDraft, ResponseDraft};
use serde_json::json;

fn handle_questionnaires_list(
    state: &mut ServerState,
    _params: &serde_json::Value,
) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    Ok(json!({
        "questionnaires": to_json(&snapshot.questionnaires)?,
        "overview": to_json(&calc::questionnaire_overview(snapshot))?,
    }))
}

fn handle_questionnaires_save(
    state: &mut ServerState,
    params: &serde_json::Value,
) -> HandlerResult {
    let draft: QuestionnaireDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, questionnaire) = mutations::save_questionnaire(store.snapshot(), draft)?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({
            "questionnaireId": questionnaire.id,
            "questionnaire": to_json(&questionnaire)?,
        }),
        warning,
    ))
}

fn handle_questionnaires_delete(
    state: &mut ServerState,
    params: &serde_json::Value,
) -> HandlerResult {
    let questionnaire_id = get_required_str(params, "questionnaireId")?;
    let store = store_mut(state)?;
    let next = mutations::delete_questionnaire(store.snapshot(), &questionnaire_id)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "ok": true }), warning))
}

fn handle_responses_get(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let questionnaire_id = get_required_str(params, "questionnaireId")?;
    let student_id = get_required_str(params, "studentId")?;
    let response = store(state)?
        .snapshot()
        .response_for(&questionnaire_id, &student_id)
        .map(to_json)
        .transpose()?;
    Ok(json!({ "response": response }))
}

fn handle_responses_save(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let draft: ResponseDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, response) = mutations::save_response(store.snapshot(), draft)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "response": to_json(&response)? }), warning))
}

/// Runs the talent narrative for an existing response and stores it on
/// whatever response holds that key once the text is back.
fn handle_responses_analyze(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let questionnaire_id = get_required_str(params, "questionnaireId")?;
    let student_id = get_required_str(params, "studentId")?;

    let snapshot = store(state)?.snapshot();
    let Some(profile) = calc::talent_profile(snapshot, &questionnaire_id, &student_id) else {
        return Err(StoreError::not_found(
            "response",
            &response_id(&questionnaire_id, &student_id),
        )
        .into());
    };
    let student_name = snapshot
        .student(&student_id)
        .map(|s| s.name.clone())
        .unwrap_or_default();
    let title = snapshot
        .questionnaire(&questionnaire_id)
        .map(|q| q.title.clone())
        .unwrap_or_default();

    let analysis = state
        .assistant
        .talent_analysis(&student_name, &title, &profile.categories);

    let store = store_mut(state)?;
    let next = mutations::attach_talent_analysis(
        store.snapshot(),
        &questionnaire_id,
        &student_id,
        analysis.clone(),
    )?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({
            "analysis": analysis,
            "categories": to_json(&profile.categories)?,
        }),
        warning,
    ))
}

fn handle_talent_profile(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let questionnaire_id = get_required_str(params, "questionnaireId")?;
    let student_id = get_required_str(params, "studentId")?;
    let snapshot = store(state)?.snapshot();
    if snapshot.questionnaire(&questionnaire_id).is_none() {
        return Err(StoreError::not_found("questionnaire", &questionnaire_id).into());
    }
    let profile = calc::talent_profile(snapshot, &questionnaire_id, &student_id)
        .map(|p| to_json(&p))
        .transpose()?;
    Ok(json!({ "profile": profile }))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "questionnaires.list" => handle_questionnaires_list(state, &req.params),
        "questionnaires.save" => handle_questionnaires_save(state, &req.params),
        "questionnaires.delete" => handle_questionnaires_delete(state, &req.params),
        "responses.get" => handle_responses_get(state, &req.params),
        "responses.save" => handle_responses_save(state, &req.params),
        "responses.analyze" => handle_responses_analyze(state, &req.params),
        "talent.profile" => handle_talent_profile(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
