use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, parse_params, reply, store, store_mut, to_json,
    HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::mutations::{self, StudentDraft};
use serde_json::json;

fn handle_students_list(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();
    let students: Vec<_> = match get_optional_str(params, "classId") {
        Some(class_id) => snapshot
            .students
            .iter()
            .filter(|s| s.class_id == class_id)
            .collect(),
        None => snapshot.students.iter().collect(),
    };
    Ok(json!({ "students": to_json(&students)? }))
}

fn handle_students_create(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let draft: StudentDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, student) = mutations::create_student(store.snapshot(), &class_id, draft)?;
    let warning = store.commit(next);
    Ok(with_warning(
        json!({ "studentId": student.id, "student": to_json(&student)? }),
        warning,
    ))
}

fn handle_students_update(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let draft: StudentDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let next = mutations::update_student(store.snapshot(), &student_id, draft)?;
    let warning = store.commit(next);
    let student = store.snapshot().student(&student_id).map(to_json).transpose()?;
    Ok(with_warning(json!({ "student": student }), warning))
}

fn handle_students_delete(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let student_id = get_required_str(params, "studentId")?;
    let store = store_mut(state)?;
    let next = mutations::delete_student(store.snapshot(), &student_id)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "ok": true }), warning))
}

fn handle_students_import_csv(
    state: &mut ServerState,
    params: &serde_json::Value,
) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let text = get_required_str(params, "text")?;
    let store = store_mut(state)?;
    let (next, added) = mutations::import_students_csv(store.snapshot(), &class_id, &text)?;
    let warning = store.commit(next);
    tracing::info!(class_id = %class_id, added = added.len(), "students imported");
    Ok(with_warning(
        json!({ "added": added.len(), "students": to_json(&added)? }),
        warning,
    ))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_students_list(state, &req.params),
        "students.create" => handle_students_create(state, &req.params),
        "students.update" => handle_students_update(state, &req.params),
        "students.delete" => handle_students_delete(state, &req.params),
        "students.importCsv" => handle_students_import_csv(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
