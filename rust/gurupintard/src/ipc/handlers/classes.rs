use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_required_str, parse_params, reply, store, store_mut, to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::mutations::{self, ClassDraft};
use serde_json::json;

fn handle_classes_list(state: &mut ServerState, _params: &serde_json::Value) -> HandlerResult {
    let snapshot = store(state)?.snapshot();

    // Include basic counts so the UI can show a useful class overview.
    let classes = snapshot
        .classes
        .iter()
        .map(|c| {
            let student_count = snapshot.students_in_class(&c.id).count();
            let assessment_count = snapshot
                .assessments
                .iter()
                .filter(|a| a.class_id == c.id)
                .count();
            let mut row = to_json(c)?;
            row["studentCount"] = json!(student_count);
            row["assessmentCount"] = json!(assessment_count);
            Ok::<_, HandlerErr>(row)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({ "classes": classes }))
}

fn handle_classes_create(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let draft: ClassDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, class) = mutations::create_class(store.snapshot(), draft)?;
    let warning = store.commit(next);
    tracing::info!(class_id = %class.id, name = %class.name, "class created");
    Ok(with_warning(
        json!({ "classId": class.id, "class": to_json(&class)? }),
        warning,
    ))
}

fn handle_classes_update(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let draft: ClassDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let next = mutations::update_class(store.snapshot(), &class_id, draft)?;
    let warning = store.commit(next);
    let class = store.snapshot().class(&class_id).map(to_json).transpose()?;
    Ok(with_warning(json!({ "class": class }), warning))
}

fn handle_classes_delete(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let store = store_mut(state)?;
    let before = store.snapshot();
    let students_before = before.students.len();
    let grades_before = before.grades.len();
    let next = mutations::delete_class(before, &class_id)?;
    let removed = json!({
        "students": students_before - next.students.len(),
        "grades": grades_before - next.grades.len(),
    });
    let warning = store.commit(next);
    tracing::info!(class_id = %class_id, "class deleted with dependents");
    Ok(with_warning(json!({ "ok": true, "removed": removed }), warning))
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_classes_list(state, &req.params),
        "classes.create" => handle_classes_create(state, &req.params),
        "classes.update" => handle_classes_update(state, &req.params),
        "classes.delete" => handle_classes_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
