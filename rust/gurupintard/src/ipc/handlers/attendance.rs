use crate::calc;
use crate::ipc::error::with_warning;
use crate::ipc::helpers::{
    get_required_str, parse_params, reply, store, store_mut, to_json, HandlerResult,
};
use crate::ipc::types::{Request, ServerState};
use crate::model::attendance_id;
use crate::mutations::{self, AttendanceSheetDraft};
use serde_json::json;

fn handle_attendance_get(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let date = get_required_str(params, "date")?;
    let snapshot = store(state)?.snapshot();
    let records = mutations::attendance_for_date(snapshot, &class_id, &date)?;
    let saved = snapshot
        .daily_attendance
        .iter()
        .any(|d| d.class_id == class_id && d.date == date);
    Ok(json!({
        "id": attendance_id(&class_id, &date),
        "classId": class_id,
        "date": date,
        "saved": saved,
        "records": to_json(&records)?,
    }))
}

fn handle_attendance_save(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let draft: AttendanceSheetDraft = parse_params(params)?;
    let store = store_mut(state)?;
    let (next, sheet) = mutations::save_attendance(store.snapshot(), draft)?;
    let warning = store.commit(next);
    Ok(with_warning(json!({ "attendance": to_json(&sheet)? }), warning))
}

fn handle_attendance_recap(state: &mut ServerState, params: &serde_json::Value) -> HandlerResult {
    let class_id = get_required_str(params, "classId")?;
    let month = get_required_str(params, "month")?;
    let recap = calc::attendance_recap(store(state)?.snapshot(), &class_id, &month)?;
    to_json(&recap)
}

pub fn try_handle(state: &mut ServerState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.get" => handle_attendance_get(state, &req.params),
        "attendance.save" => handle_attendance_save(state, &req.params),
        "attendance.recap" => handle_attendance_recap(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
