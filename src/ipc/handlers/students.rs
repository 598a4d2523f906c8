use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{current_user, get_required_str, require_store};
use crate::ipc::types::{AppState, Request};
use crate::ipc::watch::roster_snapshot;
use crate::lifecycle;
use crate::policy;
use serde_json::json;

fn students_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    Ok(roster_snapshot(store, &class_id)?)
}

fn students_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    let roll_no = get_required_str(params, "rollNo")?;
    policy::require_owner(store, &class_id, current_user(store)?.as_ref())?;
    let student_id = lifecycle::add_student(store, &class_id, &name, &roll_no)?;
    Ok(json!({ "studentId": student_id }))
}

fn students_delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    policy::require_owner(store, &class_id, current_user(store)?.as_ref())?;
    let removed = lifecycle::delete_student(store, &class_id, &student_id)?;
    Ok(json!({ "ok": true, "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
