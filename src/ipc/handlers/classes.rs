use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{
    current_user, get_optional_bool, get_optional_str, get_required_str, require_store,
};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle;
use crate::policy;
use serde_json::json;

fn classes_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(store) = state.store.as_ref() else {
        return Ok(json!({ "classes": [] }));
    };
    let mine = get_optional_bool(params, "mine")?.unwrap_or(false);
    let classes = if mine {
        let user = current_user(store)?;
        let user = policy::require_signed_in(user.as_ref())?;
        lifecycle::list_classes(store, Some(&user.uid))?
    } else {
        lifecycle::list_classes(store, None)?
    };
    Ok(json!({ "classes": classes }))
}

fn classes_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let class = lifecycle::get_class(store, &class_id)?;
    let user = current_user(store)?;
    let is_owner = user.map(|u| u.uid == class.teacher_id).unwrap_or(false);
    Ok(json!({ "class": class, "isOwner": is_owner }))
}

fn classes_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let user = current_user(store)?;
    let user = policy::require_signed_in(user.as_ref())?;
    let name = get_required_str(params, "name")?;
    let subject = get_optional_str(params, "subject");
    let class_id = lifecycle::create_class(store, &user.uid, &name, subject)?;
    Ok(json!({ "classId": class_id, "name": name.trim() }))
}

fn classes_update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    let subject = get_optional_str(params, "subject");
    policy::require_owner(store, &class_id, current_user(store)?.as_ref())?;
    lifecycle::update_class(store, &class_id, &name, subject)?;
    Ok(json!({ "ok": true }))
}

fn classes_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    policy::require_owner(store, &class_id, current_user(store)?.as_ref())?;
    let report = lifecycle::delete_class(store, &class_id)?;
    if state.draft.as_ref().is_some_and(|d| d.class_id == class_id) {
        state.draft = None;
    }
    Ok(json!({ "deleted": report }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => classes_list(state, &req.params),
        "classes.get" => classes_get(state, &req.params),
        "classes.create" => classes_create(state, &req.params),
        "classes.update" => classes_update(state, &req.params),
        "classes.delete" => classes_delete(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
