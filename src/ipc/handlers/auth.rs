use crate::auth;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{current_user, get_required_str, require_store};
use crate::ipc::types::{AppState, Request};
use crate::policy;
use serde_json::json;

fn auth_register(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let email = get_required_str(params, "email")?;
    let password = get_required_str(params, "password")?;
    let user = auth::register(store.conn(), &email, &password)?;
    Ok(json!({ "uid": user.uid, "email": user.email }))
}

fn auth_sign_in(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let email = get_required_str(params, "email")?;
    let password = get_required_str(params, "password")?;
    let user = auth::sign_in(store.conn(), &email, &password)?;
    // A draft belongs to whoever opened it.
    state.draft = None;
    Ok(json!({ "uid": user.uid, "email": user.email }))
}

fn auth_sign_out(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    auth::sign_out(store.conn())?;
    state.draft = None;
    Ok(json!({ "ok": true }))
}

fn auth_current_user(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    Ok(json!({ "user": current_user(store)? }))
}

fn auth_role(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(store) = state.store.as_ref() else {
        return Ok(json!({ "role": policy::Role::Guest }));
    };
    let user = current_user(store)?;
    // Lookup failures degrade to the signed-in/signed-out default.
    let role = match policy::role_of(store, user.as_ref()) {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!(error = %e, "role lookup failed");
            if user.is_some() {
                policy::Role::Student
            } else {
                policy::Role::Guest
            }
        }
    };
    Ok(json!({ "role": role, "user": user }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.register" => auth_register(state, &req.params),
        "auth.signIn" => auth_sign_in(state, &req.params),
        "auth.signOut" => auth_sign_out(state),
        "auth.currentUser" => auth_current_user(state),
        "auth.role" => auth_role(state),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
