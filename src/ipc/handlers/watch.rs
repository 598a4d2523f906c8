use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{current_user, get_optional_date, get_required_str, require_store};
use crate::ipc::types::{AppState, Request};
use crate::ipc::watch::WatchTarget;
use crate::policy;
use serde_json::json;

fn subscribe(state: &mut AppState, target: WatchTarget) -> Result<serde_json::Value, HandlerErr> {
    let snapshot = target.snapshot(require_store(state)?)?;
    let id = state.watches.add(target);
    tracing::debug!(subscription_id = %id, "watch added");
    Ok(json!({ "subscriptionId": id, "snapshot": snapshot }))
}

fn target_for(
    state: &AppState,
    method: &str,
    params: &serde_json::Value,
) -> Result<WatchTarget, HandlerErr> {
    if method == "watch.classes" {
        let store = require_store(state)?;
        let user = current_user(store)?;
        let user = policy::require_signed_in(user.as_ref())?;
        return Ok(WatchTarget::TeacherClasses {
            teacher_id: user.uid.clone(),
        });
    }
    let class_id = get_required_str(params, "classId")?;
    match method {
        "watch.roster" => Ok(WatchTarget::Roster { class_id }),
        "watch.summaries" => Ok(WatchTarget::Summaries { class_id }),
        _ => {
            let date = get_optional_date(params, "date")?
                .ok_or_else(|| HandlerErr::new("bad_params", "missing date"))?;
            Ok(WatchTarget::Attendance { class_id, date })
        }
    }
}

fn watch_cancel(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let id = get_required_str(params, "subscriptionId")?;
    Ok(json!({ "cancelled": state.watches.cancel(&id) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "watch.roster" | "watch.attendance" | "watch.summaries" | "watch.classes" => {
            target_for(state, &req.method, &req.params).and_then(|t| subscribe(state, t))
        }
        "watch.cancel" => watch_cancel(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
