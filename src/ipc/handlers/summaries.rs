use crate::history::{self, MonthFilter, DEFAULT_TOP};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_optional_usize, get_required_str, require_store};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle;
use crate::model::StudentSummary;
use crate::presenter;
use crate::roster::load_roster;
use crate::store::{paths, DocumentStore};
use serde_json::json;

fn summaries_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let class = lifecycle::get_class(store, &class_id)?;
    let mut rows = Vec::new();
    for student in load_roster(store, &class_id)? {
        let summary = store
            .get(&paths::summary(&class_id, &student.id)?)?
            .map(|d| d.decode::<StudentSummary>())
            .transpose()?;
        let display = presenter::display(summary.as_ref());
        rows.push(json!({
            "studentId": student.id,
            "name": student.name,
            "rollNo": student.roll_no,
            "summary": summary,
            "display": display,
        }));
    }
    Ok(json!({
        "classId": class_id,
        "className": class.name,
        "totalWorkingDays": class.total_working_days,
        "students": rows,
    }))
}

fn summaries_top(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let limit = get_optional_usize(params, "limit")?.unwrap_or(DEFAULT_TOP);
    let top: Vec<serde_json::Value> = history::top_summaries(store, &class_id, limit)?
        .into_iter()
        .map(|s| {
            let display = presenter::display(Some(&s));
            json!({ "summary": s, "display": display })
        })
        .collect();
    Ok(json!({ "classId": class_id, "top": top }))
}

fn history_days(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let filter = MonthFilter::parse(get_optional_str(params, "month"))?;
    let listing = history::list_days(store, &class_id, &filter)?;
    Ok(json!({
        "classId": class_id,
        "days": listing.days,
        "monthOptions": listing.month_options,
        "totalDays": listing.total_days,
        "pageSize": history::PAGE_SIZE,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "summaries.list" => summaries_list(state, &req.params),
        "summaries.top" => summaries_top(state, &req.params),
        "history.days" => history_days(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
