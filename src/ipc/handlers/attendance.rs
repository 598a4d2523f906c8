use crate::history;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{
    current_user, get_optional_bool, get_optional_date, get_optional_str, get_optional_str_array,
    get_required_str, require_store,
};
use crate::ipc::types::{AppState, AttendanceDraft, Request};
use crate::lifecycle;
use crate::model::{now_timestamp, AttendanceRecord, DateKey};
use crate::policy;
use crate::reconcile::{save_attendance, PresentSet, SaveError, SaveRequest};
use crate::roster::load_roster;
use crate::store::{paths, DocumentStore};
use serde_json::json;

fn draft_json(draft: &AttendanceDraft) -> serde_json::Value {
    json!({
        "classId": draft.class_id,
        "date": draft.date.as_str(),
        "present": draft.present.to_vec(),
        "presentCount": draft.present.len(),
    })
}

fn require_draft<'a>(
    state: &'a mut AppState,
    params: &serde_json::Value,
) -> Result<&'a mut AttendanceDraft, HandlerErr> {
    let draft = state
        .draft
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_draft", "open attendance for a class first"))?;
    if let Some(class_id) = get_optional_str(params, "classId") {
        if class_id != draft.class_id {
            return Err(HandlerErr::new(
                "bad_params",
                format!("open draft is for class {}", draft.class_id),
            ));
        }
    }
    Ok(draft)
}

fn attendance_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let date = get_optional_date(params, "date")?.unwrap_or_else(DateKey::today);
    let class = policy::require_owner(store, &class_id, current_user(store)?.as_ref())?;
    let students = load_roster(store, &class_id)?;

    let record = store
        .get(&paths::attendance_day(&class_id, date.as_str())?)?
        .map(|d| d.decode::<AttendanceRecord>())
        .transpose()?;
    let present = record
        .map(|r| PresentSet::from_ids(r.present))
        .unwrap_or_default();

    let draft = AttendanceDraft {
        class_id,
        date,
        present,
    };
    let mut result = draft_json(&draft);
    result["className"] = json!(class.name);
    result["students"] = json!(students);
    state.draft = Some(draft);
    Ok(result)
}

fn attendance_toggle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let draft = require_draft(state, params)?;
    let present = draft.present.toggle(&student_id);
    let mut result = draft_json(draft);
    result["studentId"] = json!(student_id);
    result["isPresent"] = json!(present);
    Ok(result)
}

fn attendance_mark_all(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = require_draft(state, params)?.class_id.clone();
    let roster = load_roster(require_store(state)?, &class_id)?;
    let draft = require_draft(state, params)?;
    draft.present.mark_all_present(&roster);
    Ok(draft_json(draft))
}

fn attendance_clear_all(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let draft = require_draft(state, params)?;
    draft.present.clear_all();
    Ok(draft_json(draft))
}

fn save_failed(e: SaveError, atomic: bool) -> HandlerErr {
    let (attendance_written, summaries_written) = if atomic {
        (false, 0)
    } else {
        (e.attendance_written, e.summaries_written)
    };
    HandlerErr {
        code: "save_failed",
        message: format!("Save failed: {}", e.source),
        details: Some(json!({
            "status": "Save failed",
            "attendanceWritten": attendance_written,
            "summariesWritten": summaries_written,
        })),
    }
}

fn attendance_save(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let draft = state.draft.as_ref();

    let class_id = match get_optional_str(params, "classId") {
        Some(id) => id.to_string(),
        None => draft
            .map(|d| d.class_id.clone())
            .ok_or_else(|| HandlerErr::new("bad_params", "missing classId"))?,
    };
    let same_draft = draft.filter(|d| d.class_id == class_id);
    let date = match get_optional_date(params, "date")? {
        Some(d) => d,
        None => same_draft
            .map(|d| d.date.clone())
            .unwrap_or_else(DateKey::today),
    };
    let present = match get_optional_str_array(params, "present")? {
        Some(ids) => PresentSet::from_ids(ids),
        None => same_draft
            .filter(|d| d.date == date)
            .map(|d| d.present.clone())
            .ok_or_else(|| HandlerErr::new("bad_params", "missing present"))?,
    };
    let atomic = get_optional_bool(params, "atomic")?.unwrap_or(false);

    let user = current_user(store)?;
    let user = policy::require_signed_in(user.as_ref())?;
    policy::require_owner(store, &class_id, Some(user))?;
    let roster = load_roster(store, &class_id)?;
    let now = now_timestamp();
    let request = SaveRequest {
        class_id: &class_id,
        date: &date,
        teacher_id: &user.uid,
        roster: &roster,
        present: &present,
    };

    let outcome = if atomic {
        store.batch(|s| save_attendance(s, &request, &now))
    } else {
        save_attendance(store, &request, &now)
    };
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!(
                class_id = %class_id,
                date = %date,
                atomic,
                attendance_written = e.attendance_written,
                summaries_written = e.summaries_written,
                error = %e,
                "attendance save failed"
            );
            return Err(save_failed(e, atomic));
        }
    };

    let result = json!({
        "status": report.status(),
        "classId": class_id,
        "date": date.as_str(),
        "summariesWritten": report.summaries_written,
        "presentCount": present.len(),
    });
    state.draft = Some(AttendanceDraft {
        class_id,
        date,
        present,
    });
    Ok(result)
}

fn attendance_day(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let class_id = get_required_str(params, "classId")?;
    let date = get_optional_date(params, "date")?
        .ok_or_else(|| HandlerErr::new("bad_params", "missing date"))?;
    let class = lifecycle::get_class(store, &class_id)?;
    let roster = load_roster(store, &class_id)?;
    let view = history::day_view(store, &class_id, &date, &roster)?;
    Ok(json!({
        "classId": class_id,
        "className": class.name,
        "day": view,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.open" => attendance_open(state, &req.params),
        "attendance.toggle" => attendance_toggle(state, &req.params),
        "attendance.markAllPresent" => attendance_mark_all(state, &req.params),
        "attendance.clearAll" => attendance_clear_all(state, &req.params),
        "attendance.save" => attendance_save(state, &req.params),
        "attendance.day" => attendance_day(state, &req.params),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
