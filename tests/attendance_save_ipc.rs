mod test_support;

use serde_json::json;
use std::io::{BufReader, Write};
use std::path::Path;
use std::process::{ChildStdin, ChildStdout};
use test_support::{read_line_json, request_err, request_ok, sign_up, spawn_sidecar, temp_dir};

fn summary_of(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    class_id: &str,
    student_id: &str,
) -> serde_json::Value {
    let list = request_ok(stdin, reader, id, "summaries.list", json!({ "classId": class_id }));
    list.get("students")
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .find(|row| row.get("studentId").and_then(|v| v.as_str()) == Some(student_id))
        .and_then(|row| row.get("summary").cloned())
        .expect("student row")
}

fn counts(summary: &serde_json::Value) -> (u64, u64, u64, f64) {
    (
        summary["present"].as_u64().expect("present"),
        summary["absent"].as_u64().expect("absent"),
        summary["total"].as_u64().expect("total"),
        summary["percent"].as_f64().expect("percent"),
    )
}

fn add_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    class_id: &str,
    name: &str,
    roll: &str,
) -> String {
    request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({ "classId": class_id, "name": name, "rollNo": roll }),
    )
    .get("studentId")
    .and_then(|v| v.as_str())
    .expect("studentId")
    .to_string()
}

#[test]
fn first_touch_edit_and_new_day_over_ipc() {
    let workspace = temp_dir("rollcall-attendance-save");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(&mut stdin, &mut reader, "2", "teacher@school.org");
    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "name": "7B", "subject": "Maths" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let s1 = add_student(&mut stdin, &mut reader, "4", &class_id, "Ana", "1");
    let s2 = add_student(&mut stdin, &mut reader, "5", &class_id, "Ben", "2");

    // Day one, first touch.
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.save",
        json!({ "classId": class_id, "date": "2026-02-02", "present": [s1] }),
    );
    assert_eq!(saved["status"], "Saved");
    assert_eq!(saved["summariesWritten"], 2);
    let day = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.day",
        json!({ "classId": class_id, "date": "2026-02-02" }),
    );
    assert_eq!(day["day"]["exists"], true);
    assert_eq!(day["day"]["presentCount"], 1);
    assert_eq!(counts(&summary_of(&mut stdin, &mut reader, "8", &class_id, &s1)), (1, 0, 1, 100.0));
    assert_eq!(counts(&summary_of(&mut stdin, &mut reader, "9", &class_id, &s2)), (0, 1, 1, 0.0));

    // Same day edit keeps totals.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.save",
        json!({ "classId": class_id, "date": "2026-02-02", "present": [s2] }),
    );
    assert_eq!(counts(&summary_of(&mut stdin, &mut reader, "11", &class_id, &s1)), (0, 1, 1, 0.0));
    assert_eq!(counts(&summary_of(&mut stdin, &mut reader, "12", &class_id, &s2)), (1, 0, 1, 100.0));

    // A late joiner is counted from their first save only.
    let s3 = add_student(&mut stdin, &mut reader, "13", &class_id, "Cy", "3");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2026-02-03",
            "present": [s1, s2, s3],
            "atomic": true
        }),
    );
    assert_eq!(counts(&summary_of(&mut stdin, &mut reader, "15", &class_id, &s1)), (1, 1, 2, 50.0));
    assert_eq!(counts(&summary_of(&mut stdin, &mut reader, "16", &class_id, &s2)), (2, 0, 2, 100.0));
    let late = summary_of(&mut stdin, &mut reader, "17", &class_id, &s3);
    assert_eq!(counts(&late), (1, 0, 1, 100.0));
    assert_eq!(late["lastStatus"], "present");
    assert_eq!(late["lastDate"], "2026-02-03");

    let top = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "summaries.top",
        json!({ "classId": class_id, "limit": 2 }),
    );
    let top = top["top"].as_array().expect("top");
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["summary"]["percent"], 100.0);
    assert_eq!(top[0]["display"]["label"], "100%");

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "history.days",
        json!({ "classId": class_id }),
    );
    assert_eq!(history["totalDays"], 2);
    assert_eq!(history["days"][0]["id"], "2026-02-03");
    assert_eq!(history["monthOptions"][0]["label"], "Feb 2026");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn draft_edits_feed_the_save() {
    let workspace = temp_dir("rollcall-attendance-draft");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(&mut stdin, &mut reader, "2", "teacher@school.org");
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.toggle",
        json!({ "studentId": "nobody" }),
        "no_draft",
    );
    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({ "name": "8A" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let s1 = add_student(&mut stdin, &mut reader, "5", &class_id, "Ana", "1");
    let s2 = add_student(&mut stdin, &mut reader, "6", &class_id, "Ben", "2");

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-03-10" }),
    );
    assert_eq!(opened["className"], "8A");
    assert_eq!(opened["presentCount"], 0);
    assert_eq!(opened["students"].as_array().map(|a| a.len()), Some(2));

    let all = request_ok(&mut stdin, &mut reader, "8", "attendance.markAllPresent", json!({}));
    assert_eq!(all["presentCount"], 2);
    let cleared = request_ok(&mut stdin, &mut reader, "9", "attendance.clearAll", json!({}));
    assert_eq!(cleared["presentCount"], 0);
    let toggled = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.toggle",
        json!({ "studentId": s2 }),
    );
    assert_eq!(toggled["isPresent"], true);

    let saved = request_ok(&mut stdin, &mut reader, "11", "attendance.save", json!({}));
    assert_eq!(saved["status"], "Saved");
    assert_eq!(saved["date"], "2026-03-10");

    // Reopening loads the stored present set.
    let reopened = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-03-10" }),
    );
    assert_eq!(reopened["present"], json!([s2]));
    let day = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "attendance.day",
        json!({ "classId": class_id, "date": "2026-03-10" }),
    );
    let entries = day["day"]["entries"].as_array().expect("entries");
    assert_eq!(entries[0]["studentId"], s1.as_str());
    assert_eq!(entries[0]["present"], false);
    assert_eq!(entries[1]["present"], true);

    let _ = request_err(
        &mut stdin,
        &mut reader,
        "14",
        "attendance.save",
        json!({ "classId": class_id, "date": "2026-3-10", "present": [] }),
        "bad_params",
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn only_the_class_owner_may_take_attendance() {
    let workspace = temp_dir("rollcall-attendance-owner");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(&mut stdin, &mut reader, "2", "owner@school.org");
    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "name": "9C" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();

    let _ = request_ok(&mut stdin, &mut reader, "4", "auth.signOut", json!({}));
    let err = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.open",
        json!({ "classId": class_id }),
        "not_signed_in",
    );
    assert_eq!(err["details"]["redirect"], "login");

    let _ = sign_up(&mut stdin, &mut reader, "6", "other@school.org");
    let err = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.save",
        json!({ "classId": class_id, "date": "2026-02-02", "present": [] }),
        "not_owner",
    );
    assert_eq!(err["details"]["redirect"], "dashboard");
    let role = request_ok(&mut stdin, &mut reader, "8", "auth.role", json!({}));
    assert_eq!(role["role"], "student");

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "history.days",
        json!({ "classId": class_id }),
    );
    assert_eq!(history["totalDays"], 0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

/// Makes every summary write for `student_id` fail inside SQLite.
fn block_summary_writes(workspace: &Path, student_id: &str) {
    let conn = rusqlite::Connection::open(workspace.join("rollcall.sqlite3")).expect("open db");
    for event in ["INSERT", "UPDATE"] {
        conn.execute_batch(&format!(
            "CREATE TRIGGER block_summary_{event} BEFORE {event} ON documents
             WHEN NEW.collection LIKE '%/summaries' AND NEW.doc_id = '{student_id}'
             BEGIN SELECT RAISE(ABORT, 'summary write blocked'); END;"
        ))
        .expect("create trigger");
    }
}

#[test]
fn failed_saves_report_progress() {
    let workspace = temp_dir("rollcall-attendance-failure");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(&mut stdin, &mut reader, "2", "teacher@school.org");
    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "name": "7B" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let s1 = add_student(&mut stdin, &mut reader, "4", &class_id, "Ana", "1");
    let s2 = add_student(&mut stdin, &mut reader, "5", &class_id, "Ben", "2");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "watch.summaries",
        json!({ "classId": class_id }),
    );
    block_summary_writes(&workspace, &s2);

    // All-or-nothing: nothing lands and no watch fires.
    let err = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.save",
        json!({ "classId": class_id, "date": "2026-02-02", "present": [s1], "atomic": true }),
        "save_failed",
    );
    assert_eq!(err["details"]["status"], "Save failed");
    assert_eq!(err["details"]["attendanceWritten"], false);
    assert_eq!(err["details"]["summariesWritten"], 0);
    writeln!(stdin, "{}", json!({ "id": "8", "method": "health", "params": {} })).expect("write");
    stdin.flush().expect("flush");
    let next = read_line_json(&mut reader);
    assert_eq!(next["id"], "8", "unexpected line {}", next);
    let day = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.day",
        json!({ "classId": class_id, "date": "2026-02-02" }),
    );
    assert_eq!(day["day"]["exists"], false);

    // Sequential: the record and the first summary stay written.
    let err = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.save",
        json!({ "classId": class_id, "date": "2026-02-03", "present": [s1] }),
        "save_failed",
    );
    assert_eq!(err["details"]["attendanceWritten"], true);
    assert_eq!(err["details"]["summariesWritten"], 1);
    let event = read_line_json(&mut reader);
    assert_eq!(event["event"], "summaries.changed");
    let day = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "attendance.day",
        json!({ "classId": class_id, "date": "2026-02-03" }),
    );
    assert_eq!(day["day"]["exists"], true);
    assert_eq!(counts(&summary_of(&mut stdin, &mut reader, "12", &class_id, &s1)), (1, 0, 1, 100.0));
    let list = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "summaries.list",
        json!({ "classId": class_id }),
    );
    assert_eq!(list["students"][1]["summary"], serde_json::Value::Null);
    assert_eq!(list["students"][1]["display"]["label"], "—");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
