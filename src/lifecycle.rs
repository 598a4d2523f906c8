//! Class and student create/edit/delete.

use crate::error::{Result, TrackerError};
use crate::model::{fields, now_timestamp, Class};
use crate::store::{paths, CollectionPath, DocumentStore, Query, WriteMode};
use serde::Serialize;
use serde_json::json;

pub fn get_class<S: DocumentStore + ?Sized>(store: &S, class_id: &str) -> Result<Class> {
    let doc = store
        .get(&paths::class(class_id)?)?
        .ok_or_else(|| TrackerError::NotFound {
            entity: "class",
            id: class_id.to_string(),
        })?;
    Ok(doc.decode()?)
}

/// All classes, or only those owned by `teacher_id`, by name.
pub fn list_classes<S: DocumentStore + ?Sized>(
    store: &S,
    teacher_id: Option<&str>,
) -> Result<Vec<Class>> {
    let mut q = Query::new(paths::classes());
    if let Some(t) = teacher_id {
        q = q.where_eq("teacherId", t);
    }
    let mut classes = q
        .run(store)?
        .iter()
        .map(|d| d.decode::<Class>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    classes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(classes)
}

fn required(value: &str, what: &str) -> Result<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(TrackerError::invalid(format!("{} must not be empty", what)));
    }
    Ok(t.to_string())
}

pub fn create_class<S: DocumentStore + ?Sized>(
    store: &S,
    teacher_id: &str,
    name: &str,
    subject: Option<&str>,
) -> Result<String> {
    let name = required(name, "name")?;
    let subject = subject.map(str::trim).unwrap_or("");
    let id = store.add(
        &paths::classes(),
        fields(json!({
            "name": name,
            "subject": subject,
            "teacherId": teacher_id,
            "createdAt": now_timestamp(),
            "totalStudents": 0,
            "totalWorkingDays": 0,
        })),
    )?;
    tracing::info!(class_id = %id, teacher_id, "class created");
    Ok(id)
}

pub fn update_class<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
    name: &str,
    subject: Option<&str>,
) -> Result<()> {
    let name = required(name, "name")?;
    let path = paths::class(class_id)?;
    if store.get(&path)?.is_none() {
        return Err(TrackerError::NotFound {
            entity: "class",
            id: class_id.to_string(),
        });
    }
    store.set(
        &path,
        fields(json!({
            "name": name,
            "subject": subject.map(str::trim).unwrap_or(""),
            "updatedAt": now_timestamp(),
        })),
        WriteMode::Merge,
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub students: usize,
    pub summaries: usize,
    pub attendance: usize,
}

fn delete_collection<S: DocumentStore + ?Sized>(store: &S, col: &CollectionPath) -> Result<usize> {
    let mut n = 0;
    for doc in store.list(col)? {
        if store.delete(&col.doc(&doc.id)?)? {
            n += 1;
        }
    }
    Ok(n)
}

/// Delete a class and everything under it, one document at a time.
///
/// Not atomic: a failure leaves whatever was already deleted gone.
pub fn delete_class<S: DocumentStore + ?Sized>(store: &S, class_id: &str) -> Result<CascadeReport> {
    let report = CascadeReport {
        students: delete_collection(store, &paths::students(class_id)?)?,
        summaries: delete_collection(store, &paths::summaries(class_id)?)?,
        attendance: delete_collection(store, &paths::attendance(class_id)?)?,
    };
    store.delete(&paths::class(class_id)?)?;
    tracing::info!(
        class_id,
        students = report.students,
        summaries = report.summaries,
        attendance = report.attendance,
        "class deleted"
    );
    Ok(report)
}

pub fn add_student<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
    name: &str,
    roll_no: &str,
) -> Result<String> {
    let name = required(name, "name")?;
    let roll_no = required(roll_no, "rollNo")?;
    let id = store.add(
        &paths::students(class_id)?,
        fields(json!({
            "name": name,
            "rollNo": roll_no,
            "createdAt": now_timestamp(),
        })),
    )?;
    Ok(id)
}

/// Removes the student and their summary. Attendance records that list the
/// student keep the stale id.
pub fn delete_student<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
    student_id: &str,
) -> Result<bool> {
    let removed = store.delete(&paths::student(class_id, student_id)?)?;
    store.delete(&paths::summary(class_id, student_id)?)?;
    Ok(removed)
}
