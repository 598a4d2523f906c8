//! Live snapshots pushed after writes touch a watched collection.

use crate::error::TrackerError;
use crate::lifecycle;
use crate::model::{AttendanceRecord, DateKey, StudentSummary};
use crate::presenter;
use crate::roster::load_roster;
use crate::store::{paths, CollectionPath, DocumentStore, SqliteStore, StoreResult};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    Roster { class_id: String },
    Attendance { class_id: String, date: DateKey },
    Summaries { class_id: String },
    TeacherClasses { teacher_id: String },
}

impl WatchTarget {
    fn collection(&self) -> StoreResult<CollectionPath> {
        match self {
            WatchTarget::Roster { class_id } => paths::students(class_id),
            WatchTarget::Attendance { class_id, .. } => paths::attendance(class_id),
            WatchTarget::Summaries { class_id } => paths::summaries(class_id),
            WatchTarget::TeacherClasses { .. } => Ok(paths::classes()),
        }
    }

    fn event_name(&self) -> &'static str {
        match self {
            WatchTarget::Roster { .. } => "roster.changed",
            WatchTarget::Attendance { .. } => "attendance.changed",
            WatchTarget::Summaries { .. } => "summaries.changed",
            WatchTarget::TeacherClasses { .. } => "classes.changed",
        }
    }

    pub fn snapshot<S: DocumentStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<serde_json::Value, TrackerError> {
        match self {
            WatchTarget::Roster { class_id } => roster_snapshot(store, class_id),
            WatchTarget::Attendance { class_id, date } => {
                let record = store
                    .get(&paths::attendance_day(class_id, date.as_str())?)?
                    .map(|d| d.decode::<AttendanceRecord>())
                    .transpose()?;
                Ok(json!({
                    "classId": class_id,
                    "date": date.as_str(),
                    "exists": record.is_some(),
                    "present": record.map(|r| r.present).unwrap_or_default(),
                }))
            }
            WatchTarget::Summaries { class_id } => {
                let mut by_student = serde_json::Map::new();
                for doc in store.list(&paths::summaries(class_id)?)? {
                    let summary: StudentSummary = doc.decode()?;
                    let display = presenter::display(Some(&summary));
                    by_student.insert(
                        doc.id.clone(),
                        json!({ "summary": summary, "display": display }),
                    );
                }
                Ok(json!({ "classId": class_id, "summaries": by_student }))
            }
            WatchTarget::TeacherClasses { teacher_id } => {
                let classes = lifecycle::list_classes(store, Some(teacher_id))?;
                Ok(json!({ "classes": classes }))
            }
        }
    }
}

pub fn roster_snapshot<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
) -> Result<serde_json::Value, TrackerError> {
    let students = load_roster(store, class_id)?;
    Ok(json!({ "classId": class_id, "students": students }))
}

#[derive(Default)]
pub struct WatchRegistry {
    next_id: u64,
    watches: BTreeMap<String, WatchTarget>,
}

impl WatchRegistry {
    pub fn add(&mut self, target: WatchTarget) -> String {
        self.next_id += 1;
        let id = format!("w{}", self.next_id);
        self.watches.insert(id.clone(), target);
        id
    }

    pub fn cancel(&mut self, id: &str) -> bool {
        self.watches.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// Events for every watch whose collection was written since the last
    /// drain.
    pub fn drain_events(&self, store: &SqliteStore) -> Vec<serde_json::Value> {
        let changed = store.take_changes();
        if changed.is_empty() || self.watches.is_empty() {
            return Vec::new();
        }
        let mut events = Vec::new();
        for (id, target) in &self.watches {
            let touched = match target.collection() {
                Ok(col) => changed.contains(&col),
                Err(_) => false,
            };
            if !touched {
                continue;
            }
            match target.snapshot(store) {
                Ok(data) => events.push(json!({
                    "event": target.event_name(),
                    "subscriptionId": id,
                    "data": data,
                })),
                Err(e) => {
                    tracing::warn!(subscription_id = %id, error = %e, "watch snapshot failed");
                }
            }
        }
        events
    }
}
