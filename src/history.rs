//! Read-only views: past attendance days, a single day, top students.

use crate::error::{Result, TrackerError};
use crate::model::{AttendanceRecord, DateKey, Student, StudentSummary};
use crate::store::{paths, Direction, DocumentStore, Query};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Days shown when no month is selected.
pub const PAGE_SIZE: usize = 20;
pub const DEFAULT_TOP: usize = 4;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonthFilter {
    All,
    Month(String),
}

impl MonthFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let t = raw.map(str::trim).unwrap_or("all");
        if t.is_empty() || t == "all" {
            return Ok(MonthFilter::All);
        }
        NaiveDate::parse_from_str(&format!("{}-01", t), "%Y-%m-%d")
            .ok()
            .filter(|_| t.len() == 7)
            .ok_or_else(|| TrackerError::invalid(format!("month must be YYYY-MM or all: {}", t)))?;
        Ok(MonthFilter::Month(t.to_string()))
    }
}

/// "2026-02" -> "Feb 2026"; anything unparseable is returned as is.
pub fn month_label(month_key: &str) -> String {
    let Some((y, m)) = month_key.split_once('-') else {
        return month_key.to_string();
    };
    match m.parse::<usize>() {
        Ok(idx @ 1..=12) if !y.is_empty() => format!("{} {}", MONTHS[idx - 1], y),
        _ => month_key.to_string(),
    }
}

fn month_of(date_id: &str) -> Option<&str> {
    date_id.get(..7)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOption {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayListing {
    pub days: Vec<AttendanceRecord>,
    pub month_options: Vec<MonthOption>,
    pub total_days: usize,
}

/// Attendance days of a class, newest first.
pub fn list_days<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
    filter: &MonthFilter,
) -> Result<DayListing> {
    let mut days = store
        .list(&paths::attendance(class_id)?)?
        .iter()
        .map(|d| d.decode::<AttendanceRecord>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    days.sort_by(|a, b| b.id.cmp(&a.id));

    let months: BTreeSet<&str> = days.iter().filter_map(|d| month_of(&d.id)).collect();
    let month_options = months
        .into_iter()
        .rev()
        .map(|m| MonthOption {
            key: m.to_string(),
            label: month_label(m),
        })
        .collect();

    let total_days = days.len();
    let visible = match filter {
        MonthFilter::All => days.into_iter().take(PAGE_SIZE).collect(),
        MonthFilter::Month(m) => days
            .into_iter()
            .filter(|d| month_of(&d.id) == Some(m.as_str()))
            .collect(),
    };
    Ok(DayListing {
        days: visible,
        month_options,
        total_days,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEntry {
    pub student_id: String,
    pub name: String,
    pub roll_no: String,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayView {
    pub date: String,
    pub exists: bool,
    pub entries: Vec<DayEntry>,
    pub present_count: usize,
}

/// One date against the current roster. A missing record reads as nobody
/// present.
pub fn day_view<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
    date: &DateKey,
    roster: &[Student],
) -> Result<DayView> {
    let record = store
        .get(&paths::attendance_day(class_id, date.as_str())?)?
        .map(|d| d.decode::<AttendanceRecord>())
        .transpose()?;
    let present: HashSet<&str> = record
        .as_ref()
        .map(|r| r.present.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let entries: Vec<DayEntry> = roster
        .iter()
        .map(|s| DayEntry {
            student_id: s.id.clone(),
            name: s.name.clone(),
            roll_no: s.roll_no.clone(),
            present: present.contains(s.id.as_str()),
        })
        .collect();
    let present_count = entries.iter().filter(|e| e.present).count();
    Ok(DayView {
        date: date.to_string(),
        exists: record.is_some(),
        entries,
        present_count,
    })
}

/// Summaries by percent, highest first.
pub fn top_summaries<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
    limit: usize,
) -> Result<Vec<StudentSummary>> {
    Query::new(paths::summaries(class_id)?)
        .order_by("percent", Direction::Desc)
        .limit(limit)
        .run(store)?
        .iter()
        .map(|d| d.decode().map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::lifecycle::{add_student, create_class};
    use crate::model::fields;
    use crate::reconcile::{save_attendance, PresentSet, SaveRequest};
    use crate::roster::load_roster;
    use crate::store::{SqliteStore, WriteMode};
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::new(db::open_in_memory().unwrap())
    }

    fn seed_day(s: &SqliteStore, class_id: &str, date: &str) {
        s.set(
            &paths::attendance_day(class_id, date).unwrap(),
            fields(json!({ "date": date, "present": [], "totalStudents": 0 })),
            WriteMode::Merge,
        )
        .unwrap();
    }

    #[test]
    fn month_labels() {
        assert_eq!(month_label("2026-02"), "Feb 2026");
        assert_eq!(month_label("2025-12"), "Dec 2025");
        assert_eq!(month_label("2026-13"), "2026-13");
        assert_eq!(month_label("junk"), "junk");
    }

    #[test]
    fn month_filter_parsing() {
        assert_eq!(MonthFilter::parse(None).unwrap(), MonthFilter::All);
        assert_eq!(MonthFilter::parse(Some("all")).unwrap(), MonthFilter::All);
        assert_eq!(
            MonthFilter::parse(Some("2026-02")).unwrap(),
            MonthFilter::Month("2026-02".to_string())
        );
        assert!(MonthFilter::parse(Some("2026-2")).is_err());
        assert!(MonthFilter::parse(Some("2026-13")).is_err());
    }

    #[test]
    fn days_are_newest_first_and_paged() {
        let s = store();
        for day in 1..=25 {
            seed_day(&s, "c1", &format!("2026-01-{:02}", day));
        }
        seed_day(&s, "c1", "2026-02-02");
        seed_day(&s, "c1", "2025-12-15");

        let all = list_days(&s, "c1", &MonthFilter::All).unwrap();
        assert_eq!(all.total_days, 27);
        assert_eq!(all.days.len(), PAGE_SIZE);
        assert_eq!(all.days[0].id, "2026-02-02");
        assert_eq!(all.days[1].id, "2026-01-25");
        let keys: Vec<&str> = all.month_options.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["2026-02", "2026-01", "2025-12"]);
        assert_eq!(all.month_options[0].label, "Feb 2026");

        let jan = list_days(&s, "c1", &MonthFilter::Month("2026-01".to_string())).unwrap();
        assert_eq!(jan.days.len(), 25);
        assert!(jan.days.iter().all(|d| d.id.starts_with("2026-01")));
    }

    #[test]
    fn day_view_marks_roster_against_record() {
        let s = store();
        let class_id = create_class(&s, "t1", "7B", None).unwrap();
        let a = add_student(&s, &class_id, "Ana", "1").unwrap();
        add_student(&s, &class_id, "Ben", "2").unwrap();
        let roster = load_roster(&s, &class_id).unwrap();
        let date = DateKey::parse("2026-02-03").unwrap();

        let empty = day_view(&s, &class_id, &date, &roster).unwrap();
        assert!(!empty.exists);
        assert_eq!(empty.present_count, 0);

        save_attendance(
            &s,
            &SaveRequest {
                class_id: &class_id,
                date: &date,
                teacher_id: "t1",
                roster: &roster,
                present: &PresentSet::from_ids([a.clone()]),
            },
            "2026-02-03T08:00:00.000Z",
        )
        .unwrap();
        let view = day_view(&s, &class_id, &date, &roster).unwrap();
        assert!(view.exists);
        assert_eq!(view.present_count, 1);
        assert!(view.entries[0].present);
        assert_eq!(view.entries[0].student_id, a);
        assert!(!view.entries[1].present);
    }

    #[test]
    fn top_summaries_order_by_percent() {
        let s = store();
        let class_id = create_class(&s, "t1", "7B", None).unwrap();
        for (name, roll) in [("Ana", "1"), ("Ben", "2"), ("Cy", "3")] {
            add_student(&s, &class_id, name, roll).unwrap();
        }
        let roster = load_roster(&s, &class_id).unwrap();
        for (day, idx) in [("2026-02-02", vec![0usize, 1]), ("2026-02-03", vec![0])] {
            let present = PresentSet::from_ids(idx.iter().map(|i| roster[*i].id.clone()));
            save_attendance(
                &s,
                &SaveRequest {
                    class_id: &class_id,
                    date: &DateKey::parse(day).unwrap(),
                    teacher_id: "t1",
                    roster: &roster,
                    present: &present,
                },
                "2026-02-03T08:00:00.000Z",
            )
            .unwrap();
        }
        let top = top_summaries(&s, &class_id, 2).unwrap();
        let names: Vec<&str> = top.iter().filter_map(|t| t.name.as_deref()).collect();
        assert_eq!(names, vec!["Ana", "Ben"]);
        assert_eq!(top_summaries(&s, &class_id, DEFAULT_TOP).unwrap().len(), 3);
    }
}
