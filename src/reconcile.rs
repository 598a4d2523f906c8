//! Applies one day's present-set to the attendance record and to every
//! rostered student's running summary.
//!
//! A summary's `total` may grow by at most one per calendar date. Whether a
//! save is the first touch of a date or an edit of it is decided by
//! [`DayTouch::classify`] from the summary's own `lastDate`, so every counter
//! change has to go through [`save_attendance`].

use crate::model::{fields, DateKey, LastStatus, Student, StudentSummary};
use crate::store::{paths, DocumentStore, StoreError, WriteMode};
use serde_json::json;
use std::collections::BTreeSet;
use thiserror::Error;

/// Student ids marked present for one class/date while editing.
///
/// Membership is not checked against the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresentSet(BTreeSet<String>);

impl PresentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, student_id: &str) -> bool {
        self.0.contains(student_id)
    }

    /// Flip one student; returns whether they are now present.
    pub fn toggle(&mut self, student_id: &str) -> bool {
        if self.0.remove(student_id) {
            false
        } else {
            self.0.insert(student_id.to_string());
            true
        }
    }

    pub fn mark_all_present(&mut self, roster: &[Student]) {
        self.0 = roster.iter().map(|s| s.id.clone()).collect();
    }

    pub fn clear_all(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

/// Where a summary stands relative to the date being saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTouch {
    /// No save has ever reached this student.
    NeverTouched,
    /// The last save that reached this student was for this same date.
    TouchedToday,
    /// The last save was for some other date.
    TouchedEarlier,
}

impl DayTouch {
    pub fn classify(last_date: Option<&str>, date: &DateKey) -> Self {
        match last_date {
            None => DayTouch::NeverTouched,
            Some(d) if d == date.as_str() => DayTouch::TouchedToday,
            Some(_) => DayTouch::TouchedEarlier,
        }
    }

    pub fn is_first_touch(self) -> bool {
        !matches!(self, DayTouch::TouchedToday)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    pub present: u32,
    pub absent: u32,
    pub total: u32,
}

impl Tally {
    pub fn of(summary: &StudentSummary) -> Self {
        Self {
            present: summary.present,
            absent: summary.absent,
            total: summary.total,
        }
    }

    /// Counter transition for one student.
    ///
    /// | touch            | was → is          | effect                 |
    /// |------------------|-------------------|------------------------|
    /// | first touch      | any → present     | total+1, present+1     |
    /// | first touch      | any → absent      | total+1, absent+1      |
    /// | same day         | present → absent  | present−1, absent+1    |
    /// | same day         | absent → present  | absent−1, present+1    |
    /// | same day         | unchanged         | none                   |
    ///
    /// Decrements saturate at zero; a counter that would go negative means
    /// the summary was edited outside this path.
    pub fn apply(self, touch: DayTouch, was_present: bool, is_present: bool) -> Self {
        let mut next = self;
        if touch.is_first_touch() {
            next.total += 1;
            if is_present {
                next.present += 1;
            } else {
                next.absent += 1;
            }
            return next;
        }
        match (was_present, is_present) {
            (true, false) => {
                next.present = next.present.saturating_sub(1);
                next.absent += 1;
            }
            (false, true) => {
                next.absent = next.absent.saturating_sub(1);
                next.present += 1;
            }
            _ => {}
        }
        next
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * f64::from(self.present) / f64::from(self.total)
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.present + self.absent == self.total
    }
}

pub struct SaveRequest<'a> {
    pub class_id: &'a str,
    pub date: &'a DateKey,
    pub teacher_id: &'a str,
    pub roster: &'a [Student],
    pub present: &'a PresentSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub summaries_written: usize,
}

impl SaveReport {
    pub fn status(&self) -> &'static str {
        "Saved"
    }
}

/// A save that stopped part way; earlier writes stay applied unless the
/// caller ran it inside a batch.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SaveError {
    pub attendance_written: bool,
    pub summaries_written: usize,
    #[source]
    pub source: StoreError,
}

impl From<StoreError> for SaveError {
    fn from(source: StoreError) -> Self {
        SaveError {
            attendance_written: false,
            summaries_written: 0,
            source,
        }
    }
}

pub fn save_attendance<S: DocumentStore + ?Sized>(
    store: &S,
    req: &SaveRequest<'_>,
    now: &str,
) -> Result<SaveReport, SaveError> {
    let record_path = paths::attendance_day(req.class_id, req.date.as_str())?;
    let prev_present: BTreeSet<String> = store
        .get(&record_path)?
        .and_then(|doc| doc.data.get("present").and_then(|v| v.as_array()).cloned())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();

    store.set(
        &record_path,
        fields(json!({
            "present": req.present.to_vec(),
            "updatedAt": now,
            "teacherId": req.teacher_id,
            "date": req.date.as_str(),
            "totalStudents": req.roster.len(),
        })),
        WriteMode::Merge,
    )?;

    let mut written = 0usize;
    let abort = |written: usize, source: StoreError| SaveError {
        attendance_written: true,
        summaries_written: written,
        source,
    };

    for student in req.roster {
        let summary_path =
            paths::summary(req.class_id, &student.id).map_err(|e| abort(written, e))?;
        let summary: StudentSummary = match store.get(&summary_path) {
            Ok(Some(doc)) => doc.decode().map_err(|e| abort(written, e))?,
            Ok(None) => StudentSummary::default(),
            Err(e) => return Err(abort(written, e)),
        };

        let touch = DayTouch::classify(summary.last_date.as_deref(), req.date);
        if let (DayTouch::TouchedEarlier, Some(last)) = (touch, summary.last_date.as_deref()) {
            if last > req.date.as_str() {
                tracing::warn!(
                    class_id = req.class_id,
                    student_id = %student.id,
                    last_date = last,
                    date = %req.date,
                    "saving a date older than the summary's last date counts it again"
                );
            }
        }

        let was_present = prev_present.contains(&student.id);
        let is_present = req.present.contains(&student.id);
        let before = Tally::of(&summary);
        let after = before.apply(touch, was_present, is_present);
        if !after.is_consistent() {
            tracing::warn!(
                class_id = req.class_id,
                student_id = %student.id,
                present = after.present,
                absent = after.absent,
                total = after.total,
                "summary counters disagree with total"
            );
        }

        store
            .set(
                &summary_path,
                fields(json!({
                    "name": non_empty(&student.name),
                    "roll": non_empty(&student.roll_no),
                    "present": after.present,
                    "absent": after.absent,
                    "total": after.total,
                    "percent": after.percent(),
                    "lastStatus": LastStatus::from_present(is_present),
                    "lastDate": req.date.as_str(),
                    "updatedAt": now,
                })),
                WriteMode::Merge,
            )
            .map_err(|e| abort(written, e))?;
        written += 1;
    }

    tracing::info!(
        class_id = req.class_id,
        date = %req.date,
        present = req.present.len(),
        roster = req.roster.len(),
        summaries = written,
        "attendance saved"
    );
    Ok(SaveReport {
        summaries_written: written,
    })
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
