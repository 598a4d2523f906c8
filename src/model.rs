//! Document shapes stored under `classes/...`.
//!
//! Field names are camelCase on disk. Counters and optional fields default
//! when a document is missing them, so partially written documents still
//! decode.

use crate::error::{Result, TrackerError};
use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// RFC 3339 UTC timestamp used for `createdAt`/`updatedAt`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Unwrap a `json!({...})` literal into document fields.
pub fn fields(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/// A calendar day as `YYYY-MM-DD`; also the attendance document key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(String);

impl DateKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let t = raw.trim();
        let parsed = NaiveDate::parse_from_str(t, "%Y-%m-%d")
            .map_err(|_| TrackerError::invalid(format!("date must be YYYY-MM-DD: {}", raw)))?;
        let key = Self::from_date(parsed);
        if key.0 != t {
            return Err(TrackerError::invalid(format!(
                "date must be zero-padded YYYY-MM-DD: {}",
                raw
            )));
        }
        Ok(key)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    /// The submitting machine's local calendar day, not UTC.
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DateKey {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self> {
        DateKey::parse(&value)
    }
}

impl From<DateKey> for String {
    fn from(value: DateKey) -> Self {
        value.0
    }
}

impl std::fmt::Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub teacher_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub total_students: i64,
    #[serde(default)]
    pub total_working_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Document key; the same value as `date`.
    pub id: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub present: Vec<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub total_students: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastStatus {
    Present,
    Absent,
}

impl LastStatus {
    pub fn from_present(is_present: bool) -> Self {
        if is_present {
            LastStatus::Present
        } else {
            LastStatus::Absent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentSummary {
    /// Document key: the student id.
    pub id: String,
    pub name: Option<String>,
    pub roll: Option<String>,
    pub present: u32,
    pub absent: u32,
    pub total: u32,
    pub percent: f64,
    pub last_status: Option<LastStatus>,
    pub last_date: Option<String>,
    pub updated_at: Option<String>,
}
