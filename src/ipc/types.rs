use std::path::PathBuf;

use serde::Deserialize;

use super::watch::WatchRegistry;
use crate::model::DateKey;
use crate::reconcile::PresentSet;
use crate::store::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The present-set being edited for one class/date before it is saved.
#[derive(Debug, Clone)]
pub struct AttendanceDraft {
    pub class_id: String,
    pub date: DateKey,
    pub present: PresentSet,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub draft: Option<AttendanceDraft>,
    pub watches: WatchRegistry,
}
