use super::error::HandlerErr;
use super::types::AppState;
use crate::auth::{self, User};
use crate::model::DateKey;
use crate::store::SqliteStore;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn get_optional_bool(params: &serde_json::Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be boolean", key))),
    }
}

pub fn get_optional_usize(params: &serde_json::Value, key: &str) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a non-negative integer", key))),
    }
}

/// `null`/absent means none given; anything else must be an array of strings.
pub fn get_optional_str_array(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Vec<String>>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must contain strings", key)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(HandlerErr::new("bad_params", format!("{} must be an array", key))),
    }
}

pub fn get_optional_date(params: &serde_json::Value, key: &str) -> Result<Option<DateKey>, HandlerErr> {
    get_optional_str(params, key)
        .map(|raw| DateKey::parse(raw).map_err(HandlerErr::from))
        .transpose()
}

pub fn require_store(state: &AppState) -> Result<&SqliteStore, HandlerErr> {
    state
        .store
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn current_user(store: &SqliteStore) -> Result<Option<User>, HandlerErr> {
    auth::current_user(store.conn()).map_err(HandlerErr::from)
}
