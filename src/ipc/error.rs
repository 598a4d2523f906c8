use crate::error::TrackerError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<TrackerError> for HandlerErr {
    fn from(e: TrackerError) -> Self {
        let details = match &e {
            // Callers send the user back to their own classes.
            TrackerError::NotOwner { .. } => Some(json!({ "redirect": "dashboard" })),
            TrackerError::NotSignedIn => Some(json!({ "redirect": "login" })),
            TrackerError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            _ => None,
        };
        HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<crate::store::StoreError> for HandlerErr {
    fn from(e: crate::store::StoreError) -> Self {
        TrackerError::from(e).into()
    }
}

/// Wrap a handler result into a response line.
pub fn reply(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}
