use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by tracker operations; `code()` is what goes on the wire.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("class {class_id} belongs to another teacher")]
    NotOwner { class_id: String },

    #[error("sign in first")]
    NotSignedIn,

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Auth(String),
}

impl TrackerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        TrackerError::Invalid(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::Store(StoreError::InvalidPath(_)) => "bad_params",
            TrackerError::Store(_) => "db_failed",
            TrackerError::NotFound { .. } => "not_found",
            TrackerError::NotOwner { .. } => "not_owner",
            TrackerError::NotSignedIn => "not_signed_in",
            TrackerError::Invalid(_) => "bad_params",
            TrackerError::Auth(_) => "auth_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
