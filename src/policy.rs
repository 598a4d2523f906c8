//! Who may mutate what. Checked at the request boundary; the store itself
//! accepts any write.

use crate::auth::User;
use crate::error::{Result, TrackerError};
use crate::lifecycle::get_class;
use crate::model::Class;
use crate::store::{paths, DocumentStore, Query};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Teacher,
    Student,
}

pub fn require_signed_in(user: Option<&User>) -> Result<&User> {
    user.ok_or(TrackerError::NotSignedIn)
}

/// Load the class and confirm `user` owns it.
pub fn require_owner<S: DocumentStore + ?Sized>(
    store: &S,
    class_id: &str,
    user: Option<&User>,
) -> Result<Class> {
    let user = require_signed_in(user)?;
    let class = get_class(store, class_id)?;
    if class.teacher_id != user.uid {
        tracing::debug!(class_id, uid = %user.uid, "ownership check failed");
        return Err(TrackerError::NotOwner {
            class_id: class_id.to_string(),
        });
    }
    Ok(class)
}

/// Signed-in users owning at least one class are teachers.
pub fn role_of<S: DocumentStore + ?Sized>(store: &S, user: Option<&User>) -> Result<Role> {
    let Some(user) = user else {
        return Ok(Role::Guest);
    };
    let owned = Query::new(paths::classes())
        .where_eq("teacherId", user.uid.as_str())
        .limit(1)
        .run(store)?;
    Ok(if owned.is_empty() {
        Role::Student
    } else {
        Role::Teacher
    })
}
