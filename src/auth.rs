//! Local email/password accounts and the persisted signed-in session.

use crate::error::{Result, TrackerError};
use crate::model::now_timestamp;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub uid: String,
    pub email: String,
}

fn db_err(e: rusqlite::Error) -> TrackerError {
    TrackerError::Store(e.into())
}

pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(TrackerError::invalid("email must not be empty"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(TrackerError::invalid("email is too long"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(TrackerError::invalid("email must contain @"));
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(TrackerError::invalid("email is malformed"));
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(TrackerError::invalid("email is malformed"));
    }
    Ok(email)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn register(conn: &Connection, email: &str, password: &str) -> Result<User> {
    let email = normalize_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(TrackerError::invalid(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let taken = conn
        .query_row("SELECT 1 FROM accounts WHERE email = ?", [&email], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(db_err)?
        .is_some();
    if taken {
        return Err(TrackerError::Auth("email already registered".to_string()));
    }

    let uid = Uuid::new_v4().simple().to_string();
    let salt = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO accounts(uid, email, salt, password_hash, created_at) VALUES(?, ?, ?, ?, ?)",
        (&uid, &email, &salt, hash_password(&salt, password), now_timestamp()),
    )
    .map_err(db_err)?;
    tracing::info!(uid = %uid, "account registered");
    Ok(User { uid, email })
}

pub fn sign_in(conn: &Connection, email: &str, password: &str) -> Result<User> {
    let email = normalize_email(email)?;
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT uid, salt, password_hash FROM accounts WHERE email = ?",
            [&email],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(db_err)?;
    let Some((uid, salt, stored)) = row else {
        return Err(TrackerError::Auth("invalid email or password".to_string()));
    };
    if hash_password(&salt, password) != stored {
        tracing::warn!(uid = %uid, "sign-in rejected");
        return Err(TrackerError::Auth("invalid email or password".to_string()));
    }
    conn.execute(
        "INSERT INTO session(slot, uid, signed_in_at) VALUES(1, ?, ?)
         ON CONFLICT(slot) DO UPDATE SET uid = excluded.uid, signed_in_at = excluded.signed_in_at",
        (&uid, now_timestamp()),
    )
    .map_err(db_err)?;
    tracing::info!(uid = %uid, "signed in");
    Ok(User { uid, email })
}

pub fn sign_out(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM session", []).map_err(db_err)?;
    Ok(())
}

pub fn current_user(conn: &Connection) -> Result<Option<User>> {
    conn.query_row(
        "SELECT a.uid, a.email FROM session s JOIN accounts a ON a.uid = s.uid WHERE s.slot = 1",
        [],
        |r| {
            Ok(User {
                uid: r.get(0)?,
                email: r.get(1)?,
            })
        },
    )
    .optional()
    .map_err(db_err)
}
