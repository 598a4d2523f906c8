//! Hierarchical document store over the workspace SQLite file.
//!
//! Documents are JSON objects addressed by a collection path
//! (`classes`, `classes/{id}/students`, ...) plus a document id. Writes are
//! last-write-wins per document; nothing spans documents unless the caller
//! opts into [`SqliteStore::batch`].

use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("corrupt document {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Collection paths alternate collection/document segments and always
    /// end on a collection segment, so they have an odd segment count.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments: Vec<&str> = raw.split('/').collect();
        if segments.iter().any(|s| s.trim().is_empty()) || segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn doc(&self, id: &str) -> StoreResult<DocPath> {
        if id.trim().is_empty() || id.contains('/') {
            return Err(StoreError::InvalidPath(format!("{}/{}", self.0, id)));
        }
        Ok(DocPath {
            collection: self.clone(),
            id: id.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl DocPath {
    pub fn child(&self, name: &str) -> StoreResult<CollectionPath> {
        CollectionPath::parse(&format!("{}/{}/{}", self.collection.0, self.id, name))
    }
}

impl std::fmt::Display for DocPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection.0, self.id)
    }
}

/// Layout of the attendance tracker's collections.
pub mod paths {
    use super::{CollectionPath, DocPath, StoreResult};

    pub fn classes() -> CollectionPath {
        CollectionPath("classes".to_string())
    }

    pub fn class(class_id: &str) -> StoreResult<DocPath> {
        classes().doc(class_id)
    }

    pub fn students(class_id: &str) -> StoreResult<CollectionPath> {
        class(class_id)?.child("students")
    }

    pub fn student(class_id: &str, student_id: &str) -> StoreResult<DocPath> {
        students(class_id)?.doc(student_id)
    }

    pub fn attendance(class_id: &str) -> StoreResult<CollectionPath> {
        class(class_id)?.child("attendance")
    }

    pub fn attendance_day(class_id: &str, date: &str) -> StoreResult<DocPath> {
        attendance(class_id)?.doc(date)
    }

    pub fn summaries(class_id: &str) -> StoreResult<CollectionPath> {
        class(class_id)?.child("summaries")
    }

    pub fn summary(class_id: &str, student_id: &str) -> StoreResult<DocPath> {
        summaries(class_id)?.doc(student_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    /// Deserialize into a model, exposing the document key as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the whole document.
    Overwrite,
    /// Overlay the given top-level fields; other fields are left untouched.
    Merge,
}

pub trait DocumentStore {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>>;
    fn set(&self, path: &DocPath, data: Map<String, Value>, mode: WriteMode) -> StoreResult<()>;
    fn delete(&self, path: &DocPath) -> StoreResult<bool>;
    fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>>;

    /// Create a document under a fresh random id.
    fn add(&self, collection: &CollectionPath, data: Map<String, Value>) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.set(&collection.doc(&id)?, data, WriteMode::Overwrite)?;
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Filter/order/limit over one collection.
///
/// Ordering follows document-store semantics: documents that lack the
/// ordered field are left out of the result.
#[derive(Debug, Clone)]
pub struct Query {
    collection: CollectionPath,
    filters: Vec<(String, Value)>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn run<S: DocumentStore + ?Sized>(&self, store: &S) -> StoreResult<Vec<Document>> {
        let mut docs: Vec<Document> = store
            .list(&self.collection)?
            .into_iter()
            .filter(|d| {
                self.filters
                    .iter()
                    .all(|(field, want)| d.data.get(field) == Some(want))
            })
            .collect();
        if let Some((field, direction)) = &self.order {
            docs.retain(|d| d.data.get(field).is_some_and(|v| !v.is_null()));
            docs.sort_by(|a, b| {
                let ord = compare_values(&a.data[field], &b.data[field]).then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        if let Some(n) = self.limit {
            docs.truncate(n);
        }
        Ok(docs)
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

pub struct SqliteStore {
    conn: Connection,
    changes: RefCell<BTreeSet<CollectionPath>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            changes: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Collections written since the last call.
    pub fn take_changes(&self) -> BTreeSet<CollectionPath> {
        std::mem::take(&mut *self.changes.borrow_mut())
    }

    /// Run `f` inside one SQLite transaction; any error rolls every write back,
    /// change marks included.
    pub fn batch<T, E>(&self, f: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let marks_before = self.changes.borrow().clone();
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| E::from(StoreError::from(e)))?;
        let outcome = match f(self) {
            Ok(v) => tx.commit().map(|_| v).map_err(|e| E::from(StoreError::from(e))),
            Err(e) => {
                let _ = tx.rollback();
                Err(e)
            }
        };
        if outcome.is_err() {
            *self.changes.borrow_mut() = marks_before;
        }
        outcome
    }

    fn mark_changed(&self, collection: &CollectionPath) {
        self.changes.borrow_mut().insert(collection.clone());
    }

    fn parse_row(path: String, id: String, raw: String) -> StoreResult<Document> {
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(data) => Ok(Document { id, data }),
            _ => Err(StoreError::Corrupt {
                path: format!("{}/{}", path, id),
                reason: "document body is not an object".to_string(),
            }),
        }
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ? AND doc_id = ?",
                (path.collection.as_str(), &path.id),
                |r| r.get(0),
            )
            .optional()?;
        raw.map(|raw| Self::parse_row(path.collection.0.clone(), path.id.clone(), raw))
            .transpose()
    }

    fn set(&self, path: &DocPath, data: Map<String, Value>, mode: WriteMode) -> StoreResult<()> {
        let body = match mode {
            WriteMode::Overwrite => data,
            WriteMode::Merge => {
                let mut existing = self.get(path)?.map(|d| d.data).unwrap_or_default();
                existing.extend(data);
                existing
            }
        };
        let text = serde_json::to_string(&Value::Object(body))?;
        self.conn.execute(
            "INSERT INTO documents(collection, doc_id, data, updated_at)
             VALUES(?, ?, ?, datetime('now'))
             ON CONFLICT(collection, doc_id) DO UPDATE SET
               data = excluded.data,
               updated_at = excluded.updated_at",
            (path.collection.as_str(), &path.id, &text),
        )?;
        tracing::trace!(path = %path, ?mode, "document written");
        self.mark_changed(&path.collection);
        Ok(())
    }

    fn delete(&self, path: &DocPath) -> StoreResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM documents WHERE collection = ? AND doc_id = ?",
            (path.collection.as_str(), &path.id),
        )?;
        if n > 0 {
            tracing::trace!(path = %path, "document deleted");
            self.mark_changed(&path.collection);
        }
        Ok(n > 0)
    }

    fn list(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(
            "SELECT doc_id, data FROM documents WHERE collection = ? ORDER BY doc_id",
        )?;
        let rows = stmt
            .query_map([collection.as_str()], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, raw)| Self::parse_row(collection.0.clone(), id, raw))
            .collect()
    }
}
