use crate::error::Result;
use crate::model::Student;
use crate::store::{paths, Direction, DocumentStore, Query};

/// Students of a class ordered by `rollNo` as strings, so "10" sorts
/// before "2". Students without a roll number are not listed.
pub fn load_roster<S: DocumentStore + ?Sized>(store: &S, class_id: &str) -> Result<Vec<Student>> {
    let docs = Query::new(paths::students(class_id)?)
        .order_by("rollNo", Direction::Asc)
        .run(store)?;
    docs.iter()
        .map(|d| d.decode::<Student>().map_err(Into::into))
        .collect()
}
