use crate::error::Result;
use crate::schema::{NewRecord, Record};

/// Persistence for journal records.
///
/// `list` is newest first; `None` as owner means every record is visible.
pub trait RecordStore {
    /// Insert a record, assigning its id and creation time. Returns the new id.
    fn create(&self, owner_id: Option<&str>, record: &NewRecord) -> Result<i64>;

    fn list(&self, owner_id: Option<&str>) -> Result<Vec<Record>>;

    fn get(&self, id: i64) -> Result<Option<Record>>;

    /// Remove a record. Deleting a missing id is not an error.
    fn delete(&self, id: i64) -> Result<()>;
}
