use crate::error::{CoreError, Result};
use crate::schema::{NewRecord, Record};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use tracing::{debug, warn};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

const RECORD_COLUMNS: &str = "id, owner_id, created_at_ms, title, narrative, raw_input, media_url,
                              category_tags, mood_tags, rating, interpretation";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, apply PRAGMAs and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mut db = Self { conn };
        db.apply_pragmas()?;
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.apply_pragmas()?;
        db.run_migrations()?;
        Ok(db)
    }

    fn apply_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn run_migrations(&mut self) -> Result<()> {
        embedded::migrations::runner()
            .run(&mut self.conn)
            .map_err(|e| CoreError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Creation timestamp for a new row: now, but never earlier than the
    /// newest stored record so insertion order and time order agree.
    fn next_created_at_ms(&self) -> Result<i64> {
        let latest: Option<i64> =
            self.conn
                .query_row("SELECT MAX(created_at_ms) FROM records", [], |row| row.get(0))?;
        let now = Utc::now().timestamp_millis();
        Ok(latest.map_or(now, |latest| now.max(latest)))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let id: i64 = row.get(0)?;
    let created_at_ms: i64 = row.get(2)?;

    Ok(Record {
        id,
        owner_id: row.get(1)?,
        created_at: decode_timestamp(id, created_at_ms),
        title: row.get(3)?,
        narrative: row.get(4)?,
        raw_input: row.get(5)?,
        media_url: row.get(6)?,
        category_tags: decode_tags(id, "category_tags", &row.get::<_, String>(7)?),
        mood_tags: decode_tags(id, "mood_tags", &row.get::<_, String>(8)?),
        rating: row.get(9)?,
        interpretation: row.get(10)?,
    })
}

fn decode_timestamp(record_id: i64, created_at_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(created_at_ms).unwrap_or_else(|| {
        warn!(
            record_id,
            created_at_ms, "stored timestamp out of range, treating as unix epoch"
        );
        DateTime::UNIX_EPOCH
    })
}

fn decode_tags(record_id: i64, column: &str, raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(record_id, column, error = %e, "malformed stored tag list, treating as empty");
        Vec::new()
    })
}

impl RecordStore for Database {
    fn create(&self, owner_id: Option<&str>, record: &NewRecord) -> Result<i64> {
        let created_at_ms = self.next_created_at_ms()?;
        let category_tags = serde_json::to_string(&record.category_tags)?;
        let mood_tags = serde_json::to_string(&record.mood_tags)?;

        self.conn.execute(
            "INSERT INTO records (owner_id, created_at_ms, title, narrative, raw_input, media_url,
                                  category_tags, mood_tags, rating, interpretation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                owner_id,
                created_at_ms,
                record.title,
                record.narrative,
                record.raw_input,
                record.media_url,
                category_tags,
                mood_tags,
                record.rating,
                record.interpretation,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, owner = owner_id.unwrap_or("guest"), "record stored");
        Ok(id)
    }

    fn list(&self, owner_id: Option<&str>) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM records
             WHERE (?1 IS NULL OR owner_id = ?1)
             ORDER BY created_at_ms DESC, id DESC"
        ))?;

        let rows = stmt.query_map(params![owner_id], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn get(&self, id: i64) -> Result<Option<Record>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_record)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn delete(&self, id: i64) -> Result<()> {
        let deleted = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1", params![id])?;
        debug!(id, deleted, "record delete");
        Ok(())
    }
}
