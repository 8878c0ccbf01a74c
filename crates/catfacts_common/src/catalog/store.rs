//! Fact Store Implementation
//!
//! SQLite-backed persistent storage for cat facts.
//! Location: configured path, or ~/.local/share/catfacts/facts.db

use super::schema::{Fact, FactFilter, Statistics, MAX_RATING, SCHEMA_VERSION};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const FACT_COLUMNS: &str = "id, text, length, created_at, is_favorite, category, rating";

/// Fact store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Fact {0} not found")]
    NotFound(i64),

    #[error("Fact already stored: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence boundary for facts
///
/// Listing operations return facts newest first.
pub trait FactStore: Send + Sync {
    fn get_all(&self) -> Result<Vec<Fact>, StoreError>;

    fn get_by_id(&self, id: i64) -> Result<Option<Fact>, StoreError>;

    fn get_recent(&self, limit: usize) -> Result<Vec<Fact>, StoreError>;

    fn get_favorites(&self) -> Result<Vec<Fact>, StoreError>;

    /// Facts matching every supplied criterion
    fn filter(&self, filter: &FactFilter) -> Result<Vec<Fact>, StoreError>;

    /// Insert a fact; the store assigns `id` and `created_at`
    ///
    /// Text already stored (ignoring case) is rejected with `Duplicate`.
    fn add(&self, fact: &Fact) -> Result<Fact, StoreError>;

    /// Persist mutable fields of an existing fact; unknown ids are `NotFound`
    fn update(&self, fact: &Fact) -> Result<Fact, StoreError>;

    fn delete(&self, id: i64) -> Result<bool, StoreError>;

    fn toggle_favorite(&self, id: i64) -> Result<bool, StoreError>;

    /// Set a 1-5 rating; false for out-of-range ratings or unknown ids
    fn rate(&self, id: i64, rating: i32) -> Result<bool, StoreError>;

    fn statistics(&self) -> Result<Statistics, StoreError>;

    /// Case-insensitive exact match on fact text
    fn exists(&self, text: &str) -> Result<bool, StoreError>;
}

/// Fact store backed by SQLite
pub struct SqliteFactStore {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl SqliteFactStore {
    /// Open or create the fact store at the default location
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&Self::default_path())
    }

    /// Open or create the fact store at a specific path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(path.to_path_buf()),
        };

        store.init_schema()?;
        Ok(store)
    }

    /// Private in-memory store, discarded on drop
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Get the default database path
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("catfacts")
            .join("facts.db")
    }

    /// Database path, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                text_key TEXT NOT NULL,
                length INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                category TEXT,
                rating INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS schema_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('version', ?)",
            params![SCHEMA_VERSION.to_string()],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_facts_created_at ON facts(created_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_facts_is_favorite ON facts(is_favorite)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_facts_rating ON facts(rating)",
            [],
        )?;
        // Version 1 stores carried a plain index here
        conn.execute("DROP INDEX IF EXISTS idx_facts_text_key", [])?;
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_facts_text_key_unique ON facts(text_key)",
            [],
        )?;

        Ok(())
    }

    /// Get total fact count
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM facts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn select(
        &self,
        where_sql: &str,
        params: &[&dyn rusqlite::ToSql],
        limit: Option<usize>,
    ) -> Result<Vec<Fact>, StoreError> {
        let conn = self.conn()?;

        let mut sql = format!("SELECT {} FROM facts WHERE {}", FACT_COLUMNS, where_sql);
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, fact_from_row)?;

        let mut facts = Vec::new();
        for row in rows {
            facts.push(row?);
        }
        Ok(facts)
    }
}

impl FactStore for SqliteFactStore {
    fn get_all(&self) -> Result<Vec<Fact>, StoreError> {
        self.select("1=1", &[], None)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Fact>, StoreError> {
        let conn = self.conn()?;
        let fact = conn
            .query_row(
                &format!("SELECT {} FROM facts WHERE id = ?", FACT_COLUMNS),
                params![id],
                fact_from_row,
            )
            .optional()?;
        Ok(fact)
    }

    fn get_recent(&self, limit: usize) -> Result<Vec<Fact>, StoreError> {
        self.select("1=1", &[], Some(limit))
    }

    fn get_favorites(&self) -> Result<Vec<Fact>, StoreError> {
        self.select("is_favorite = 1", &[], None)
    }

    fn filter(&self, filter: &FactFilter) -> Result<Vec<Fact>, StoreError> {
        let mut sql = String::from("1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(term) = filter.search_term() {
            sql.push_str(" AND text_key LIKE ? ESCAPE '\\'");
            params_vec.push(Box::new(format!("%{}%", escape_like(&term.to_lowercase()))));
        }

        if let Some(category) = filter.category_name() {
            sql.push_str(" AND category = ?");
            params_vec.push(Box::new(category.to_string()));
        }

        if filter.only_favorites {
            sql.push_str(" AND is_favorite = 1");
        }

        if let Some(min) = filter.min_rating {
            sql.push_str(" AND rating >= ?");
            params_vec.push(Box::new(min));
        }

        if let Some(from) = filter.created_from() {
            sql.push_str(" AND created_at >= ?");
            params_vec.push(Box::new(encode_timestamp(&from)));
        }

        if let Some(before) = filter.created_before() {
            sql.push_str(" AND created_at < ?");
            params_vec.push(Box::new(encode_timestamp(&before)));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        self.select(&sql, params_refs.as_slice(), None)
    }

    fn add(&self, fact: &Fact) -> Result<Fact, StoreError> {
        fact.validate()?;

        let mut saved = fact.clone();
        // Stored with microsecond precision
        saved.created_at = Utc::now().trunc_subsecs(6);

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO facts (text, text_key, length, created_at, is_favorite, category, rating)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                &saved.text,
                saved.text.to_lowercase(),
                saved.length,
                encode_timestamp(&saved.created_at),
                saved.is_favorite,
                &saved.category,
                saved.rating
            ],
        )
        .map_err(|e| duplicate_or(e, &saved.text))?;
        saved.id = conn.last_insert_rowid();

        Ok(saved)
    }

    fn update(&self, fact: &Fact) -> Result<Fact, StoreError> {
        fact.validate()?;

        let conn = self.conn()?;
        let count = conn.execute(
            r#"
            UPDATE facts SET
                text = ?,
                text_key = ?,
                length = ?,
                is_favorite = ?,
                category = ?,
                rating = ?
            WHERE id = ?
            "#,
            params![
                &fact.text,
                fact.text.to_lowercase(),
                fact.length,
                fact.is_favorite,
                &fact.category,
                fact.rating,
                fact.id
            ],
        )
        .map_err(|e| duplicate_or(e, &fact.text))?;

        if count == 0 {
            return Err(StoreError::NotFound(fact.id));
        }

        // created_at is immutable; return the stored value
        let stored = conn
            .query_row(
                &format!("SELECT {} FROM facts WHERE id = ?", FACT_COLUMNS),
                params![fact.id],
                fact_from_row,
            )?;
        Ok(stored)
    }

    fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let count = conn.execute("DELETE FROM facts WHERE id = ?", params![id])?;
        Ok(count > 0)
    }

    fn toggle_favorite(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE facts SET is_favorite = NOT is_favorite WHERE id = ?",
            params![id],
        )?;
        Ok(count > 0)
    }

    fn rate(&self, id: i64, rating: i32) -> Result<bool, StoreError> {
        if rating < 1 || rating > i32::from(MAX_RATING) {
            return Ok(false);
        }

        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE facts SET rating = ? WHERE id = ?",
            params![rating, id],
        )?;
        Ok(count > 0)
    }

    fn statistics(&self) -> Result<Statistics, StoreError> {
        let conn = self.conn()?;
        let (total, average): (i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*), (SELECT AVG(rating) FROM facts WHERE rating > 0) FROM facts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(Statistics {
            total_count: total as usize,
            average_rating: average.map(round_2dp).unwrap_or(0.0),
        })
    }

    fn exists(&self, text: &str) -> Result<bool, StoreError> {
        if text.trim().is_empty() {
            return Ok(false);
        }

        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM facts WHERE text_key = ? LIMIT 1",
                params![text.to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<Fact> {
    Ok(Fact {
        id: row.get(0)?,
        text: row.get(1)?,
        length: row.get(2)?,
        created_at: decode_timestamp(&row.get::<_, String>(3)?)?,
        is_favorite: row.get(4)?,
        category: row.get(5)?,
        rating: row.get(6)?,
    })
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))
}

/// Unique `text_key` violations become `Duplicate`
fn duplicate_or(err: rusqlite::Error, text: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate(text.to_string())
        }
        other => StoreError::Sqlite(other),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
