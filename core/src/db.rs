use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Data structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
}

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Read-only handle on a SQLite database exposed over MCP.
pub struct Database {
    conn: Connection,
    name: String,
}

impl Database {
    /// Open an existing database at `path` in read-only, query-only mode.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open database at {}", path.display()))?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "main".to_string());

        let db = Self { conn, name };
        db.apply_pragmas()?;
        Ok(db)
    }

    fn apply_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA query_only = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Database name used in resource URIs (the file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute `f` inside a deferred transaction that is always rolled back,
    /// whatever `f` returns.
    pub fn with_rollback<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.conn.execute_batch("BEGIN")?;
        let result = f();
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!(error = %e, "failed to roll back read-only transaction");
        }
        result
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// User tables, sorted by name. Internal `sqlite_*` tables are excluded.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tables)
    }

    /// Column names and declared types for `table`. Unknown tables yield an
    /// empty list.
    pub fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map([table], |r| {
                Ok(ColumnInfo {
                    column_name: r.get(0)?,
                    data_type: r.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Run a single SQL statement and collect every row as a JSON object.
    /// Writes are rejected by the connection's query-only mode.
    pub fn run_query(&self, sql: &str) -> Result<Vec<Row>> {
        self.with_rollback(|| {
            let mut stmt = self.conn.prepare(sql)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut obj = Map::with_capacity(columns.len());
                for (i, name) in columns.iter().enumerate() {
                    obj.insert(name.clone(), value_to_json(row.get_ref(i)?));
                }
                out.push(obj);
            }
            Ok(out)
        })
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
