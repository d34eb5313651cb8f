use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, SqlSession, SqlTransaction, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SqlSession for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;
        run_query(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        run_exec(&conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn begin(&self) -> Result<Box<dyn SqlTransaction + '_>, SQLError> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| SQLError::Transaction(e.to_string()))?;

        guard
            .execute_batch("BEGIN IMMEDIATE;")
            .map_err(|e| SQLError::Transaction(e.to_string()))?;

        Ok(Box::new(SqliteTx {
            guard,
            finished: false,
        }))
    }
}

/// An open SQLite transaction. Holds the connection mutex for its whole
/// lifetime, so nothing else can touch the database until it resolves.
struct SqliteTx<'a> {
    guard: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqlSession for SqliteTx<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        run_query(&self.guard, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        run_exec(&self.guard, sql, params)
    }
}

impl SqlTransaction for SqliteTx<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), SQLError> {
        self.finished = true;
        self.guard
            .execute_batch("COMMIT;")
            .map_err(|e| SQLError::Transaction(e.to_string()))
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.guard.execute_batch("ROLLBACK;");
        }
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::new();
            for (i, name) in column_names.iter().enumerate() {
                let val = row_value_at(row, i);
                columns.push((name.clone(), val));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn run_exec(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    // Multi-statement strings (schema init) carry no parameters.
    if param_refs.is_empty() && sql.trim_end().trim_end_matches(';').contains(';') {
        conn.execute_batch(sql)
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        return Ok(0);
    }

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| SQLError::Execution(e.to_string()))?;

    Ok(affected as u64)
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> Value {
    // Try integer first, then real, then text, then blob, then null.
    if let Ok(i) = row.get::<_, i64>(idx) {
        return Value::Integer(i);
    }
    if let Ok(f) = row.get::<_, f64>(idx) {
        return Value::Real(f);
    }
    if let Ok(s) = row.get::<_, String>(idx) {
        return Value::Text(s);
    }
    if let Ok(b) = row.get::<_, Vec<u8>>(idx) {
        return Value::Blob(b);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_table() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE t (id TEXT PRIMARY KEY, n INTEGER NOT NULL)",
                &[],
            )
            .unwrap();
        store
    }

    #[test]
    fn exec_and_query_roundtrip() {
        let store = store_with_table();
        store
            .exec(
                "INSERT INTO t (id, n) VALUES (?1, ?2)",
                &[Value::Text("a".into()), Value::Integer(7)],
            )
            .unwrap();

        let rows = store.query("SELECT id, n FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("a"));
        assert_eq!(rows[0].get_i64("n"), Some(7));
    }

    #[test]
    fn committed_transaction_is_visible() {
        let store = store_with_table();
        let tx = store.begin().unwrap();
        tx.exec(
            "INSERT INTO t (id, n) VALUES (?1, ?2)",
            &[Value::Text("a".into()), Value::Integer(1)],
        )
        .unwrap();
        tx.commit().unwrap();

        let rows = store.query("SELECT n FROM t WHERE id = 'a'", &[]).unwrap();
        assert_eq!(rows[0].get_i64("n"), Some(1));
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let store = store_with_table();
        {
            let tx = store.begin().unwrap();
            tx.exec(
                "INSERT INTO t (id, n) VALUES (?1, ?2)",
                &[Value::Text("a".into()), Value::Integer(1)],
            )
            .unwrap();
            // Dropped without commit.
        }

        let rows = store.query("SELECT COUNT(*) AS cnt FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(0));
    }

    #[test]
    fn reads_inside_transaction_see_own_writes() {
        let store = store_with_table();
        let tx = store.begin().unwrap();
        tx.exec(
            "INSERT INTO t (id, n) VALUES ('a', 5)",
            &[],
        )
        .unwrap();
        let rows = tx.query("SELECT n FROM t WHERE id = 'a'", &[]).unwrap();
        assert_eq!(rows[0].get_i64("n"), Some(5));
        tx.commit().unwrap();
    }

    #[test]
    fn real_column_reads_back_as_f64() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec("CREATE TABLE v (x REAL NOT NULL)", &[])
            .unwrap();
        store
            .exec("INSERT INTO v (x) VALUES (?1)", &[Value::Real(2.5)])
            .unwrap();
        let rows = store.query("SELECT x FROM v", &[]).unwrap();
        assert_eq!(rows[0].get_f64("x"), Some(2.5));
    }
}
