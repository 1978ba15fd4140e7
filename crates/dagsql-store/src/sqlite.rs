use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use dagsql_types::{AggregateId, NodeId, NodeRow, StackFrame, StoredNode};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{StackEntry, ValueStore};

const SCHEMA_VERSION: &str = "v1";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ds_meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ds_obj (
  ds_obj_id INTEGER PRIMARY KEY,
  ds_obj_type INTEGER NOT NULL,
  ds_obj_val_int INTEGER,
  ds_obj_val_blob BLOB
);

CREATE TABLE IF NOT EXISTS ds_arr (
  ds_arr_id INTEGER NOT NULL,
  ds_arr_idx INTEGER NOT NULL,
  ds_arr_val INTEGER NOT NULL,
  PRIMARY KEY (ds_arr_id, ds_arr_idx)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS ds_map (
  ds_map_id INTEGER NOT NULL,
  ds_map_key BLOB NOT NULL,
  ds_map_val INTEGER NOT NULL,
  PRIMARY KEY (ds_map_id, ds_map_key)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS ds_root (
  ds_root_name TEXT PRIMARY KEY,
  ds_root_obj INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ds_seq (
  ds_seq_name TEXT PRIMARY KEY,
  ds_seq_val INTEGER NOT NULL
);

CREATE TEMP TABLE IF NOT EXISTS ds_stack (
  ds_stack_idx INTEGER PRIMARY KEY,
  ds_stack_key BLOB,
  ds_stack_val INTEGER NOT NULL
);
"#;

// Child i (1-based ROW_NUMBER) of n lands at base + n - i, so the first
// child in traversal order ends up on top of the stack.
const PUSH_LIST_SQL: &str = r#"
INSERT OR REPLACE INTO ds_stack(ds_stack_idx, ds_stack_key, ds_stack_val)
SELECT ?2 + COUNT(*) OVER () - ROW_NUMBER() OVER (ORDER BY ds_arr_idx), NULL, ds_arr_val
FROM ds_arr WHERE ds_arr_id = ?1
"#;

const PUSH_MAP_SQL: &str = r#"
INSERT OR REPLACE INTO ds_stack(ds_stack_idx, ds_stack_key, ds_stack_val)
SELECT ?2 + COUNT(*) OVER () - ROW_NUMBER() OVER (ORDER BY length(ds_map_key), ds_map_key),
       ds_map_key, ds_map_val
FROM ds_map WHERE ds_map_id = ?1
"#;

struct Inner {
    conn: Connection,
    /// Open transaction levels; levels above the first are savepoints.
    depth: u32,
}

impl Inner {
    /// Close the innermost transaction level with `sql`.
    ///
    /// The level is only popped once the statement succeeds, so a failed
    /// `COMMIT` (for example `SQLITE_BUSY`) leaves it open for a rollback.
    /// If SQLite has already ended the transaction on its own, the handle
    /// follows it back to autocommit.
    fn finish(&mut self, sql: &str) -> StoreResult<()> {
        match self.conn.execute_batch(sql) {
            Ok(()) => {
                self.depth -= 1;
                Ok(())
            }
            Err(err) => {
                if self.conn.is_autocommit() {
                    self.depth = 0;
                }
                debug!(error = %err, depth = self.depth, "closing transaction failed");
                Err(err.into())
            }
        }
    }
}

/// SQLite-backed value store.
///
/// The connection is guarded by a mutex so the store can be shared, but the
/// store is designed for one logical operation at a time. Integer payloads
/// are stored as the two's-complement `i64` of the `u64` magnitude.
pub struct SqliteValueStore {
    inner: Mutex<Inner>,
    path: Option<PathBuf>,
}

impl SqliteValueStore {
    /// Open (creating if needed) a store as described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let conn = match &config.path {
            Some(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)?;
                }
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            &config.journal_mode,
            |row| row.get(0),
        )?;
        conn.pragma_update(None, "synchronous", &config.synchronous)?;
        migrate(&conn)?;
        info!(path = ?config.path, journal_mode = %mode, "opened value store");
        Ok(Self {
            inner: Mutex::new(Inner { conn, depth: 0 }),
            path: config.path.clone(),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(&StoreConfig::default())
    }

    /// Open a database file with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(&StoreConfig::at(path.as_ref()))
    }

    /// Database file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> StoreResult<String> {
        let inner = self.lock();
        Ok(inner.conn.query_row(
            "SELECT value FROM ds_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )?)
    }

    /// Run a closure against the raw connection, for inspection and
    /// maintenance outside the [`ValueStore`] surface.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let inner = self.lock();
        Ok(f(&inner.conn)?)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("lock poisoned")
    }

    fn reserve(&self, seq: &str, max_sql: &str) -> StoreResult<AggregateId> {
        let inner = self.lock();
        let issued: i64 = inner
            .conn
            .query_row(
                "SELECT ds_seq_val FROM ds_seq WHERE ds_seq_name = ?1",
                params![seq],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);
        let present: i64 = inner.conn.query_row(max_sql, [], |row| row.get(0))?;
        let next = issued.max(present) + 1;
        inner.conn.execute(
            r#"
            INSERT INTO ds_seq(ds_seq_name, ds_seq_val) VALUES (?1, ?2)
            ON CONFLICT(ds_seq_name) DO UPDATE SET ds_seq_val = excluded.ds_seq_val
            "#,
            params![seq, next],
        )?;
        debug!(seq, id = next, "reserved aggregate id");
        Ok(AggregateId::new(next as u64))
    }
}

fn migrate(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO ds_meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}

fn sql_id(raw: u64) -> StoreResult<i64> {
    i64::try_from(raw).map_err(|_| StoreError::IdOutOfRange(raw))
}

fn node_row(type_code: i64, int_val: Option<i64>, blob_val: Option<Vec<u8>>) -> NodeRow {
    NodeRow {
        type_code,
        int_val: int_val.map(|v| v as u64),
        blob_val,
    }
}

impl ValueStore for SqliteValueStore {
    fn begin(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        if inner.depth == 0 {
            // IMMEDIATE takes the write lock up front, so id reservation
            // cannot interleave with another writer.
            inner.conn.execute_batch("BEGIN IMMEDIATE")?;
        } else {
            inner
                .conn
                .execute_batch(&format!("SAVEPOINT dagsql_{}", inner.depth))?;
        }
        inner.depth += 1;
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        let sql = match inner.depth {
            0 => return Err(StoreError::NoTransaction),
            1 => "COMMIT".to_owned(),
            depth => format!("RELEASE dagsql_{}", depth - 1),
        };
        inner.finish(&sql)
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut inner = self.lock();
        let sql = match inner.depth {
            0 => return Err(StoreError::NoTransaction),
            1 => "ROLLBACK".to_owned(),
            depth => format!("ROLLBACK TO dagsql_{0}; RELEASE dagsql_{0}", depth - 1),
        };
        inner.finish(&sql)
    }

    fn insert_node(&self, row: &NodeRow) -> StoreResult<NodeId> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            "INSERT INTO ds_obj(ds_obj_type, ds_obj_val_int, ds_obj_val_blob) VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![
            row.type_code,
            row.int_val.map(|v| v as i64),
            row.blob_val.as_deref()
        ])?;
        Ok(NodeId::new(inner.conn.last_insert_rowid() as u64))
    }

    fn node(&self, id: NodeId) -> StoreResult<Option<StoredNode>> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            "SELECT ds_obj_type, ds_obj_val_int, ds_obj_val_blob FROM ds_obj WHERE ds_obj_id = ?1",
        )?;
        let row = stmt
            .query_row(params![sql_id(id.get())?], |r| {
                Ok(node_row(r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .optional()?;
        Ok(row.map(|row| StoredNode::new(id, row)))
    }

    fn node_count(&self) -> StoreResult<u64> {
        let inner = self.lock();
        let n: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM ds_obj", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    fn reserve_list(&self) -> StoreResult<AggregateId> {
        self.reserve("ds_arr", "SELECT COALESCE(MAX(ds_arr_id), 0) FROM ds_arr")
    }

    fn reserve_map(&self) -> StoreResult<AggregateId> {
        self.reserve("ds_map", "SELECT COALESCE(MAX(ds_map_id), 0) FROM ds_map")
    }

    fn put_list_item(&self, list: AggregateId, index: u64, child: NodeId) -> StoreResult<()> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            "INSERT OR REPLACE INTO ds_arr(ds_arr_id, ds_arr_idx, ds_arr_val) VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![
            sql_id(list.get())?,
            sql_id(index)?,
            sql_id(child.get())?
        ])?;
        Ok(())
    }

    fn put_map_entry(&self, map: AggregateId, key: &[u8], child: NodeId) -> StoreResult<()> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            "INSERT OR REPLACE INTO ds_map(ds_map_id, ds_map_key, ds_map_val) VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![sql_id(map.get())?, key, sql_id(child.get())?])?;
        Ok(())
    }

    fn list_items(&self, list: AggregateId) -> StoreResult<Vec<NodeId>> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            "SELECT ds_arr_val FROM ds_arr WHERE ds_arr_id = ?1 ORDER BY ds_arr_idx",
        )?;
        let rows = stmt.query_map(params![sql_id(list.get())?], |r| {
            Ok(NodeId::new(r.get::<_, i64>(0)? as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn map_entries(&self, map: AggregateId) -> StoreResult<Vec<(Vec<u8>, NodeId)>> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            r#"
            SELECT ds_map_key, ds_map_val FROM ds_map WHERE ds_map_id = ?1
            ORDER BY length(ds_map_key), ds_map_key
            "#,
        )?;
        let rows = stmt.query_map(params![sql_id(map.get())?], |r| {
            Ok((r.get(0)?, NodeId::new(r.get::<_, i64>(1)? as u64)))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn set_root(&self, name: &str, node: NodeId) -> StoreResult<()> {
        let inner = self.lock();
        inner.conn.execute(
            r#"
            INSERT INTO ds_root(ds_root_name, ds_root_obj) VALUES (?1, ?2)
            ON CONFLICT(ds_root_name) DO UPDATE SET ds_root_obj = excluded.ds_root_obj
            "#,
            params![name, sql_id(node.get())?],
        )?;
        Ok(())
    }

    fn root(&self, name: &str) -> StoreResult<Option<NodeId>> {
        let inner = self.lock();
        let id: Option<i64> = inner
            .conn
            .query_row(
                "SELECT ds_root_obj FROM ds_root WHERE ds_root_name = ?1",
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id.map(|v| NodeId::new(v as u64)))
    }

    fn roots(&self) -> StoreResult<Vec<(String, NodeId)>> {
        let inner = self.lock();
        let mut stmt = inner
            .conn
            .prepare("SELECT ds_root_name, ds_root_obj FROM ds_root ORDER BY ds_root_name")?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get(0)?, NodeId::new(r.get::<_, i64>(1)? as u64)))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn remove_root(&self, name: &str) -> StoreResult<bool> {
        let inner = self.lock();
        let n = inner
            .conn
            .execute("DELETE FROM ds_root WHERE ds_root_name = ?1", params![name])?;
        Ok(n > 0)
    }

    fn stack_clear(&self) -> StoreResult<()> {
        let inner = self.lock();
        inner.conn.execute("DELETE FROM ds_stack", [])?;
        Ok(())
    }

    fn stack_put(&self, pos: u64, frame: &StackFrame) -> StoreResult<()> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            r#"
            INSERT OR REPLACE INTO ds_stack(ds_stack_idx, ds_stack_key, ds_stack_val)
            VALUES (?1, ?2, ?3)
            "#,
        )?;
        stmt.execute(params![
            sql_id(pos)?,
            frame.key.as_deref(),
            sql_id(frame.node.get())?
        ])?;
        Ok(())
    }

    fn stack_read(&self, pos: u64) -> StoreResult<StackEntry> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(
            r#"
            SELECT ds_stack_key, ds_stack_val, ds_obj_type, ds_obj_val_int, ds_obj_val_blob
            FROM ds_stack LEFT JOIN ds_obj ON ds_obj_id = ds_stack_val
            WHERE ds_stack_idx = ?1
            "#,
        )?;
        let entry = stmt
            .query_row(params![sql_id(pos)?], |r| {
                let node = NodeId::new(r.get::<_, i64>(1)? as u64);
                let frame = StackFrame {
                    key: r.get(0)?,
                    node,
                };
                let row = r
                    .get::<_, Option<i64>>(2)?
                    .map(|code| -> rusqlite::Result<NodeRow> {
                        Ok(node_row(code, r.get(3)?, r.get(4)?))
                    })
                    .transpose()?;
                Ok(StackEntry {
                    frame,
                    node: row.map(|row| StoredNode::new(node, row)),
                })
            })
            .optional()?;
        entry.ok_or(StoreError::MissingStackFrame(pos))
    }

    fn stack_push_list(&self, list: AggregateId, base: u64) -> StoreResult<u64> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(PUSH_LIST_SQL)?;
        let n = stmt.execute(params![sql_id(list.get())?, sql_id(base)?])?;
        Ok(n as u64)
    }

    fn stack_push_map(&self, map: AggregateId, base: u64) -> StoreResult<u64> {
        let inner = self.lock();
        let mut stmt = inner.conn.prepare_cached(PUSH_MAP_SQL)?;
        let n = stmt.execute(params![sql_id(map.get())?, sql_id(base)?])?;
        Ok(n as u64)
    }
}

impl std::fmt::Debug for SqliteValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteValueStore")
            .field("path", &self.path)
            .finish()
    }
}
