use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use crate::indexer::IndexedRecord;
use crate::model::{Group, Person, Record, RecordKind};
use crate::query::{Predicate, Query};
use crate::search;
use crate::vdir::FileState;

/// Where records come from. The command line only ever talks to this trait,
/// so formatting and dispatch can be exercised against an in-memory store.
pub trait ContactStore {
    /// Records of `query.kind` satisfying `query.predicate`, in store order.
    fn search(&self, query: &Query) -> Result<Vec<Record>>;

    /// People listed as members of `group`. Members missing from the store
    /// are skipped.
    fn members(&self, group: &Group) -> Result<Vec<Person>>;
}

#[derive(Debug, Clone)]
pub struct IndexedItem {
    pub id: String,
    pub kind: String,
    /// Normalized group name; people leave it empty.
    pub name_norm: Option<String>,
    /// The record serialized as JSON.
    pub record: String,
}

#[derive(Debug, Clone)]
pub struct IndexedProp {
    pub field: String,
    pub value_norm: String,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub sha1: Vec<u8>,
    pub mtime: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create index directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open index at {}", path.display()))?;

        let mut db = Self { conn };
        db.setup()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.setup()?;
        Ok(db)
    }

    fn setup(&mut self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
              id    TEXT PRIMARY KEY,
              path  TEXT NOT NULL,
              kind  TEXT NOT NULL,
              name_norm TEXT,
              sha1  BLOB NOT NULL,
              mtime INTEGER NOT NULL,
              record TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS props (
              id    TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
              field TEXT NOT NULL,
              value_norm TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_path ON items(path);
            CREATE INDEX IF NOT EXISTS idx_items_kind ON items(kind);
            CREATE INDEX IF NOT EXISTS idx_props_id ON props(id);
            CREATE INDEX IF NOT EXISTS idx_props_field ON props(field);
        "#,
        )?;
        Ok(())
    }

    pub fn reset_schema(&mut self) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(
            r#"
            DROP TABLE IF EXISTS props;
            DROP TABLE IF EXISTS items;
            "#,
        )?;
        tx.commit()?;

        self.setup()?;
        Ok(())
    }

    /// Replace everything indexed from `path` with `records`.
    ///
    /// Record ids must not be held by another file; see [`Database::id_owner`].
    pub fn replace_file(&mut self, path: &Path, state: &FileState, records: &[IndexedRecord]) -> Result<()> {
        let path_text = path.to_string_lossy();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "DELETE FROM props WHERE id IN (SELECT id FROM items WHERE path = ?1)",
            params![path_text],
        )?;
        tx.execute("DELETE FROM items WHERE path = ?1", params![path_text])?;

        {
            let mut insert_item = tx.prepare(
                r#"INSERT INTO items (id, path, kind, name_norm, sha1, mtime, record)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            let mut insert_prop =
                tx.prepare("INSERT INTO props (id, field, value_norm) VALUES (?1, ?2, ?3)")?;

            for record in records {
                let item = &record.item;
                insert_item.execute(params![
                    item.id,
                    path_text,
                    item.kind,
                    item.name_norm,
                    state.sha1,
                    state.mtime,
                    item.record,
                ])?;
                for prop in &record.props {
                    insert_prop.execute(params![item.id, prop.field, prop.value_norm])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// The file a record id is currently indexed from.
    pub fn id_owner(&self, id: &str) -> Result<Option<PathBuf>> {
        let path: Option<String> = self
            .conn
            .query_row("SELECT path FROM items WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    pub fn delete_file(&mut self, path: &Path) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM props WHERE id IN (SELECT id FROM items WHERE path = ?1)",
            params![path.to_string_lossy()],
        )?;
        tx.execute("DELETE FROM items WHERE path = ?1", params![path.to_string_lossy()])?;
        tx.commit()?;
        Ok(())
    }

    pub fn stored_files(&self) -> Result<HashMap<PathBuf, StoredFile>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT path, sha1, mtime FROM items")?;
        let rows = stmt.query_map([], |row| {
            let path: String = row.get(0)?;
            Ok((
                PathBuf::from(path),
                StoredFile {
                    sha1: row.get(1)?,
                    mtime: row.get(2)?,
                },
            ))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (path, file) = row?;
            map.insert(path, file);
        }
        Ok(map)
    }

    /// Drop records whose file is gone. Returns how many files were dropped.
    pub fn remove_missing(&mut self, existing_paths: &HashSet<PathBuf>) -> Result<usize> {
        let to_delete: Vec<PathBuf> = self
            .stored_files()?
            .into_keys()
            .filter(|path| !existing_paths.contains(path))
            .collect();

        for path in &to_delete {
            self.delete_file(path)?;
        }
        Ok(to_delete.len())
    }

    #[cfg(test)]
    pub fn record(&self, id: &str) -> Result<Option<Record>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT record FROM items WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        raw.map(|raw| decode_record(id, &raw)).transpose()
    }
}

fn decode_record(id: &str, raw: &str) -> Result<Record> {
    serde_json::from_str(raw).with_context(|| format!("corrupt index entry for {id}; try --reindex"))
}

// ============================================================================
// Predicate compilation
// ============================================================================

const LIKE_ESCAPE: &str = r"ESCAPE '\'";

/// Render `predicate` as a SQL boolean expression over `items`, pushing the
/// bound values onto `args` in placeholder order.
fn compile(predicate: &Predicate, args: &mut Vec<String>) -> String {
    match predicate {
        Predicate::Contains { field, needle } => {
            let Some(norm) = search::normalize_query(needle) else {
                return "1".to_string();
            };
            args.push(field.as_str().to_string());
            args.push(search::like_pattern(&norm));
            format!(
                "EXISTS (SELECT 1 FROM props p WHERE p.id = items.id AND p.field = ? AND p.value_norm LIKE ? {LIKE_ESCAPE})"
            )
        }
        Predicate::GroupName(name) => {
            let Some(norm) = search::normalize_query(name) else {
                return "1".to_string();
            };
            args.push(search::like_pattern(&norm));
            format!("items.name_norm LIKE ? {LIKE_ESCAPE}")
        }
        Predicate::Uid(uid) => {
            args.push(search::like_pattern(&uid.trim().to_lowercase()));
            format!("lower(items.id) LIKE ? {LIKE_ESCAPE}")
        }
        Predicate::Any(parts) => join(parts, " OR ", "0", args),
        Predicate::All(parts) => join(parts, " AND ", "1", args),
    }
}

fn join(parts: &[Predicate], separator: &str, empty: &str, args: &mut Vec<String>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let compiled: Vec<String> = parts.iter().map(|part| compile(part, args)).collect();
    format!("({})", compiled.join(separator))
}

impl ContactStore for Database {
    fn search(&self, query: &Query) -> Result<Vec<Record>> {
        let mut args = vec![query.kind.as_str().to_string()];
        let filter = compile(&query.predicate, &mut args);
        let sql = format!("SELECT id, record FROM items WHERE kind = ? AND {filter} ORDER BY rowid");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, raw) = row?;
            out.push(decode_record(&id, &raw)?);
        }
        Ok(out)
    }

    fn members(&self, group: &Group) -> Result<Vec<Person>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record FROM items WHERE id = ?1 AND kind = ?2")?;

        let mut out = Vec::new();
        for id in &group.members {
            let raw: Option<String> = stmt
                .query_row(params![id, RecordKind::Person.as_str()], |row| row.get(0))
                .optional()?;
            match raw.map(|raw| decode_record(id, &raw)).transpose()? {
                Some(Record::Person(person)) => out.push(person),
                Some(Record::Group(_)) | None => {
                    log::debug!("group {} lists unknown member {}", group.id, id);
                }
            }
        }
        Ok(out)
    }
}
