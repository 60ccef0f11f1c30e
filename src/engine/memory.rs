//! In-memory table engine with on-disk snapshots.
//!
//! [`MemoryEngine`] keeps table metadata and row counts in memory. Inserted rows are
//! buffered until a flush, which moves them to the persisted count and, when the
//! engine was opened on a directory, writes one snapshot file per flushed table.
//!
//! # Snapshot format
//!
//! Each table is stored in `<dir>/<table>.tbl` as a single bincode-encoded
//! [`TableSnapshot`], big-endian with fixed-size integers. Buffered rows are never
//! written; reopening a directory restores the state as of each table's last flush.
//!
//! A flush first writes every snapshot to `<table>.tbl.tmp` and renames them into
//! place only once all were written. Row counts in memory change after that.
//!
//! # Example
//! ```rust
//! use ferry::{Engine, engine::memory::MemoryEngine};
//!
//! let engine = MemoryEngine::new();
//! engine.create_table("t1").unwrap();
//! engine.insert("t1", 5).unwrap();
//!
//! assert_eq!(engine.row_count("t1").unwrap(), 5);
//! ```
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_std_read, encode_into_std_write,
};
use log::{debug, info, trace};

use super::{Engine, EngineError, TableSchema};

const SNAPSHOT_EXT: &str = "tbl";
const STAGED_EXT: &str = "tbl.tmp";

fn config() -> Configuration<BigEndian, Fixint> {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// Persisted form of a table.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
struct TableSnapshot {
    schema: TableSchema,
    rows: u64,
    indexed: bool,
}

#[derive(Debug, Clone)]
struct TableState {
    schema: TableSchema,
    persisted: u64,
    buffered: u64,
    indexed: bool,
}

impl TableState {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            persisted: 0,
            buffered: 0,
            indexed: false,
        }
    }

    fn rows(&self) -> Result<u64, EngineError> {
        self.persisted
            .checked_add(self.buffered)
            .ok_or_else(|| row_count_overflow(&self.schema.table_id))
    }
}

fn row_count_overflow(table: &str) -> EngineError {
    EngineError::Failure(format!("row count overflow in table '{table}'"))
}

impl From<TableSnapshot> for TableState {
    fn from(value: TableSnapshot) -> Self {
        Self {
            schema: value.schema,
            persisted: value.rows,
            buffered: 0,
            indexed: value.indexed,
        }
    }
}

#[derive(Debug)]
pub struct MemoryEngine {
    dir: Option<PathBuf>,
    tables: RwLock<HashMap<String, TableState>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates an engine that never touches disk.
    pub fn new() -> Self {
        Self {
            dir: None,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Opens an engine backed by `dir`, loading every table snapshot found there.
    /// The directory is created if missing.
    pub fn open(dir: PathBuf) -> Result<Self, EngineError> {
        fs::create_dir_all(&dir).map_err(|e| EngineError::Io(e.to_string()))?;

        let mut tables: HashMap<String, TableState> = HashMap::new();

        for entry in fs::read_dir(&dir).map_err(|e| EngineError::Io(e.to_string()))? {
            let path = entry.map_err(|e| EngineError::Io(e.to_string()))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }

            let snapshot = Self::read_snapshot(&path)?;
            trace!("loaded snapshot {path:?}: {snapshot:?}");
            tables.insert(snapshot.schema.table_id.clone(), snapshot.into());
        }

        info!("opened {} table(s) from {dir:?}", tables.len());
        Ok(Self {
            dir: Some(dir),
            tables: RwLock::new(tables),
        })
    }

    pub fn create_table(&self, table: &str) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        if tables.contains_key(table) {
            return Err(EngineError::Failure(format!(
                "table '{table}' already exists"
            )));
        }

        debug!("creating table '{table}'");
        tables.insert(table.to_string(), TableState::new(TableSchema::root(table)));
        Ok(())
    }

    /// Creates partition `<owner>_<tag>` under the root table `owner` and returns its
    /// name.
    pub fn create_partition(&self, owner: &str, tag: &str) -> Result<String, EngineError> {
        let mut tables = self.write()?;
        match tables.get(owner) {
            None => return Err(EngineError::NotFound(owner.to_string())),
            Some(state) if state.schema.is_partition() => {
                return Err(EngineError::Failure(format!(
                    "cannot create a partition under partition '{owner}'"
                )));
            }
            Some(_) => {}
        }

        if tag.is_empty() || !tag.chars().all(|c| c == '_' || c.is_ascii_alphanumeric()) {
            return Err(EngineError::Failure(format!(
                "invalid partition tag '{tag}', only underscores, letters and numbers are allowed"
            )));
        }

        let name = format!("{owner}_{tag}");
        if tables.contains_key(&name) {
            return Err(EngineError::Failure(format!(
                "partition '{name}' already exists"
            )));
        }

        debug!("creating partition '{name}' of '{owner}'");
        tables.insert(
            name.clone(),
            TableState::new(TableSchema::partition(name.as_str(), owner)),
        );
        Ok(name)
    }

    /// Buffers `rows` new rows in `table`; they become persistent on flush.
    pub fn insert(&self, table: &str, rows: u64) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        let state = tables
            .get_mut(table)
            .ok_or_else(|| EngineError::NotFound(table.to_string()))?;
        state.buffered = state
            .buffered
            .checked_add(rows)
            .ok_or_else(|| row_count_overflow(table))?;
        trace!("'{table}' buffered rows: {}", state.buffered);
        Ok(())
    }

    pub fn build_index(&self, table: &str) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        let state = tables
            .get_mut(table)
            .ok_or_else(|| EngineError::NotFound(table.to_string()))?;
        state.indexed = true;
        Ok(())
    }

    pub fn has_index(&self, table: &str) -> Result<bool, EngineError> {
        self.read()?
            .get(table)
            .map(|state| state.indexed)
            .ok_or_else(|| EngineError::NotFound(table.to_string()))
    }

    /// Rows of `table` alone that survived a flush.
    pub fn persisted_rows(&self, table: &str) -> Result<u64, EngineError> {
        self.read()?
            .get(table)
            .map(|state| state.persisted)
            .ok_or_else(|| EngineError::NotFound(table.to_string()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, TableState>>, EngineError> {
        self.tables
            .read()
            .map_err(|_| EngineError::Unexpected("table state lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, TableState>>, EngineError> {
        self.tables
            .write()
            .map_err(|_| EngineError::Unexpected("table state lock poisoned".into()))
    }

    fn read_snapshot(path: &Path) -> Result<TableSnapshot, EngineError> {
        let f = File::open(path).map_err(|e| EngineError::Io(e.to_string()))?;
        let mut reader = BufReader::new(f);
        decode_from_std_read(&mut reader, config())
            .map_err(|e| EngineError::Io(format!("failed to decode {path:?}: {e}")))
    }

    /// Writes `snapshot` next to its final location; [`Self::commit_snapshot`] moves
    /// it into place.
    fn stage_snapshot(dir: &Path, snapshot: &TableSnapshot) -> Result<PathBuf, EngineError> {
        let path = dir.join(format!("{}.{STAGED_EXT}", snapshot.schema.table_id));
        let f = File::create(&path).map_err(|e| EngineError::Io(format!("{path:?}: {e}")))?;
        let mut writer = BufWriter::new(f);

        encode_into_std_write(snapshot, &mut writer, config())
            .map_err(|e| EngineError::Io(format!("failed to encode {path:?}: {e}")))?;
        writer.flush().map_err(|e| EngineError::Io(e.to_string()))?;

        trace!("staged snapshot {path:?}");
        Ok(path)
    }

    fn commit_snapshot(dir: &Path, table: &str, staged: &Path) -> Result<(), EngineError> {
        let path = dir.join(format!("{table}.{SNAPSHOT_EXT}"));
        fs::rename(staged, &path).map_err(|e| EngineError::Io(format!("{path:?}: {e}")))?;
        trace!("wrote snapshot {path:?}");
        Ok(())
    }
}

impl Engine for MemoryEngine {
    fn describe_table(&self, table: &str) -> Result<TableSchema, EngineError> {
        self.read()?
            .get(table)
            .map(|state| state.schema.clone())
            .ok_or_else(|| EngineError::NotFound(table.to_string()))
    }

    fn row_count(&self, table: &str) -> Result<u64, EngineError> {
        let tables = self.read()?;
        let state = tables
            .get(table)
            .ok_or_else(|| EngineError::NotFound(table.to_string()))?;

        tables
            .values()
            .filter(|p| p.schema.owner_table == table)
            .try_fold(state.rows()?, |total, partition| {
                total
                    .checked_add(partition.rows()?)
                    .ok_or_else(|| row_count_overflow(table))
            })
    }

    fn drop_index(&self, table: &str) -> Result<(), EngineError> {
        let mut tables = self.write()?;
        let state = tables
            .get_mut(table)
            .ok_or_else(|| EngineError::NotFound(table.to_string()))?;

        debug!("dropping index of '{table}'");
        state.indexed = false;
        Ok(())
    }

    fn flush(&self, tables: &[String]) -> Result<(), EngineError> {
        let mut state = self.write()?;

        if let Some(missing) = tables.iter().find(|t| !state.contains_key(t.as_str())) {
            return Err(EngineError::NotFound(missing.clone()));
        }

        let targets: Vec<String> = state
            .values()
            .filter(|s| {
                tables.contains(&s.schema.table_id) || tables.contains(&s.schema.owner_table)
            })
            .map(|s| s.schema.table_id.clone())
            .collect();

        // Nothing changes in memory or on disk until every target is staged.
        let mut flushed = Vec::with_capacity(targets.len());
        for name in &targets {
            let Some(table) = state.get(name) else {
                continue;
            };
            let snapshot = TableSnapshot {
                schema: table.schema.clone(),
                rows: table.rows()?,
                indexed: table.indexed,
            };
            flushed.push((name.clone(), snapshot));
        }

        if let Some(dir) = &self.dir {
            let mut staged = Vec::with_capacity(flushed.len());
            for (name, snapshot) in &flushed {
                match Self::stage_snapshot(dir, snapshot) {
                    Ok(path) => staged.push((name.as_str(), path)),
                    Err(e) => {
                        for (_, path) in &staged {
                            let _ = fs::remove_file(path);
                        }
                        return Err(e);
                    }
                }
            }

            for (name, path) in &staged {
                Self::commit_snapshot(dir, name, path)?;
            }
        }

        for (name, snapshot) in flushed {
            if let Some(table) = state.get_mut(&name) {
                table.persisted = snapshot.rows;
                table.buffered = 0;
                debug!("flushed '{name}' ({} rows)", table.persisted);
            }
        }

        Ok(())
    }
}
