//! Storage engine contract.
//!
//! Requests never touch table state directly; they go through the [`Engine`] trait.
//! Every engine call returns its own [`EngineError`], which requests translate into a
//! client-facing [`Status`](crate::Status) before it leaves the request layer.
//!
//! The crate ships [`MemoryEngine`](memory::MemoryEngine), an in-memory engine with
//! on-disk snapshots, used by the console and by tests.
//!
//! # Tables and partitions
//!
//! A table is either a root table or a partition. Partitions carry the name of their
//! root table in [`TableSchema::owner_table`]; operations restricted to root tables
//! reject them.
pub mod memory;

use bincode::{Decode, Encode};
use thiserror::Error;

/// Errors reported by an engine.
///
/// [`EngineError::NotFound`] is the distinguished "no such table" outcome; everything
/// else is an engine-specific failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("table '{0}' not found")]
    NotFound(String),

    #[error("engine failure: {0}")]
    Failure(String),

    #[error("engine io error: {0}")]
    Io(String),

    #[error("unexpected engine error: {0}")]
    Unexpected(String),
}

/// Schema descriptor of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct TableSchema {
    pub table_id: String,
    /// Name of the root table owning this one; empty for root tables.
    pub owner_table: String,
}

impl TableSchema {
    pub fn root(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            owner_table: String::new(),
        }
    }

    pub fn partition(table_id: impl Into<String>, owner_table: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            owner_table: owner_table.into(),
        }
    }

    pub fn is_partition(&self) -> bool {
        !self.owner_table.is_empty()
    }
}

pub trait Engine: Send + Sync {
    fn describe_table(&self, table: &str) -> Result<TableSchema, EngineError>;

    /// Number of rows in `table`. For a root table this includes the rows held by
    /// its partitions.
    fn row_count(&self, table: &str) -> Result<u64, EngineError>;

    fn drop_index(&self, table: &str) -> Result<(), EngineError>;

    fn flush(&self, tables: &[String]) -> Result<(), EngineError>;
}
