//! Stream construction options
//!
//! [`StreamOptions`] names the store, version and collection a reader or writer
//! works against, plus the reader's traversal settings. Options are fixed once
//! a stream is built.
//!
//! Options can be built in code:
//!
//! ```
//! use strata_core::{CursorDirection, StreamOptions};
//!
//! let opts = StreamOptions::new("test-db", "items")
//!     .version(2)
//!     .index("by_value")
//!     .direction(CursorDirection::PrevUnique);
//! assert_eq!(opts.store_version, 2);
//! ```
//!
//! or loaded from a TOML document:
//!
//! ```toml
//! store = "test-db"
//! collection = "items"
//! index = "by_value"
//! direction = "nextunique"
//!
//! [range]
//! lower = "b"
//! upper = "d"
//! ```

use crate::error::{StoreError, StoreResult};
use crate::key::KeyRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Traversal direction of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorDirection {
    /// Ascending key order (default)
    #[default]
    Next,
    /// Ascending, one record per distinct key
    NextUnique,
    /// Descending key order
    Prev,
    /// Descending, one record per distinct key
    PrevUnique,
}

impl CursorDirection {
    /// True for the descending directions
    pub fn is_reverse(self) -> bool {
        matches!(self, CursorDirection::Prev | CursorDirection::PrevUnique)
    }

    /// True for the duplicate-skipping directions
    pub fn is_unique(self) -> bool {
        matches!(self, CursorDirection::NextUnique | CursorDirection::PrevUnique)
    }

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            CursorDirection::Next => "next",
            CursorDirection::NextUnique => "nextunique",
            CursorDirection::Prev => "prev",
            CursorDirection::PrevUnique => "prevunique",
        }
    }
}

impl fmt::Display for CursorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CursorDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s {
            "next" => Ok(CursorDirection::Next),
            "nextunique" => Ok(CursorDirection::NextUnique),
            "prev" => Ok(CursorDirection::Prev),
            "prevunique" => Ok(CursorDirection::PrevUnique),
            other => Err(StoreError::invalid_options(format!(
                "unknown cursor direction '{}'",
                other
            ))),
        }
    }
}

/// How a writer manages connections across inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Open and close a fresh connection for every record (default)
    #[default]
    PerRecord,
    /// Open one connection on the first insert and keep it until close.
    /// Every record still gets its own read-write transaction.
    SharedConnection,
}

fn default_version() -> u32 {
    1
}

/// Options shared by readers and writers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Name of the store to open
    pub store: String,
    /// Version to open the store at
    #[serde(default = "default_version", rename = "version")]
    pub store_version: u32,
    /// Record collection to read from or write to
    pub collection: String,
    /// Secondary index to traverse instead of the collection (readers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Restricts the keys a reader visits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<KeyRange>,
    /// Reader traversal direction
    #[serde(default)]
    pub direction: CursorDirection,
    /// Writer connection handling
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl StreamOptions {
    /// Options for `collection` in `store` at version 1
    pub fn new(store: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            store_version: default_version(),
            collection: collection.into(),
            index: None,
            range: None,
            direction: CursorDirection::default(),
            write_mode: WriteMode::default(),
        }
    }

    /// Parse options from a TOML document
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::invalid_options(e.to_string()))
    }

    /// Set the store version
    pub fn version(mut self, version: u32) -> Self {
        self.store_version = version;
        self
    }

    /// Traverse a secondary index
    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index = Some(name.into());
        self
    }

    /// Restrict traversal to a key range
    pub fn range(mut self, range: KeyRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Set the traversal direction
    pub fn direction(mut self, direction: CursorDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Set the writer connection mode
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }
}
