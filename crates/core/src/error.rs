//! Error types shared by the engine contract and the stream adapters
//!
//! Every failure a reader or writer can observe is a [`StoreError`]. The
//! variants separate "not found" from "already exists" so that callers can
//! branch on them without matching message text.
//!
//! ## Mapping
//!
//! | Condition | Variant |
//! |-----------|---------|
//! | Store cannot be opened | `Connection` |
//! | Collection or index missing | `NotFound` |
//! | Primary key (or unique index key) taken | `ConstraintViolation` |
//! | Other transaction failure | `Transaction` |
//! | Record carries no usable key | `InvalidRecord` |
//! | Bad configuration or key range | `InvalidOptions` |
//! | Writer used after it terminated | `StreamClosed` |
//! | Item sent before the previous insert resolved | `WriteInFlight` |

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the workspace
pub type StoreResult<T> = Result<T, StoreError>;

/// Kind of schema object a [`StoreError::NotFound`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A record collection
    Collection,
    /// A secondary index on a collection
    Index,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Collection => write!(f, "collection"),
            ResourceKind::Index => write!(f, "index"),
        }
    }
}

/// Errors surfaced by stores, readers and writers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be opened
    #[error("failed to open store '{store}': {reason}")]
    Connection {
        /// Store name passed to open
        store: String,
        /// Engine supplied reason
        reason: String,
    },

    /// A collection or index does not exist in the opened store
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// What was looked up
        kind: ResourceKind,
        /// Name that was looked up
        name: String,
    },

    /// An insert collided with an existing key
    #[error("record with key {key} already exists")]
    ConstraintViolation {
        /// Display form of the colliding key
        key: String,
    },

    /// Any other transaction level failure (abort, quota, I/O)
    #[error("transaction failed: {reason}")]
    Transaction {
        /// Engine supplied reason
        reason: String,
    },

    /// The record has no valid key at the collection's key path
    ///
    /// Also raised for numeric keys that are not `i64` integers.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// Why the record was rejected
        reason: String,
    },

    /// Options could not be parsed or are inconsistent
    #[error("invalid stream options: {reason}")]
    InvalidOptions {
        /// Why the options were rejected
        reason: String,
    },

    /// The stream already reached a terminal state
    #[error("stream is closed")]
    StreamClosed,

    /// An item was sent while the previous insert was unresolved
    #[error("previous insert has not resolved")]
    WriteInFlight,
}

impl StoreError {
    /// Create a connection error
    pub fn connection(store: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Connection {
            store: store.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error for a collection
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: ResourceKind::Collection,
            name: name.into(),
        }
    }

    /// Create a not found error for an index
    pub fn index_not_found(name: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: ResourceKind::Index,
            name: name.into(),
        }
    }

    /// Create a constraint violation for a key
    pub fn already_exists(key: impl fmt::Display) -> Self {
        StoreError::ConstraintViolation {
            key: key.to_string(),
        }
    }

    /// Create a transaction error
    pub fn transaction(reason: impl Into<String>) -> Self {
        StoreError::Transaction {
            reason: reason.into(),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        StoreError::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Create an invalid options error
    pub fn invalid_options(reason: impl Into<String>) -> Self {
        StoreError::InvalidOptions {
            reason: reason.into(),
        }
    }

    /// True for missing collections and indexes
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True for duplicate key insertions
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}
