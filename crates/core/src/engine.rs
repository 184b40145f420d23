//! Storage engine contract
//!
//! The stream adapters drive any store that implements these traits. The
//! shape follows a cursor-based transactional store:
//!
//! - [`StoreEngine::open`] resolves to a [`Connection`] for a named, versioned
//!   store. Schema upgrades triggered by a higher version are the engine's
//!   business and happen before the open future resolves.
//! - [`Connection::transaction`] starts a read-only or read-write
//!   [`Transaction`] scoped to a set of collections.
//! - [`Transaction::collection`] yields a [`Collection`]; [`Collection::index`]
//!   yields a secondary index. Both are [`CursorSource`]s.
//! - [`CursorSource::open_cursor`] resolves to the first position, or None when
//!   nothing matches. [`Cursor::advance`] consumes the position and resolves to
//!   the next one. Only one advance can be outstanding per cursor because it
//!   takes the cursor by value.
//!
//! ## Contract
//!
//! - Futures are `'static`; they own whatever engine state they need.
//! - `Transaction::abort` on a finished transaction is an error. Callers check
//!   [`Transaction::is_finished`] first.
//! - A read-only transaction finishes by itself once its cursor is exhausted.
//! - A failed `add` aborts its transaction.

use crate::error::StoreResult;
use crate::key::{Key, KeyRange};
use crate::options::CursorDirection;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// A stored record
pub type Record = Value;

/// Resolves to an open connection
pub type OpenFuture = BoxFuture<'static, StoreResult<Box<dyn Connection>>>;

/// Resolves to the next cursor position, or None once the traversal is done
pub type CursorFuture = BoxFuture<'static, StoreResult<Option<Box<dyn Cursor>>>>;

/// Resolves to the primary key of an added record
pub type WriteFuture = BoxFuture<'static, StoreResult<Key>>;

/// Resolves once a transaction commits or fails
pub type CommitFuture = BoxFuture<'static, StoreResult<()>>;

/// Resolves to a record count
pub type CountFuture = BoxFuture<'static, StoreResult<u64>>;

/// Identifies a connection in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh id
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Access mode of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only; sees a consistent snapshot
    ReadOnly,
    /// Reads and writes
    ReadWrite,
}

/// Entry point of a store implementation
pub trait StoreEngine: Send + Sync {
    /// Open store `name` at `version`
    fn open(&self, name: &str, version: u32) -> OpenFuture;
}

/// Handle to an opened store
pub trait Connection: Send + Sync {
    /// Id used to correlate log lines
    fn id(&self) -> ConnectionId;

    /// Start a transaction over `collections`
    ///
    /// Fails with `NotFound` if any collection is missing.
    fn transaction(
        &self,
        collections: &[&str],
        mode: TransactionMode,
    ) -> StoreResult<Box<dyn Transaction>>;

    /// Release the connection
    fn close(&self);
}

/// Unit of isolation over one or more collections
pub trait Transaction: Send + Sync {
    /// Access a collection in the transaction's scope
    fn collection(&self, name: &str) -> StoreResult<Box<dyn Collection>>;

    /// True once the transaction committed or aborted
    fn is_finished(&self) -> bool;

    /// Abort the transaction, discarding its writes
    fn abort(&self) -> StoreResult<()>;

    /// Commit pending writes
    fn commit(&self) -> CommitFuture;
}

/// Anything a cursor can be opened over
pub trait CursorSource: Send + Sync {
    /// Open a cursor positioned at the first matching entry
    fn open_cursor(&self, range: Option<&KeyRange>, direction: CursorDirection) -> CursorFuture;

    /// Count entries inside `range`
    fn count(&self, range: Option<&KeyRange>) -> CountFuture;
}

/// A record collection within a transaction
pub trait Collection: CursorSource {
    /// Access a secondary index on this collection
    fn index(&self, name: &str) -> StoreResult<Box<dyn CursorSource>>;

    /// Insert a new record; fails if its primary key already exists
    fn add(&self, record: Record) -> WriteFuture;
}

/// A position within a traversal
pub trait Cursor: Send {
    /// Key at this position (index key when traversing an index)
    fn key(&self) -> &Key;

    /// Primary key of the record at this position
    fn primary_key(&self) -> &Key;

    /// Record at this position
    fn value(&self) -> &Record;

    /// Move to the next position in the cursor's direction
    fn advance(self: Box<Self>) -> CursorFuture;
}
