//! Core types for Strata streams
//!
//! This crate defines the vocabulary shared by storage engines and the stream
//! adapters:
//! - Key, KeyRange: ordered keys and cursor bounds
//! - StreamOptions, CursorDirection, WriteMode: adapter configuration
//! - StoreError, StoreResult: the error taxonomy
//! - engine: the trait contract a store implements

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod key;
pub mod options;

pub use engine::{
    Collection, CommitFuture, Connection, ConnectionId, CountFuture, Cursor, CursorFuture,
    CursorSource, OpenFuture, Record, StoreEngine, Transaction, TransactionMode, WriteFuture,
};
pub use error::{ResourceKind, StoreError, StoreResult};
pub use key::{Key, KeyRange};
pub use options::{CursorDirection, StreamOptions, WriteMode};
