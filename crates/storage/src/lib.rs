//! In-memory reference engine for Strata streams
//!
//! `MemoryEngine` implements the `strata_core::engine` contract without any
//! persistence:
//! - named, versioned stores with an upgrade hook for schema changes
//! - read-only transactions over snapshots, read-write transactions that
//!   buffer adds until commit
//! - cursors over collections and secondary indexes in all four directions
//!
//! It backs the test suites of the stream adapters and can serve as an
//! embedded scratch store.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cursor;
pub mod engine;
pub mod schema;
mod transaction;

pub use engine::{MemoryConnection, MemoryEngine, UpgradeHook};
pub use schema::{CollectionBuilder, Upgrade};
pub use transaction::{MemoryCollection, MemoryIndex, MemoryTransaction};
