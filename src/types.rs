//! Public types for the Strata stream API.
//!
//! This module re-exports types from the internal crates with a flat interface.

// ============================================================================
// Configuration
// ============================================================================

pub use strata_core::{CursorDirection, StreamOptions, WriteMode};

// ============================================================================
// Keys and records
// ============================================================================

pub use strata_core::{Key, KeyRange, Record};

// ============================================================================
// Errors
// ============================================================================

pub use strata_core::{ResourceKind, StoreError, StoreResult};

// ============================================================================
// Engine contract
// ============================================================================

pub use strata_core::{
    Collection, Connection, ConnectionId, Cursor, CursorSource, StoreEngine, Transaction,
    TransactionMode,
};

// ============================================================================
// Reference engine
// ============================================================================

pub use strata_storage::{CollectionBuilder, MemoryEngine, Upgrade};

// ============================================================================
// Adapters
// ============================================================================

pub use strata_stream::{ConnectionManager, CursorReader, ReaderState, RecordWriter, WriterState};
