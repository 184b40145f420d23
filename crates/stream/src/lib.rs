//! Stream adapters over cursor-based transactional stores
//!
//! - [`CursorReader`]: a lazy `Stream` of the records in a collection or
//!   index, paced by the consumer
//! - [`RecordWriter`]: a `Sink` that inserts records one by one, each in its
//!   own read-write transaction
//! - [`ConnectionManager`]: opens a named, versioned store
//!
//! Both adapters work against any [`strata_core::StoreEngine`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod reader;
pub mod writer;

pub use connection::ConnectionManager;
pub use reader::{CursorReader, ReaderState};
pub use writer::{RecordWriter, WriterState};
