//! Stream and sink adapters over cursor-based transactional stores
//!
//! ```ignore
//! use futures::{SinkExt, TryStreamExt};
//! use stratastream::{CursorReader, MemoryEngine, RecordWriter, StreamOptions};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(MemoryEngine::with_upgrade(|upgrade| {
//!     upgrade.create_collection("items", "id")?;
//!     Ok(())
//! }));
//! let options = StreamOptions::new("app", "items");
//!
//! let mut writer = RecordWriter::new(engine.clone(), options.clone());
//! writer.send(serde_json::json!({"id": 1})).await?;
//! writer.close().await?;
//!
//! let records: Vec<_> = CursorReader::new(engine, options).try_collect().await?;
//! ```

#![warn(missing_docs)]

mod types;

pub use types::*;

