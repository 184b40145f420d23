//! Stream Conformance Test Suite
//!
//! End-to-end checks of the reader and writer adapters against the in-memory
//! engine.
//!
//! ## Test Groups
//!
//! - **read_stream**: traversal order, index reads, cancellation, failures
//! - **write_stream**: sequential inserts, constraint failures, connection modes
//! - **round_trip**: records written by a writer and read back by a reader
//! - **config**: options loaded from TOML
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test stream_conformance
//! ```

mod test_utils;

mod config;
mod read_stream;
mod round_trip;
mod write_stream;
