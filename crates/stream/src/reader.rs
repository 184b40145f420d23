//! Cursor-backed record stream
//!
//! [`CursorReader`] is a lazy, finite, non-restartable `Stream` of records.
//! Nothing is opened until the first poll. From then on the reader walks an
//! explicit state machine:
//!
//! ```text
//! Idle -> Connecting -> CursorOpening -> Streaming -> Completed
//!                                                  \-> Errored
//!                                                  \-> Destroyed
//! ```
//!
//! ## Backpressure
//!
//! The engine hands out one position per cursor advance, and the reader only
//! advances when it is polled again after yielding a record. A consumer that
//! stops polling therefore stops the traversal. Polls that arrive while a
//! request is in flight re-poll that same request; demand is never counted.
//!
//! ## Teardown
//!
//! Completion, failure and [`CursorReader::destroy`] all release resources
//! before the terminal item is produced: the cursor and any in-flight request
//! are dropped, a live transaction is aborted, and the connection is closed.
//! Dropping a reader destroys it.

use crate::connection::{abort_if_live, ConnectionManager};
use futures::stream::FusedStream;
use futures::{ready, FutureExt, Stream};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use strata_core::{
    Connection, Cursor, CursorFuture, OpenFuture, Record, StoreEngine, StoreError, StoreResult,
    StreamOptions, Transaction, TransactionMode,
};
use tracing::{debug, trace, warn};

/// Observable lifecycle state of a [`CursorReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Constructed, never polled
    Idle,
    /// Waiting for the store to open
    Connecting,
    /// Waiting for the first cursor position
    CursorOpening,
    /// Yielding records
    Streaming,
    /// Cursor exhausted
    Completed,
    /// An error was yielded
    Errored,
    /// Cancelled through `destroy`
    Destroyed,
}

impl ReaderState {
    /// True once no further records can be produced
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReaderState::Completed | ReaderState::Errored | ReaderState::Destroyed
        )
    }
}

enum Phase {
    Idle,
    Connecting(OpenFuture),
    CursorOpening(CursorFuture),
    /// `step` is the continuation in flight, if any
    Streaming {
        step: Option<CursorFuture>,
    },
    Completed,
    Errored,
    Destroyed,
}

/// Lazy stream of the records in a collection or index
///
/// # Example
///
/// ```ignore
/// use futures::TryStreamExt;
///
/// let reader = CursorReader::new(engine, StreamOptions::new("test-db", "items"));
/// let records: Vec<Record> = reader.try_collect().await?;
/// ```
pub struct CursorReader {
    options: StreamOptions,
    manager: ConnectionManager,
    phase: Phase,
    connection: Option<Box<dyn Connection>>,
    transaction: Option<Box<dyn Transaction>>,
    cursor: Option<Box<dyn Cursor>>,
    emitted: u64,
}

impl CursorReader {
    /// Create a reader; no resource is acquired until the first poll
    pub fn new(engine: Arc<dyn StoreEngine>, options: StreamOptions) -> Self {
        let manager = ConnectionManager::from_options(engine, &options);
        Self {
            options,
            manager,
            phase: Phase::Idle,
            connection: None,
            transaction: None,
            cursor: None,
            emitted: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ReaderState {
        match self.phase {
            Phase::Idle => ReaderState::Idle,
            Phase::Connecting(_) => ReaderState::Connecting,
            Phase::CursorOpening(_) => ReaderState::CursorOpening,
            Phase::Streaming { .. } => ReaderState::Streaming,
            Phase::Completed => ReaderState::Completed,
            Phase::Errored => ReaderState::Errored,
            Phase::Destroyed => ReaderState::Destroyed,
        }
    }

    /// Number of records yielded so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Cancel the reader
    ///
    /// Drops the cursor and any pending request, aborts a live transaction and
    /// closes the connection. The stream then ends. Calling this on a reader
    /// that already reached a terminal state does nothing.
    pub fn destroy(&mut self) {
        if self.state().is_terminal() {
            return;
        }
        if let Phase::Idle = self.phase {
            // Never polled, so nothing was acquired.
            self.phase = Phase::Destroyed;
            return;
        }
        debug!(
            target: "strata::stream",
            store = %self.options.store,
            collection = %self.options.collection,
            emitted = self.emitted,
            "reader destroyed"
        );
        self.phase = Phase::Destroyed;
        self.release();
    }

    /// Start the read-only transaction and request the first cursor position
    fn start_traversal(&mut self) -> StoreResult<CursorFuture> {
        let options = &self.options;
        let connection = self
            .connection
            .as_deref()
            .ok_or_else(|| StoreError::transaction("reader has no open connection"))?;
        let transaction =
            connection.transaction(&[options.collection.as_str()], TransactionMode::ReadOnly)?;
        let transaction = self.transaction.insert(transaction);
        let collection = transaction.collection(&options.collection)?;
        let range = options.range.as_ref();
        let request = match &options.index {
            Some(index) => collection.index(index)?.open_cursor(range, options.direction),
            None => collection.open_cursor(range, options.direction),
        };
        debug!(
            target: "strata::stream",
            collection = %options.collection,
            index = ?options.index,
            direction = %options.direction,
            "cursor requested"
        );
        Ok(request)
    }

    /// Handle the outcome of a cursor open or continuation
    fn on_step(
        &mut self,
        step: StoreResult<Option<Box<dyn Cursor>>>,
    ) -> Option<StoreResult<Record>> {
        match step {
            Ok(Some(cursor)) => {
                let record = cursor.value().clone();
                trace!(
                    target: "strata::stream",
                    key = %cursor.key(),
                    primary_key = %cursor.primary_key(),
                    "record yielded"
                );
                self.cursor = Some(cursor);
                self.phase = Phase::Streaming { step: None };
                self.emitted += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                self.complete();
                None
            }
            Err(e) => Some(Err(self.fail(e))),
        }
    }

    fn complete(&mut self) {
        // The engine finishes a read-only transaction once its cursor runs out.
        self.transaction = None;
        self.cursor = None;
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.phase = Phase::Completed;
        debug!(
            target: "strata::stream",
            collection = %self.options.collection,
            emitted = self.emitted,
            "reader completed"
        );
    }

    fn fail(&mut self, error: StoreError) -> StoreError {
        warn!(
            target: "strata::stream",
            store = %self.options.store,
            collection = %self.options.collection,
            error = %error,
            "reader failed"
        );
        self.phase = Phase::Errored;
        self.release();
        error
    }

    fn release(&mut self) {
        self.cursor = None;
        if let Some(transaction) = self.transaction.take() {
            abort_if_live(&*transaction);
        }
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Stream for CursorReader {
    type Item = StoreResult<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.phase {
                Phase::Idle => {
                    this.phase = Phase::Connecting(this.manager.open());
                }
                Phase::Connecting(request) => {
                    let connection = match ready!(request.poll_unpin(cx)) {
                        Ok(connection) => connection,
                        Err(e) => return Poll::Ready(Some(Err(this.fail(e)))),
                    };
                    this.connection = Some(connection);
                    match this.start_traversal() {
                        Ok(request) => this.phase = Phase::CursorOpening(request),
                        Err(e) => return Poll::Ready(Some(Err(this.fail(e)))),
                    }
                }
                Phase::CursorOpening(request)
                | Phase::Streaming {
                    step: Some(request),
                } => {
                    let step = ready!(request.poll_unpin(cx));
                    return Poll::Ready(this.on_step(step));
                }
                Phase::Streaming { step: None } => match this.cursor.take() {
                    Some(cursor) => {
                        this.phase = Phase::Streaming {
                            step: Some(cursor.advance()),
                        };
                    }
                    None => {
                        this.complete();
                        return Poll::Ready(None);
                    }
                },
                Phase::Completed | Phase::Errored | Phase::Destroyed => {
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for CursorReader {
    fn is_terminated(&self) -> bool {
        self.state().is_terminal()
    }
}

impl Drop for CursorReader {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for CursorReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorReader")
            .field("options", &self.options)
            .field("state", &self.state())
            .field("emitted", &self.emitted)
            .finish()
    }
}
