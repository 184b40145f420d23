//! Sequential record sink
//!
//! [`RecordWriter`] inserts one record at a time. `poll_ready` resolves only
//! after the previous record's transaction committed, so `send_all` and
//! `forward` pace the producer by the store.
//!
//! Every record gets its own read-write transaction. With
//! [`WriteMode::PerRecord`] it also gets its own connection; with
//! [`WriteMode::SharedConnection`] the connection opened by the first record is
//! reused until the writer is closed, fails or is dropped.
//!
//! Records are committed independently. When record n fails, records before it
//! stay in the store.

use crate::connection::{abort_if_live, ConnectionGuard, ConnectionManager};
use futures::{ready, FutureExt, Sink};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use strata_core::{
    Connection, OpenFuture, Record, StoreEngine, StoreError, StoreResult, StreamOptions,
    TransactionMode, WriteFuture, WriteMode,
};
use tracing::{debug, trace, warn};

/// Observable lifecycle state of a [`RecordWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting the next record
    Ready,
    /// An insert is in flight
    Writing,
    /// An insert failed; the error was surfaced
    Errored,
    /// Closed through `poll_close`
    Closed,
}

enum Inflight {
    /// Shared connection being opened for the queued record
    Connecting(OpenFuture),
    Inserting(WriteFuture),
}

/// Start a read-write transaction, add `record` and commit
///
/// The returned future aborts the transaction if the add fails. A failed
/// commit is finished by the engine.
fn begin_insert(
    connection: &dyn Connection,
    collection: &str,
    record: Record,
) -> StoreResult<WriteFuture> {
    let transaction = connection.transaction(&[collection], TransactionMode::ReadWrite)?;
    let target = match transaction.collection(collection) {
        Ok(target) => target,
        Err(e) => {
            abort_if_live(&*transaction);
            return Err(e);
        }
    };
    let add = target.add(record);
    Ok(async move {
        match add.await {
            Ok(key) => {
                transaction.commit().await?;
                Ok(key)
            }
            Err(e) => {
                abort_if_live(&*transaction);
                Err(e)
            }
        }
    }
    .boxed())
}

/// Open a connection, insert `record` and close the connection again
fn insert_with_own_connection(
    manager: &ConnectionManager,
    collection: String,
    record: Record,
) -> WriteFuture {
    let open = manager.open();
    async move {
        let mut guard = ConnectionGuard::new(open.await?);
        let request = match guard.get() {
            Some(connection) => begin_insert(connection, &collection, record),
            None => Err(StoreError::StreamClosed),
        };
        let result = match request {
            Ok(request) => request.await,
            Err(e) => Err(e),
        };
        guard.close();
        result
    }
    .boxed()
}

/// Sink that inserts records into a collection one by one
///
/// ```ignore
/// use futures::SinkExt;
///
/// let mut writer = RecordWriter::new(engine, StreamOptions::new("test-db", "items"));
/// writer.send(json!({"id": 1, "value": "first"})).await?;
/// writer.close().await?;
/// ```
pub struct RecordWriter {
    options: StreamOptions,
    manager: ConnectionManager,
    state: WriterState,
    inflight: Option<Inflight>,
    /// Record waiting for the shared connection to open
    queued: Option<Record>,
    shared: Option<ConnectionGuard>,
    inserted: u64,
}

impl RecordWriter {
    /// Create a writer; the first connection is opened by the first record
    pub fn new(engine: Arc<dyn StoreEngine>, options: StreamOptions) -> Self {
        let manager = ConnectionManager::from_options(engine, &options);
        Self {
            options,
            manager,
            state: WriterState::Ready,
            inflight: None,
            queued: None,
            shared: None,
            inserted: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Number of committed records
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    fn ensure_open(&self) -> StoreResult<()> {
        match self.state {
            WriterState::Errored | WriterState::Closed => Err(StoreError::StreamClosed),
            WriterState::Ready | WriterState::Writing => Ok(()),
        }
    }

    fn begin(&mut self, record: Record) -> StoreResult<()> {
        let inflight = match self.options.write_mode {
            WriteMode::PerRecord => Inflight::Inserting(insert_with_own_connection(
                &self.manager,
                self.options.collection.clone(),
                record,
            )),
            WriteMode::SharedConnection => match self.shared.as_ref().and_then(|g| g.get()) {
                Some(connection) => Inflight::Inserting(begin_insert(
                    connection,
                    &self.options.collection,
                    record,
                )?),
                None => {
                    self.queued = Some(record);
                    Inflight::Connecting(self.manager.open())
                }
            },
        };
        self.inflight = Some(inflight);
        self.state = WriterState::Writing;
        Ok(())
    }

    /// Drive the in-flight insert to completion
    fn poll_inflight(&mut self, cx: &mut Context<'_>) -> Poll<StoreResult<()>> {
        loop {
            match self.inflight.as_mut() {
                None => return Poll::Ready(Ok(())),
                Some(Inflight::Connecting(request)) => {
                    let opened = ready!(request.poll_unpin(cx));
                    self.inflight = None;
                    let guard = self.shared.insert(ConnectionGuard::new(opened?));
                    let record = self.queued.take().ok_or(StoreError::StreamClosed)?;
                    let connection = guard.get().ok_or(StoreError::StreamClosed)?;
                    let request = begin_insert(connection, &self.options.collection, record)?;
                    self.inflight = Some(Inflight::Inserting(request));
                }
                Some(Inflight::Inserting(request)) => {
                    let key = ready!(request.poll_unpin(cx));
                    self.inflight = None;
                    let key = key?;
                    self.inserted += 1;
                    trace!(
                        target: "strata::stream",
                        collection = %self.options.collection,
                        key = %key,
                        "record inserted"
                    );
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }

    /// Poll the in-flight insert, moving to `Errored` if it fails
    fn drive(&mut self, cx: &mut Context<'_>) -> Poll<StoreResult<()>> {
        if let Err(e) = ready!(self.poll_inflight(cx)) {
            return Poll::Ready(Err(self.fail(e)));
        }
        self.state = WriterState::Ready;
        Poll::Ready(Ok(()))
    }

    fn fail(&mut self, error: StoreError) -> StoreError {
        warn!(
            target: "strata::stream",
            store = %self.options.store,
            collection = %self.options.collection,
            inserted = self.inserted,
            error = %error,
            "writer failed"
        );
        self.inflight = None;
        self.queued = None;
        self.release();
        self.state = WriterState::Errored;
        error
    }

    fn release(&mut self) {
        if let Some(mut guard) = self.shared.take() {
            guard.close();
        }
    }
}

impl Sink<Record> for RecordWriter {
    type Error = StoreError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        this.ensure_open()?;
        this.drive(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Record) -> Result<(), Self::Error> {
        let this = self.get_mut();
        this.ensure_open()?;
        if this.inflight.is_some() {
            return Err(StoreError::WriteInFlight);
        }
        this.begin(item).map_err(|e| this.fail(e))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        if this.state == WriterState::Closed {
            return Poll::Ready(Ok(()));
        }
        this.ensure_open()?;
        this.drive(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.get_mut();
        if this.state == WriterState::Closed {
            return Poll::Ready(Ok(()));
        }
        this.ensure_open()?;
        ready!(this.drive(cx))?;
        this.release();
        this.state = WriterState::Closed;
        debug!(
            target: "strata::stream",
            collection = %this.options.collection,
            inserted = this.inserted,
            "writer closed"
        );
        Poll::Ready(Ok(()))
    }
}

impl std::fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("inserted", &self.inserted)
            .finish()
    }
}
