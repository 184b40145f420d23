//! Connection handling shared by readers and writers
//!
//! [`ConnectionManager`] turns the engine's open call into a single outcome
//! and logs it. Upgrade notifications never reach the adapters: the engine
//! runs its own upgrade hook before the open future resolves.

use futures::FutureExt;
use std::sync::Arc;
use strata_core::{Connection, OpenFuture, StoreEngine, StreamOptions, Transaction};
use tracing::{debug, warn};

/// Opens connections to one named, versioned store
///
/// One open attempt per call; failures are never retried.
#[derive(Clone)]
pub struct ConnectionManager {
    engine: Arc<dyn StoreEngine>,
    store: String,
    version: u32,
}

impl ConnectionManager {
    /// Manager for `store` at `version`
    pub fn new(engine: Arc<dyn StoreEngine>, store: impl Into<String>, version: u32) -> Self {
        Self {
            engine,
            store: store.into(),
            version,
        }
    }

    /// Manager for the store named in `options`
    pub fn from_options(engine: Arc<dyn StoreEngine>, options: &StreamOptions) -> Self {
        Self::new(engine, options.store.clone(), options.store_version)
    }

    /// Store name
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Store version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Open a connection
    pub fn open(&self) -> OpenFuture {
        debug!(
            target: "strata::stream",
            store = %self.store,
            version = self.version,
            "opening store"
        );
        let request = self.engine.open(&self.store, self.version);
        let store = self.store.clone();
        async move {
            match request.await {
                Ok(connection) => {
                    debug!(
                        target: "strata::stream",
                        store = %store,
                        id = %connection.id(),
                        "store opened"
                    );
                    Ok(connection)
                }
                Err(e) => {
                    warn!(
                        target: "strata::stream",
                        store = %store,
                        error = %e,
                        "store open failed"
                    );
                    Err(e)
                }
            }
        }
        .boxed()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("store", &self.store)
            .field("version", &self.version)
            .finish()
    }
}

/// Owns a connection and closes it exactly once, on `close` or on drop
pub(crate) struct ConnectionGuard {
    connection: Option<Box<dyn Connection>>,
}

impl ConnectionGuard {
    pub(crate) fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    pub(crate) fn get(&self) -> Option<&dyn Connection> {
        self.connection.as_deref()
    }

    pub(crate) fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!(target: "strata::stream", id = %connection.id(), "closing connection");
            connection.close();
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Abort `transaction` unless the engine already finished it
///
/// Aborting a finished transaction is an engine error, so the state is checked
/// first. A failed abort is logged and otherwise ignored: the caller is already
/// tearing down.
pub(crate) fn abort_if_live(transaction: &dyn Transaction) {
    if transaction.is_finished() {
        return;
    }
    if let Err(e) = transaction.abort() {
        warn!(target: "strata::stream", error = %e, "transaction abort failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::TransactionMode;
    use strata_storage::MemoryEngine;

    fn engine() -> MemoryEngine {
        MemoryEngine::with_upgrade(|upgrade| {
            upgrade.create_collection("items", "id")?;
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_open_uses_store_and_version() {
        let engine = engine();
        let manager = ConnectionManager::new(Arc::new(engine.clone()), "db", 4);
        assert_eq!(manager.store(), "db");
        assert_eq!(manager.version(), 4);

        let connection = manager.open().await.unwrap();
        assert_eq!(engine.store_version("db"), Some(4));
        connection.close();
        assert_eq!(engine.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_single_outcome() {
        let engine = engine();
        engine.set_available(false);
        let manager = ConnectionManager::from_options(
            Arc::new(engine.clone()),
            &StreamOptions::new("db", "items"),
        );
        let err = manager.open().await.err().unwrap();
        assert!(matches!(err, strata_core::StoreError::Connection { .. }));
        assert_eq!(engine.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_guard_closes_once() {
        let engine = engine();
        let manager = ConnectionManager::new(Arc::new(engine.clone()), "db", 1);

        let mut guard = ConnectionGuard::new(manager.open().await.unwrap());
        assert!(guard.get().is_some());
        guard.close();
        assert!(guard.get().is_none());
        guard.close();
        assert_eq!(engine.open_connections(), 0);

        let guard = ConnectionGuard::new(manager.open().await.unwrap());
        assert_eq!(engine.open_connections(), 1);
        drop(guard);
        assert_eq!(engine.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_abort_if_live_skips_finished_transactions() {
        let engine = engine();
        let manager = ConnectionManager::new(Arc::new(engine.clone()), "db", 1);
        let connection = manager.open().await.unwrap();

        let transaction = connection
            .transaction(&["items"], TransactionMode::ReadWrite)
            .unwrap();
        abort_if_live(&*transaction);
        assert!(transaction.is_finished());
        // second call sees the finished state and does nothing
        abort_if_live(&*transaction);
        connection.close();
    }
}
