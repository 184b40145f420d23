//! In-memory engine and connections
//!
//! Stores are kept in a DashMap keyed by store name, each behind its own
//! RwLock, so opening or writing one store never blocks another.
//!
//! # Open semantics
//!
//! - Unknown store: created at version 0, then upgraded to the requested version
//! - Requested version below the stored one: `Connection` error
//! - Version 0: `Connection` error
//! - Engine marked unavailable: `Connection` error
//!
//! Upgrades run the hook against a copy of the store; the copy replaces the
//! store only if the hook succeeds.

use crate::schema::{StoreData, Upgrade};
use crate::transaction::{MemoryTransaction, TxnInner};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use strata_core::{
    Connection, ConnectionId, OpenFuture, StoreEngine, StoreError, StoreResult, Transaction,
    TransactionMode,
};
use tracing::{debug, info};

/// Schema hook run when a store is opened at a higher version
pub type UpgradeHook = dyn Fn(&mut Upgrade<'_>) -> StoreResult<()> + Send + Sync;

struct EngineInner {
    stores: DashMap<String, Arc<RwLock<StoreData>>>,
    upgrade: Option<Arc<UpgradeHook>>,
    available: AtomicBool,
    open_connections: AtomicUsize,
}

/// In-memory store engine
///
/// Clone is cheap; clones share the same stores.
///
/// # Example
///
/// ```ignore
/// let engine = MemoryEngine::with_upgrade(|upgrade| {
///     upgrade.create_collection("items", "id")?;
///     Ok(())
/// });
/// let conn = engine.open("test-db", 1).await?;
/// ```
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<EngineInner>,
}

impl MemoryEngine {
    /// Engine without an upgrade hook; new stores have no collections
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Engine that runs `hook` whenever a store is opened at a higher version
    pub fn with_upgrade<F>(hook: F) -> Self
    where
        F: Fn(&mut Upgrade<'_>) -> StoreResult<()> + Send + Sync + 'static,
    {
        Self::build(Some(Arc::new(hook)))
    }

    fn build(upgrade: Option<Arc<UpgradeHook>>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                stores: DashMap::new(),
                upgrade,
                available: AtomicBool::new(true),
                open_connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Make every subsequent open fail, as when storage is unavailable
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::Release);
    }

    /// Current version of a store, None if it was never opened
    pub fn store_version(&self, name: &str) -> Option<u32> {
        self.inner.stores.get(name).map(|s| s.read().version)
    }

    /// Drop a store and all its data
    ///
    /// Connections already open keep working against the dropped data.
    pub fn delete_store(&self, name: &str) -> bool {
        self.inner.stores.remove(name).is_some()
    }

    /// Number of connections opened and not yet closed
    pub fn open_connections(&self) -> usize {
        self.inner.open_connections.load(Ordering::Acquire)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("store_count", &self.inner.stores.len())
            .field("open_connections", &self.open_connections())
            .finish()
    }
}

impl EngineInner {
    fn open_store(self: &Arc<Self>, name: &str, version: u32) -> StoreResult<MemoryConnection> {
        if !self.available.load(Ordering::Acquire) {
            return Err(StoreError::connection(name, "storage is unavailable"));
        }
        if version == 0 {
            return Err(StoreError::connection(name, "version must be at least 1"));
        }

        let store = Arc::clone(
            self.stores
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(StoreData::default())))
                .value(),
        );

        {
            let mut data = store.write();
            if version < data.version {
                return Err(StoreError::connection(
                    name,
                    format!(
                        "requested version {} is less than existing version {}",
                        version, data.version
                    ),
                ));
            }
            if version > data.version {
                let old_version = data.version;
                let mut staged = data.clone();
                if let Some(hook) = &self.upgrade {
                    hook(&mut Upgrade::new(&mut staged, old_version, version)).map_err(|e| {
                        StoreError::connection(name, format!("upgrade failed: {}", e))
                    })?;
                }
                staged.version = version;
                *data = staged;
                info!(
                    target: "strata::storage",
                    store = name,
                    old_version,
                    version,
                    "store upgraded"
                );
            }
        }

        self.open_connections.fetch_add(1, Ordering::AcqRel);
        let conn = MemoryConnection {
            id: ConnectionId::new(),
            store_name: name.to_string(),
            store,
            engine: Arc::clone(self),
            closed: AtomicBool::new(false),
        };
        debug!(target: "strata::storage", store = name, id = %conn.id, "connection opened");
        Ok(conn)
    }
}

impl StoreEngine for MemoryEngine {
    fn open(&self, name: &str, version: u32) -> OpenFuture {
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        async move {
            tokio::task::yield_now().await;
            let conn = inner.open_store(&name, version)?;
            Ok(Box::new(conn) as Box<dyn Connection>)
        }
        .boxed()
    }
}

/// Connection to one store of a [`MemoryEngine`]
pub struct MemoryConnection {
    id: ConnectionId,
    store_name: String,
    store: Arc<RwLock<StoreData>>,
    engine: Arc<EngineInner>,
    closed: AtomicBool,
}

impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn transaction(
        &self,
        collections: &[&str],
        mode: TransactionMode,
    ) -> StoreResult<Box<dyn Transaction>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::transaction("connection is closed"));
        }
        if collections.is_empty() {
            return Err(StoreError::transaction("transaction scope is empty"));
        }
        let inner = TxnInner::begin(Arc::clone(&self.store), collections, mode)?;
        Ok(Box::new(MemoryTransaction::new(inner)))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.engine.open_connections.fetch_sub(1, Ordering::AcqRel);
            debug!(
                target: "strata::storage",
                store = %self.store_name,
                id = %self.id,
                "connection closed"
            );
        }
    }
}
