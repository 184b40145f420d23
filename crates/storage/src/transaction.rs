//! Transactions, collection handles and index handles
//!
//! A transaction snapshots the collections in its scope when it starts.
//! Cursors and counts read that snapshot, overlaid with the transaction's own
//! pending adds. Read-write transactions buffer adds and apply them on commit,
//! after checking again that every key is still free.

use crate::cursor::{filter_range, Entry, MemoryCursor};
use crate::schema::{CollectionData, IndexDef, StoreData};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use strata_core::{
    Collection, CommitFuture, CountFuture, CursorDirection, CursorFuture, CursorSource, Key,
    KeyRange, Record, StoreError, StoreResult, Transaction, TransactionMode, WriteFuture,
};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnStatus {
    Active,
    Committed,
    Aborted,
}

/// A buffered add waiting for commit
#[derive(Debug, Clone)]
struct PendingAdd {
    collection: String,
    key: Key,
    record: Record,
}

/// Shared transaction state, owned by the transaction handle and by every
/// collection, index and cursor created from it
pub(crate) struct TxnInner {
    mode: TransactionMode,
    scope: SmallVec<[String; 2]>,
    store: Arc<RwLock<StoreData>>,
    snapshot: FxHashMap<String, Arc<CollectionData>>,
    status: Mutex<TxnStatus>,
    pending: Mutex<Vec<PendingAdd>>,
}

impl TxnInner {
    pub(crate) fn begin(
        store: Arc<RwLock<StoreData>>,
        collections: &[&str],
        mode: TransactionMode,
    ) -> StoreResult<Arc<Self>> {
        let snapshot = {
            let data = store.read();
            let mut snapshot = FxHashMap::default();
            for name in collections {
                let collection = data
                    .collections
                    .get(*name)
                    .ok_or_else(|| StoreError::collection_not_found(*name))?;
                snapshot.insert(name.to_string(), Arc::clone(collection));
            }
            snapshot
        };
        Ok(Arc::new(TxnInner {
            mode,
            scope: collections.iter().map(|s| s.to_string()).collect(),
            store,
            snapshot,
            status: Mutex::new(TxnStatus::Active),
            pending: Mutex::new(Vec::new()),
        }))
    }

    pub(crate) fn ensure_active(&self) -> StoreResult<()> {
        match *self.status.lock() {
            TxnStatus::Active => Ok(()),
            TxnStatus::Committed => Err(StoreError::transaction("transaction has finished")),
            TxnStatus::Aborted => Err(StoreError::transaction("transaction was aborted")),
        }
    }

    /// Read-only transactions finish once a traversal runs out of positions
    pub(crate) fn traversal_done(&self) {
        if self.mode == TransactionMode::ReadOnly {
            let mut status = self.status.lock();
            if *status == TxnStatus::Active {
                *status = TxnStatus::Committed;
                trace!(target: "strata::storage", "read-only transaction finished");
            }
        }
    }

    fn abort_inner(&self) {
        *self.status.lock() = TxnStatus::Aborted;
        self.pending.lock().clear();
    }

    fn snapshot_of(&self, name: &str) -> StoreResult<&Arc<CollectionData>> {
        self.snapshot
            .get(name)
            .ok_or_else(|| StoreError::collection_not_found(name))
    }

    /// Snapshot of `name` with this transaction's pending adds applied
    fn view(&self, name: &str) -> StoreResult<Arc<CollectionData>> {
        let base = self.snapshot_of(name)?;
        let pending = self.pending.lock();
        if !pending.iter().any(|p| p.collection == name) {
            return Ok(Arc::clone(base));
        }
        let mut merged = CollectionData::clone(base);
        for add in pending.iter().filter(|p| p.collection == name) {
            merged.records.insert(add.key.clone(), add.record.clone());
        }
        Ok(Arc::new(merged))
    }

    /// Check `record` against committed data and pending adds
    fn check_insert(
        &self,
        collection: &str,
        committed: &CollectionData,
        key: &Key,
        record: &Record,
    ) -> StoreResult<()> {
        let guard = self.pending.lock();
        let pending: Vec<&PendingAdd> = guard
            .iter()
            .filter(|p| p.collection == collection)
            .collect();
        if committed.records.contains_key(key) || pending.iter().any(|p| &p.key == key) {
            return Err(StoreError::already_exists(key));
        }
        for def in committed.indexes.values().filter(|d| d.unique) {
            if let Some(index_key) = Key::extract(record, &def.key_path) {
                let taken_pending = pending
                    .iter()
                    .any(|p| Key::extract(&p.record, &def.key_path).as_ref() == Some(&index_key));
                if taken_pending || committed.unique_conflict(def, &index_key) {
                    return Err(StoreError::already_exists(index_key));
                }
            }
        }
        Ok(())
    }

    fn add(&self, collection: &str, record: Record) -> StoreResult<Key> {
        self.ensure_active()?;
        if self.mode == TransactionMode::ReadOnly {
            return Err(StoreError::transaction("cannot add in a read-only transaction"));
        }
        let key_path = self.snapshot_of(collection)?.key_path.clone();
        let key = Key::require(&record, &key_path)?;
        let committed = {
            let data = self.store.read();
            data.collections
                .get(collection)
                .cloned()
                .ok_or_else(|| StoreError::collection_not_found(collection))?
        };
        self.check_insert(collection, &committed, &key, &record)?;
        trace!(target: "strata::storage", collection, %key, "add buffered");
        self.pending.lock().push(PendingAdd {
            collection: collection.to_string(),
            key: key.clone(),
            record,
        });
        Ok(key)
    }

    fn commit(&self) -> StoreResult<()> {
        self.ensure_active()?;
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut data = self.store.write();

        // Keys may have been taken by other transactions since the adds were buffered.
        if let Err(e) = validate_commit(&data, &pending) {
            drop(data);
            self.abort_inner();
            return Err(e);
        }

        let count = pending.len();
        for add in pending {
            if let Some(collection) = data.collections.get_mut(&add.collection) {
                Arc::make_mut(collection).records.insert(add.key, add.record);
            }
        }
        *self.status.lock() = TxnStatus::Committed;
        debug!(target: "strata::storage", count, scope = ?self.scope, "transaction committed");
        Ok(())
    }
}

fn validate_commit(data: &StoreData, pending: &[PendingAdd]) -> StoreResult<()> {
    for (i, add) in pending.iter().enumerate() {
        let committed = data
            .collections
            .get(&add.collection)
            .ok_or_else(|| StoreError::collection_not_found(add.collection.as_str()))?;
        let earlier = &pending[..i];
        let duplicate = committed.records.contains_key(&add.key)
            || earlier
                .iter()
                .any(|p| p.collection == add.collection && p.key == add.key);
        if duplicate {
            return Err(StoreError::already_exists(&add.key));
        }
        for def in committed.indexes.values().filter(|d| d.unique) {
            let Some(index_key) = Key::extract(&add.record, &def.key_path) else {
                continue;
            };
            let taken = earlier.iter().any(|p| {
                p.collection == add.collection
                    && Key::extract(&p.record, &def.key_path).as_ref() == Some(&index_key)
            });
            if taken || committed.unique_conflict(def, &index_key) {
                return Err(StoreError::already_exists(index_key));
            }
        }
    }
    Ok(())
}

/// Transaction handle returned by a connection
pub struct MemoryTransaction {
    inner: Arc<TxnInner>,
}

impl MemoryTransaction {
    pub(crate) fn new(inner: Arc<TxnInner>) -> Self {
        Self { inner }
    }
}

impl Transaction for MemoryTransaction {
    fn collection(&self, name: &str) -> StoreResult<Box<dyn Collection>> {
        self.inner.snapshot_of(name)?;
        Ok(Box::new(MemoryCollection {
            txn: Arc::clone(&self.inner),
            name: name.to_string(),
        }))
    }

    fn is_finished(&self) -> bool {
        *self.inner.status.lock() != TxnStatus::Active
    }

    fn abort(&self) -> StoreResult<()> {
        self.inner.ensure_active()?;
        self.inner.abort_inner();
        debug!(target: "strata::storage", scope = ?self.inner.scope, "transaction aborted");
        Ok(())
    }

    fn commit(&self) -> CommitFuture {
        let inner = Arc::clone(&self.inner);
        async move {
            tokio::task::yield_now().await;
            inner.commit()
        }
        .boxed()
    }
}

/// Collection handle within a transaction
pub struct MemoryCollection {
    txn: Arc<TxnInner>,
    name: String,
}

impl CursorSource for MemoryCollection {
    fn open_cursor(&self, range: Option<&KeyRange>, direction: CursorDirection) -> CursorFuture {
        let txn = Arc::clone(&self.txn);
        let name = self.name.clone();
        let range = range.cloned();
        async move {
            tokio::task::yield_now().await;
            txn.ensure_active()?;
            let view = txn.view(&name)?;
            let entries = view
                .records
                .iter()
                .map(|(k, v)| Entry {
                    key: k.clone(),
                    primary_key: k.clone(),
                    value: v.clone(),
                })
                .collect();
            let entries = filter_range(entries, range.as_ref());
            Ok(MemoryCursor::start(txn, entries, direction))
        }
        .boxed()
    }

    fn count(&self, range: Option<&KeyRange>) -> CountFuture {
        let txn = Arc::clone(&self.txn);
        let name = self.name.clone();
        let range = range.cloned();
        async move {
            tokio::task::yield_now().await;
            txn.ensure_active()?;
            let view = txn.view(&name)?;
            let count = match &range {
                Some(range) => view.records.keys().filter(|k| range.contains(k)).count(),
                None => view.records.len(),
            };
            Ok(count as u64)
        }
        .boxed()
    }
}

impl Collection for MemoryCollection {
    fn index(&self, name: &str) -> StoreResult<Box<dyn CursorSource>> {
        let def = self
            .txn
            .snapshot_of(&self.name)?
            .indexes
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::index_not_found(name))?;
        Ok(Box::new(MemoryIndex {
            txn: Arc::clone(&self.txn),
            collection: self.name.clone(),
            def,
        }))
    }

    fn add(&self, record: Record) -> WriteFuture {
        let txn = Arc::clone(&self.txn);
        let name = self.name.clone();
        async move {
            tokio::task::yield_now().await;
            let result = txn.add(&name, record);
            if result.is_err() && txn.ensure_active().is_ok() {
                txn.abort_inner();
            }
            result
        }
        .boxed()
    }
}

/// Secondary index handle within a transaction
pub struct MemoryIndex {
    txn: Arc<TxnInner>,
    collection: String,
    def: IndexDef,
}

impl MemoryIndex {
    /// Index entries sorted by `(index key, primary key)`
    fn entries(&self) -> StoreResult<Vec<Entry>> {
        let view = self.txn.view(&self.collection)?;
        let mut entries: Vec<Entry> = view
            .records
            .iter()
            .filter_map(|(pk, record)| {
                Key::extract(record, &self.def.key_path).map(|key| Entry {
                    key,
                    primary_key: pk.clone(),
                    value: record.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then_with(|| a.primary_key.cmp(&b.primary_key))
        });
        Ok(entries)
    }
}

impl CursorSource for MemoryIndex {
    fn open_cursor(&self, range: Option<&KeyRange>, direction: CursorDirection) -> CursorFuture {
        let txn = Arc::clone(&self.txn);
        let entries = self.txn.ensure_active().and_then(|_| self.entries());
        let range = range.cloned();
        async move {
            tokio::task::yield_now().await;
            let entries = filter_range(entries?, range.as_ref());
            Ok(MemoryCursor::start(txn, entries, direction))
        }
        .boxed()
    }

    fn count(&self, range: Option<&KeyRange>) -> CountFuture {
        let entries = self.txn.ensure_active().and_then(|_| self.entries());
        let range = range.cloned();
        async move {
            tokio::task::yield_now().await;
            Ok(filter_range(entries?, range.as_ref()).len() as u64)
        }
        .boxed()
    }
}
