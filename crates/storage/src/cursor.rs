//! Cursor traversal over collection and index snapshots
//!
//! A cursor is opened over a sorted slice of [`Entry`] values taken from the
//! transaction's view of a collection. The direction is resolved up front into
//! a list of positions, so advancing is a bounds check plus an index bump.
//!
//! # Unique directions
//!
//! Entries are sorted by `(key, primary_key)`. `nextunique` yields the first
//! entry of every run of equal keys. `prevunique` walks the runs backwards but
//! still yields the first entry of each run, i.e. the record with the lowest
//! primary key for that key.

use crate::transaction::TxnInner;
use futures::FutureExt;
use std::sync::Arc;
use strata_core::{Cursor, CursorDirection, CursorFuture, Key, KeyRange, Record};

/// One position a cursor can visit
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) key: Key,
    pub(crate) primary_key: Key,
    pub(crate) value: Record,
}

/// Keep only entries whose key falls in `range`
pub(crate) fn filter_range(entries: Vec<Entry>, range: Option<&KeyRange>) -> Vec<Entry> {
    match range {
        Some(range) => entries
            .into_iter()
            .filter(|e| range.contains(&e.key))
            .collect(),
        None => entries,
    }
}

/// Positions visited by a cursor, in visiting order
///
/// `entries` must be sorted by `(key, primary_key)`.
pub(crate) fn traversal_order(entries: &[Entry], direction: CursorDirection) -> Vec<usize> {
    let run_starts = || {
        (0..entries.len()).filter(move |&i| i == 0 || entries[i].key != entries[i - 1].key)
    };
    let mut order: Vec<usize> = if direction.is_unique() {
        run_starts().collect()
    } else {
        (0..entries.len()).collect()
    };
    if direction.is_reverse() {
        order.reverse();
    }
    order
}

/// Cursor over a snapshot of entries
pub(crate) struct MemoryCursor {
    txn: Arc<TxnInner>,
    entries: Arc<[Entry]>,
    order: Arc<[usize]>,
    pos: usize,
}

impl MemoryCursor {
    /// Resolve the first position over `entries`, or None if there is nothing to visit
    pub(crate) fn start(
        txn: Arc<TxnInner>,
        entries: Vec<Entry>,
        direction: CursorDirection,
    ) -> Option<Box<dyn Cursor>> {
        let order = traversal_order(&entries, direction);
        if order.is_empty() {
            txn.traversal_done();
            return None;
        }
        Some(Box::new(MemoryCursor {
            txn,
            entries: entries.into(),
            order: order.into(),
            pos: 0,
        }))
    }

    fn current(&self) -> &Entry {
        &self.entries[self.order[self.pos]]
    }
}

impl Cursor for MemoryCursor {
    fn key(&self) -> &Key {
        &self.current().key
    }

    fn primary_key(&self) -> &Key {
        &self.current().primary_key
    }

    fn value(&self) -> &Record {
        &self.current().value
    }

    fn advance(mut self: Box<Self>) -> CursorFuture {
        async move {
            tokio::task::yield_now().await;
            self.txn.ensure_active()?;
            self.pos += 1;
            if self.pos >= self.order.len() {
                self.txn.traversal_done();
                return Ok(None);
            }
            Ok(Some(self as Box<dyn Cursor>))
        }
        .boxed()
    }
}
