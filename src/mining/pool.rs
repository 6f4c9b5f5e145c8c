//! Unconfirmed transaction pool
//!
//! Process-wide pending set, deduplicated by transaction identifier and
//! kept in arrival order. Every mutation fires a change notification; the
//! miner subscribes to it so any pool mutation invalidates an in-flight
//! consensus search. Reads hand out point-in-time copies, so iteration is
//! never invalidated by concurrent miner or network access.

use crate::core::Transaction;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Default)]
struct PoolInner {
    /// Pending transactions in arrival order
    order: Vec<Transaction>,
    /// Identifiers present in `order`
    ids: HashSet<String>,
}

/// Deduplicated pool of transactions waiting for a block
pub struct UnconfirmedPool {
    inner: Mutex<PoolInner>,
    changes: watch::Sender<u64>,
}

impl Default for UnconfirmedPool {
    fn default() -> Self {
        Self::new()
    }
}

impl UnconfirmedPool {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Mutex::new(PoolInner::default()),
            changes,
        }
    }

    /// Insert a transaction. Returns false (and stays silent) when a
    /// transaction with the same identifier is already pending.
    pub fn add(&self, txn: Transaction) -> bool {
        {
            let mut inner = self.inner.lock().expect("pool lock poisoned");
            if inner.ids.contains(&txn.id) {
                return false;
            }
            inner.ids.insert(txn.id.clone());
            inner.order.push(txn);
        }
        self.notify();
        true
    }

    /// Drop every pending transaction matching any of the given ones by
    /// identifier. Notifies even when nothing matched: callers treat this
    /// as "pool state may have changed".
    pub fn remove(&self, txns: &[Transaction]) {
        {
            let confirmed: HashSet<&str> = txns.iter().map(|t| t.id.as_str()).collect();
            let mut inner = self.inner.lock().expect("pool lock poisoned");
            inner.order.retain(|t| !confirmed.contains(t.id.as_str()));
            let remaining: HashSet<String> = inner.order.iter().map(|t| t.id.clone()).collect();
            inner.ids = remaining;
        }
        self.notify();
    }

    /// Point-in-time copy of the pending set
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.inner.lock().expect("pool lock poisoned").order.clone()
    }

    pub fn contains(&self, txn_id: &str) -> bool {
        self.inner
            .lock()
            .expect("pool lock poisoned")
            .ids
            .contains(txn_id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("pool lock poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to change notifications. The receiver wakes on every pool
    /// mutation after the subscription.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }
}
