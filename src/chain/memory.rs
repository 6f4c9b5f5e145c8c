//! In-memory chain store
//!
//! Height-indexed main chain plus an identifier-keyed fork arena. Fork
//! ancestry is walked by previous-block pointer lookups, never by owned
//! parent references. All mutation happens under one interior lock so a
//! commit lands together with its instruction records.

use crate::chain::store::{ChainStore, StoreError};
use crate::core::{Block, BlockHeader};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    /// Canonical chain, one block per height
    main: BTreeMap<u64, Block>,
    /// Main-chain identifier -> height
    main_ids: HashMap<String, u64>,
    /// Detached blocks keyed by identifier
    forks: HashMap<String, Block>,
    /// Replay index over main-chain instruction identifiers
    instructions: HashSet<String>,
}

/// In-memory [`ChainStore`] implementation
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export the full contents for snapshot persistence
    pub fn export(&self) -> (Vec<Block>, Vec<Block>) {
        let inner = self.inner.lock().expect("store lock poisoned");
        let main = inner.main.values().cloned().collect();
        let forks = inner.forks.values().cloned().collect();
        (main, forks)
    }

    /// Rebuild a store from exported contents, restoring derived indexes
    pub fn restore(main: Vec<Block>, forks: Vec<Block>) -> Result<Self, StoreError> {
        let store = Self::new();

        let mut ordered = main;
        ordered.sort_by_key(|b| b.header.height);
        for block in ordered {
            store.add_block(block)?;
        }
        for block in forks {
            store.add_fork_block(block)?;
        }

        Ok(store)
    }

    fn index_instructions(inner: &mut Inner, block: &Block) {
        for txn in &block.transactions {
            for instruction in &txn.instructions {
                inner.instructions.insert(instruction.id.clone());
            }
        }
    }

    fn unindex_instructions(inner: &mut Inner, block: &Block) {
        for txn in &block.transactions {
            for instruction in &txn.instructions {
                inner.instructions.remove(&instruction.id);
            }
        }
    }
}

impl ChainStore for MemoryStore {
    fn add_block(&self, block: Block) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let id = block.header.id.clone();
        if inner.main_ids.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }

        match inner.main.last_key_value() {
            Some((&tip_height, tip)) => {
                if block.header.height != tip_height + 1 {
                    return Err(StoreError::NotAtTip {
                        got: block.header.height,
                        tip: tip_height,
                    });
                }
                if block.header.previous_id != tip.header.id {
                    return Err(StoreError::BrokenLink);
                }
            }
            None => {
                if block.header.height != 0 {
                    return Err(StoreError::NotAtTip {
                        got: block.header.height,
                        tip: 0,
                    });
                }
            }
        }

        Self::index_instructions(&mut inner, &block);
        inner.forks.remove(&id);
        inner.main_ids.insert(id, block.header.height);
        inner.main.insert(block.header.height, block);
        Ok(())
    }

    fn contains_block(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .main_ids
            .contains_key(id)
    }

    fn contains_fork_block(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .forks
            .contains_key(id)
    }

    fn is_empty(&self) -> bool {
        self.inner.lock().expect("store lock poisoned").main.is_empty()
    }

    fn best_header(&self) -> Option<BlockHeader> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner.main.last_key_value().map(|(_, b)| b.header.clone())
    }

    fn header(&self, id: &str) -> Option<BlockHeader> {
        self.block(id).map(|b| b.header)
    }

    fn block(&self, id: &str) -> Option<Block> {
        let inner = self.inner.lock().expect("store lock poisoned");
        if let Some(height) = inner.main_ids.get(id) {
            return inner.main.get(height).cloned();
        }
        inner.forks.get(id).cloned()
    }

    fn header_at(&self, height: u64) -> Option<BlockHeader> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner.main.get(&height).map(|b| b.header.clone())
    }

    fn add_fork_block(&self, block: Block) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let id = block.header.id.clone();
        if inner.forks.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        inner.forks.insert(id, block);
        Ok(())
    }

    fn fork_child(&self, previous_id: &str) -> Option<BlockHeader> {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner
            .forks
            .values()
            .find(|b| b.header.previous_id == previous_id)
            .map(|b| b.header.clone())
    }

    fn average_interval(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> Option<i64> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let samples: Vec<DateTime<Utc>> = inner
            .main
            .values()
            .map(|b| b.header.timestamp)
            .filter(|t| *t >= since && *t <= until)
            .collect();

        if samples.len() < 2 {
            return None;
        }

        let span = (*samples.last()? - samples[0]).num_seconds();
        Some(span / (samples.len() as i64 - 1))
    }

    fn rewind_chain(&self, divergent_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let divergent_height = *inner
            .main_ids
            .get(divergent_id)
            .ok_or_else(|| StoreError::NotFound(divergent_id.to_string()))?;

        // Highest first, so pointer integrity holds at every step.
        let displaced: Vec<u64> = inner
            .main
            .range(divergent_height + 1..)
            .map(|(h, _)| *h)
            .rev()
            .collect();

        for height in displaced {
            if let Some(block) = inner.main.remove(&height) {
                inner.main_ids.remove(&block.header.id);
                Self::unindex_instructions(&mut inner, &block);
                inner.forks.insert(block.header.id.clone(), block);
            }
        }

        Ok(())
    }

    fn divergent_header(&self, fork_tip_id: &str) -> Option<BlockHeader> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let mut current = inner.forks.get(fork_tip_id)?;
        loop {
            let previous = &current.header.previous_id;
            if let Some(height) = inner.main_ids.get(previous) {
                return inner.main.get(height).map(|b| b.header.clone());
            }
            match inner.forks.get(previous) {
                Some(parent) => current = parent,
                // The walk fell off the fork store: more blocks are needed.
                None => return None,
            }
        }
    }

    fn fork_path(&self, fork_tip_id: &str) -> Result<Vec<Block>, StoreError> {
        let inner = self.inner.lock().expect("store lock poisoned");

        let mut path = Vec::new();
        let mut current = inner
            .forks
            .get(fork_tip_id)
            .ok_or_else(|| StoreError::NotFound(fork_tip_id.to_string()))?;

        loop {
            path.push(current.clone());
            let previous = &current.header.previous_id;
            if inner.main_ids.contains_key(previous) {
                break;
            }
            current = inner.forks.get(previous).ok_or(StoreError::Disconnected)?;
        }

        path.reverse();
        Ok(path)
    }

    fn have_instruction(&self, instruction_id: &str) -> bool {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .instructions
            .contains(instruction_id)
    }
}
