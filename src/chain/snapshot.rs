//! Chain snapshot persistence
//!
//! Saves and restores the in-memory store as a JSON file. Writes go to a
//! temporary file first and land with an atomic rename, so a crash mid-save
//! never leaves a truncated snapshot behind.

use crate::chain::memory::MemoryStore;
use crate::chain::store::StoreError;
use crate::core::Block;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Snapshot errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    main: Vec<Block>,
    forks: Vec<Block>,
}

/// File-backed snapshot of a [`MemoryStore`]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist the store's full contents
    pub fn save(&self, store: &MemoryStore) -> Result<(), SnapshotError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let (main, forks) = store.export();
        let snapshot = Snapshot { main, forks };

        let temp = self.path.with_extension("tmp");
        let file = fs::File::create(&temp)?;
        serde_json::to_writer(BufWriter::new(file), &snapshot)?;
        fs::rename(&temp, &self.path)?;

        Ok(())
    }

    /// Load a store, rebuilding its derived indexes
    pub fn load(&self) -> Result<MemoryStore, SnapshotError> {
        let file = fs::File::open(&self.path)?;
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(MemoryStore::restore(snapshot.main, snapshot.forks)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::store::ChainStore;
    use crate::core::block::HEAD_KEY;
    use crate::core::{BlockStatus, Instruction, InstructionPayload, Transaction};
    use crate::crypto::KeyPair;

    fn populated_store() -> MemoryStore {
        let store = MemoryStore::new();
        let keys = KeyPair::generate();
        let mut previous = HEAD_KEY.to_string();

        for height in 0..3 {
            let instruction = Instruction::signed(
                InstructionPayload::Note {
                    data: format!("snap-{height}"),
                },
                &keys,
            )
            .unwrap();
            let txn = Transaction::from_instructions(vec![instruction]).unwrap();
            let mut block = Block::assemble(height, previous, 1, 0, vec![txn]).unwrap();
            block.header.id = block.header.compute_id().unwrap();
            block.header.status = BlockStatus::Confirmed;
            previous = block.header.id.clone();
            store.add_block(block).unwrap();
        }

        store
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("chain.json"));

        let store = populated_store();
        let best = store.best_header().unwrap();
        let instruction_id = store
            .block(&best.id)
            .unwrap()
            .transactions[0]
            .instructions[0]
            .id
            .clone();

        assert!(!file.exists());
        file.save(&store).unwrap();
        assert!(file.exists());

        let loaded = file.load().unwrap();
        assert_eq!(loaded.best_header().unwrap().id, best.id);
        assert!(loaded.contains_block(&best.id));
        // Replay index is derived again on load.
        assert!(loaded.have_instruction(&instruction_id));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("missing.json"));
        assert!(file.load().is_err());
    }
}
