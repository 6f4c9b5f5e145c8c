//! Multi-node convergence: a node that is behind fills its gap by
//! requesting missing predecessors from peers, then reorganizes onto the
//! longer chain once the ancestry connects.

use std::sync::{Arc, Mutex};
use tinyledger::chain::{ChainStore, MemoryStore};
use tinyledger::config::ChainParams;
use tinyledger::core::block::HEAD_KEY;
use tinyledger::core::{Block, Instruction, InstructionPayload, Transaction};
use tinyledger::crypto::KeyPair;
use tinyledger::mining::{build_consensus, UnconfirmedPool};
use tinyledger::network::Network;
use tinyledger::node::{BlockVerifier, Node, ReceiveOutcome};
use tokio_util::sync::CancellationToken;

const DIFFICULTY: u32 = 8;

/// Records outbound block requests so a test driver can play the peer.
/// `drain_requests` consumes the outstanding queue; the full history stays
/// available for assertions.
#[derive(Default)]
struct RecordingNetwork {
    outstanding: Mutex<Vec<String>>,
    history: Mutex<Vec<String>>,
}

impl RecordingNetwork {
    fn drain_requests(&self) -> Vec<String> {
        std::mem::take(&mut *self.outstanding.lock().unwrap())
    }

    fn request_history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }
}

impl Network for RecordingNetwork {
    fn broadcast_tail(&self, _block: &Block) {}
    fn broadcast_transaction(&self, _txn: &Transaction) {}
    fn request_next_block(&self, _previous_id: &str) {}
    fn request_block_by_height(&self, _height: u64) {}

    fn request_block(&self, block_id: &str) {
        self.outstanding.lock().unwrap().push(block_id.to_string());
        self.history.lock().unwrap().push(block_id.to_string());
    }
}

fn test_params() -> ChainParams {
    ChainParams {
        genesis_difficulty: DIFFICULTY,
        difficulty_step: 0,
        ..ChainParams::default()
    }
}

fn test_node(network: Arc<RecordingNetwork>) -> Arc<Node> {
    Arc::new(Node::new(
        test_params(),
        Arc::new(MemoryStore::new()),
        Arc::new(UnconfirmedPool::new()),
        BlockVerifier::new(),
        network,
    ))
}

fn note_txn(data: &str) -> Transaction {
    let keys = KeyPair::generate();
    let instruction = Instruction::signed(
        InstructionPayload::Note {
            data: data.to_string(),
        },
        &keys,
    )
    .unwrap();
    Transaction::from_instructions(vec![instruction]).unwrap()
}

fn mine_chain(length: u64, start_height: u64, previous_id: &str, tag: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut previous = previous_id.to_string();
    for offset in 0..length {
        let height = start_height + offset;
        let candidate = Block::assemble(
            height,
            previous,
            1,
            DIFFICULTY,
            vec![note_txn(&format!("{tag}-{height}"))],
        )
        .unwrap();
        let block = build_consensus(candidate, &CancellationToken::new(), 2).unwrap();
        previous = block.header.id.clone();
        blocks.push(block);
    }
    blocks
}

/// Serve the follower's outstanding block requests from `source`, then
/// re-offer the source tip, until the follower reaches `target_tip_id`.
async fn drive_to_convergence(
    follower: &Node,
    requests: &RecordingNetwork,
    source: &dyn ChainStore,
    target_tip_id: &str,
) {
    let tip = source.block(target_tip_id).unwrap();

    for _ in 0..32 {
        if follower.store().contains_block(target_tip_id) {
            return;
        }
        for id in requests.drain_requests() {
            let block = source.block(&id).expect("peer asked for an unknown block");
            follower.receive_block(block).await.unwrap();
        }
        follower.receive_block(tip.clone()).await.unwrap();
    }

    panic!("follower failed to converge onto {target_tip_id}");
}

#[tokio::test]
async fn test_empty_node_backfills_from_tip_announcement() {
    let source = mine_chain(4, 0, HEAD_KEY, "src");
    let source_store = MemoryStore::new();
    for block in &source {
        source_store.add_block(block.clone()).unwrap();
    }

    let network = Arc::new(RecordingNetwork::default());
    let follower = test_node(network.clone());

    // The bare tip is not connectable; it is parked and its predecessor
    // requested.
    let tip = source.last().unwrap();
    assert_eq!(
        follower.receive_block(tip.clone()).await.unwrap(),
        ReceiveOutcome::Ignore
    );
    assert!(follower.store().contains_fork_block(&tip.header.id));
    assert_eq!(
        network.request_history(),
        vec![source[2].header.id.clone()]
    );

    drive_to_convergence(&follower, &network, &source_store, &tip.header.id).await;

    // Ancestry was chased strictly backwards, one request per gap.
    assert_eq!(
        network.request_history(),
        vec![
            source[2].header.id.clone(),
            source[1].header.id.clone(),
            source[0].header.id.clone(),
        ]
    );

    let best = follower.store().best_header().unwrap();
    assert_eq!(best.height, 3);
    assert_eq!(best.id, tip.header.id);
    for block in &source {
        assert!(follower.store().contains_block(&block.header.id));
        let instruction = &block.transactions[0].instructions[0];
        assert!(follower.store().have_instruction(&instruction.id));
    }
}

#[tokio::test]
async fn test_lagging_node_rebases_onto_longer_peer_chain() {
    // Shared genesis, then the peer extends further than the follower.
    let genesis = mine_chain(1, 0, HEAD_KEY, "shared").remove(0);
    let peer_branch = mine_chain(4, 1, &genesis.header.id, "peer");
    let local_branch = mine_chain(2, 1, &genesis.header.id, "local");

    let source_store = MemoryStore::new();
    source_store.add_block(genesis.clone()).unwrap();
    for block in &peer_branch {
        source_store.add_block(block.clone()).unwrap();
    }

    let network = Arc::new(RecordingNetwork::default());
    let follower = test_node(network.clone());
    follower.receive_block(genesis.clone()).await.unwrap();
    for block in &local_branch {
        assert_eq!(
            follower.receive_block(block.clone()).await.unwrap(),
            ReceiveOutcome::Relay
        );
    }
    assert_eq!(follower.store().best_header().unwrap().height, 2);

    // Peer blocks arrive newest first; ancestry is chased backwards until
    // the divergence point connects, then the follower reorganizes.
    let peer_tip = peer_branch.last().unwrap();
    follower.receive_block(peer_tip.clone()).await.unwrap();
    drive_to_convergence(&follower, &network, &source_store, &peer_tip.header.id).await;

    let best = follower.store().best_header().unwrap();
    assert_eq!(best.height, 4);
    assert_eq!(best.id, peer_tip.header.id);

    // The abandoned local branch is retained as fork material.
    for block in &local_branch {
        assert!(!follower.store().contains_block(&block.header.id));
        assert!(follower.store().contains_fork_block(&block.header.id));
    }
}
