//! Reverse traversal from a tip back to the origin block.

use std::iter::FusedIterator;
use std::sync::Arc;

use super::block::Block;
use super::chain::{corrupt, read_block, ChainResult};
use super::db::KvStore;
use crate::config::BlockHash;

/// Lazy walk over stored blocks in strictly decreasing height order.
///
/// Created by [`Chain::iter`](super::Chain::iter). It owns a store handle
/// and a snapshot of the tip hash, so it is unaffected by appends made after
/// it was created. Each step checks that the block is stored under its own
/// hash and sits exactly one height below the block before it. The first
/// error is yielded once and ends the iteration.
pub struct ChainIterator<S: KvStore + ?Sized> {
    store: Arc<S>,
    cursor: Option<BlockHash>,
    expected_height: Option<u64>,
}

impl<S: KvStore + ?Sized> ChainIterator<S> {
    pub(crate) fn new(store: Arc<S>, tip: BlockHash) -> Self {
        Self {
            store,
            cursor: Some(tip),
            expected_height: None,
        }
    }

    fn step(&self, cursor: &BlockHash) -> ChainResult<Block> {
        let block = read_block(&*self.store, cursor)?.ok_or_else(|| {
            corrupt(format!("block {} is not stored", hex::encode(cursor)))
        })?;

        if block.hash() != cursor {
            return Err(corrupt(format!(
                "block stored under {} carries hash {}",
                hex::encode(cursor),
                block.hash_hex()
            )));
        }
        if let Some(expected) = self.expected_height {
            if block.height() != expected {
                return Err(corrupt(format!(
                    "block {} has height {}, expected {}",
                    block.hash_hex(),
                    block.height(),
                    expected
                )));
            }
        }
        if block.is_genesis() && block.height() != 0 {
            return Err(corrupt(format!(
                "origin block {} has height {}",
                block.hash_hex(),
                block.height()
            )));
        }
        if !block.is_genesis() && block.height() == 0 {
            return Err(corrupt(format!(
                "block {} at height 0 has a predecessor",
                block.hash_hex()
            )));
        }
        Ok(block)
    }
}

impl<S: KvStore + ?Sized> Iterator for ChainIterator<S> {
    type Item = ChainResult<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.take()?;
        match self.step(&cursor) {
            Ok(block) => {
                if !block.is_genesis() {
                    self.cursor = Some(*block.prev_block_hash());
                    self.expected_height = Some(block.height() - 1);
                }
                Some(Ok(block))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl<S: KvStore + ?Sized> FusedIterator for ChainIterator<S> {}
