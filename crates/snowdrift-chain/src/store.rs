use async_trait::async_trait;
use snowdrift_p2p::{QueryError, ValueSource};
use tokio::sync::RwLock;

use crate::block::Block;
use crate::error::StoreError;

/// Append-only, index-addressed sequence of blocks.
///
/// Indices are assigned in append order and never reused; the index is the
/// cross-peer query key during synchronization. Appends are serialized by
/// the inner lock so concurrent producers are safe, and in-place value
/// mutation never races another writer because at most one engine runs per
/// node at a time.
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: RwLock<Vec<Block>>,
}

impl BlockStore {
    pub fn new() -> Self {
        BlockStore {
            blocks: RwLock::new(Vec::new()),
        }
    }

    /// Append a block and return its index.
    pub async fn append(&self, block: Block) -> usize {
        let mut blocks = self.blocks.write().await;
        blocks.push(block);
        blocks.len() - 1
    }

    pub async fn len(&self) -> usize {
        self.blocks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blocks.read().await.is_empty()
    }

    /// Byte-copy of the value at `index`.
    pub async fn value(&self, index: usize) -> Result<Vec<u8>, StoreError> {
        let blocks = self.blocks.read().await;
        blocks
            .get(index)
            .map(|block| block.value.clone())
            .ok_or(StoreError::OutOfRange {
                index: index as i64,
                len: blocks.len(),
            })
    }

    /// Overwrite the value at `index` with a finalized preference.
    pub async fn set_value(&self, index: usize, value: Vec<u8>) -> Result<(), StoreError> {
        let mut blocks = self.blocks.write().await;
        let len = blocks.len();
        let block = blocks
            .get_mut(index)
            .ok_or(StoreError::OutOfRange {
                index: index as i64,
                len,
            })?;
        block.value = value;
        Ok(())
    }

    /// Snapshot of every slot's current value, in index order.
    pub async fn values(&self) -> Vec<Vec<u8>> {
        self.blocks
            .read()
            .await
            .iter()
            .map(|block| block.value.clone())
            .collect()
    }
}

#[async_trait]
impl ValueSource for BlockStore {
    async fn value_at(&self, index: i64) -> Result<Vec<u8>, QueryError> {
        let blocks = self.blocks.read().await;
        if index < 0 || index as usize >= blocks.len() {
            return Err(QueryError::OutOfRange {
                index,
                len: blocks.len(),
            });
        }
        Ok(blocks[index as usize].value.clone())
    }
}
