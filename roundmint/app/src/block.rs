// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use thiserror::Error;

use roundmint_vm_core::{BlockHeight, Header};
use roundmint_vm_message::Transaction;

#[derive(Error, Debug)]
pub enum BlockError {
    /// Heights must form a dense increasing sequence; a gap means the engine
    /// and the application have diverged.
    #[error("cannot add a block at height {got}, the blockchain is at height {height}")]
    AddBlock { height: BlockHeight, got: BlockHeight },
    /// Programmer error in the driver.
    #[error("block builder header already set")]
    HeaderAlreadySet,
    /// Programmer error in the driver.
    #[error("block builder has no header")]
    MissingHeader,
}

/// An application block: the engine header plus the transactions delivered
/// under it.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}

/// Scratch for the block currently being executed: *empty* until the header
/// arrives at `begin_block`, then accumulating transactions until `commit`
/// seals it.
#[derive(Debug, Default)]
pub struct BlockBuilder {
    header: Option<Header>,
    transactions: Vec<Transaction>,
}

impl BlockBuilder {
    pub fn reset(&mut self) {
        self.header = None;
        self.transactions.clear();
    }

    pub fn set_header(&mut self, header: Header) -> Result<(), BlockError> {
        if self.header.is_some() {
            return Err(BlockError::HeaderAlreadySet);
        }
        self.header = Some(header);
        Ok(())
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    /// Append a transaction. The engine guarantees uniqueness within a block,
    /// so there is no deduplication here.
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Seal the current block. Blocks without transactions are fine, blocks
    /// without a header are not.
    pub fn get_block(&self) -> Result<Block, BlockError> {
        let header = self.header.clone().ok_or(BlockError::MissingHeader)?;
        Ok(Block::new(header, self.transactions.clone()))
    }
}

/// Append-only ordered log of application blocks.
#[derive(Debug, Default)]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    pub fn new() -> Self {
        Default::default()
    }

    /// Height of the latest block; zero when empty.
    pub fn height(&self) -> BlockHeight {
        self.blocks.len() as BlockHeight
    }

    /// Append a block. Its height must be exactly one above the current one;
    /// on failure the chain is left unchanged.
    pub fn add_block(&mut self, block: Block) -> Result<(), BlockError> {
        let height = self.height();
        if block.header().height != height + 1 {
            return Err(BlockError::AddBlock {
                height,
                got: block.header().height,
            });
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}
