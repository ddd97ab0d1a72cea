// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use crate::{request, response};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Allow returning a result from the methods, so the [`Application`]
/// implementation doesn't have to be full of `.expect("failed...")` or
/// `.unwrap()` calls. If an error is returned, the adapter driving the
/// application is expected to treat it as fatal.
pub type AbciResult<T> = std::result::Result<T, BoxError>;

/// The consensus connection of an ABCI application, reduced to the block
/// lifecycle the engine drives.
///
/// Calls are delivered sequentially and each must return before the next is
/// issued; within a block, transactions arrive in the order the engine
/// committed them. Transaction-level failures are reported through response
/// codes, errors are reserved for conditions that must stop the node.
#[allow(unused_variables)]
pub trait Application {
    /// Signals the beginning of a new block, prior to any `DeliverTx` calls.
    fn begin_block(&mut self, request: request::BeginBlock) -> AbciResult<response::BeginBlock> {
        Ok(Default::default())
    }

    /// Check the given transaction before putting it into the local mempool.
    fn check_tx(&self, request: request::CheckTx) -> AbciResult<response::CheckTx> {
        Ok(Default::default())
    }

    /// Apply a transaction to the application's state.
    fn deliver_tx(&mut self, request: request::DeliverTx) -> AbciResult<response::DeliverTx> {
        Ok(Default::default())
    }

    /// Signals the end of a block.
    fn end_block(&mut self) -> AbciResult<response::EndBlock> {
        Ok(Default::default())
    }

    /// Commit the current state at the current height.
    fn commit(&mut self) -> AbciResult<response::Commit> {
        Ok(Default::default())
    }
}
