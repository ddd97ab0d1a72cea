// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use bytes::Bytes;

use roundmint_vm_core::Header;

/// Signals the beginning of a new block, prior to any `DeliverTx` calls.
#[derive(Clone, Debug)]
pub struct BeginBlock {
    pub header: Header,
}

/// Check a transaction before admitting it to the local mempool.
#[derive(Clone, Debug)]
pub struct CheckTx {
    pub tx: Bytes,
}

/// Apply a transaction to the application's state.
#[derive(Clone, Debug)]
pub struct DeliverTx {
    pub tx: Bytes,
}
