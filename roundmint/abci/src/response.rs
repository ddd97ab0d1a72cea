// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use roundmint_vm_core::BlockHeight;

/// Code zero means the request succeeded; applications map their own error
/// taxonomy onto the non-zero range.
#[derive(Clone, Debug, Default)]
pub struct BeginBlock;

#[derive(Clone, Debug, Default)]
pub struct CheckTx {
    pub code: u32,
    pub info: String,
}

impl CheckTx {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeliverTx {
    pub code: u32,
    pub info: String,
}

impl DeliverTx {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct EndBlock;

#[derive(Clone, Debug, Default)]
pub struct Commit {
    /// Height of the block that was committed.
    pub height: BlockHeight,
}
