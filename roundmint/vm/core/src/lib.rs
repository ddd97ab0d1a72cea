// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
mod address;
mod header;
mod ledger;
mod timestamp;

pub use address::{Address, AddressError};
pub use header::Header;
pub use ledger::LedgerId;
pub use timestamp::Timestamp;

/// Height of an application block. The engine's block heights map to this 1:1.
pub type BlockHeight = u64;
