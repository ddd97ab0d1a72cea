// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Helpers for tests in this and downstream crates.
//!
//! The payload registry is process-wide, while tests within one binary share
//! a process, so fixtures must tolerate registering the same variant from
//! multiple tests.

use roundmint_vm_core::Address;

use crate::payload::PayloadError;
use crate::registry::{self, PayloadType};

/// Ensure the variant is registered, ignoring repetition from other tests.
pub fn registered(payload_type: PayloadType) {
    match registry::register(payload_type) {
        Ok(()) | Err(PayloadError::DuplicateTransactionType(_)) => {}
        Err(e) => panic!("registration failed: {e}"),
    }
}

/// A deterministic address derived from a seed.
pub fn arb_address(seed: u64) -> Address {
    let mut bz = [0u8; 20];
    bz[..8].copy_from_slice(&seed.to_be_bytes());
    Address::from_bytes(&bz)
}
