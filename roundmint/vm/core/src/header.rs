// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use serde::{Deserialize, Serialize};

use crate::{Address, BlockHeight, Timestamp};

/// The parts of the engine block header the application cares about.
///
/// Only the height and the timestamp are load-bearing; the proposer is kept
/// for diagnostics and may be absent depending on the engine version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub height: BlockHeight,
    pub timestamp: Timestamp,
    pub proposer_address: Option<Address>,
}

impl Header {
    pub fn new(height: BlockHeight, timestamp: Timestamp) -> Self {
        Self {
            height,
            timestamp,
            proposer_address: None,
        }
    }

    pub fn with_proposer(mut self, proposer: Address) -> Self {
        self.proposer_address = Some(proposer);
        self
    }
}
