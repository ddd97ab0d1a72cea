// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use im::{OrdMap, OrdSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use roundmint_vm_core::Address;

use crate::quorum;

/// State key under which a keeper-selection verdict stores the designated
/// keeper's address.
pub const MOST_VOTED_KEEPER_KEY: &str = "most_voted_keeper_address";

/// Engine-level consensus parameters the application cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    max_participants: usize,
}

impl ConsensusParams {
    pub fn new(max_participants: usize) -> Self {
        Self { max_participants }
    }

    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    /// Byzantine quorum size derived from the participant cap.
    pub fn consensus_threshold(&self) -> usize {
        quorum::consensus_threshold(self.max_participants)
    }
}

/// The replicated application state at the start of the current round.
///
/// An immutable value: [`PeriodState::update`] returns a new state with the
/// named entries shadowed, the original is never touched. Both collections
/// are persistent (structurally shared) so copies are cheap, and ordered so
/// every iteration that can influence a verdict is deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodState {
    participants: OrdSet<Address>,
    data: OrdMap<String, Value>,
}

impl PeriodState {
    pub fn new<I: IntoIterator<Item = Address>>(participants: I) -> Self {
        Self {
            participants: participants.into_iter().collect(),
            data: OrdMap::new(),
        }
    }

    /// The participant set, iterated in address order.
    pub fn participants(&self) -> impl Iterator<Item = &Address> {
        self.participants.iter()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_participant(&self, address: &Address) -> bool {
        self.participants.contains(address)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Address of the keeper designated by an earlier round, if any.
    pub fn most_voted_keeper_address(&self) -> Option<Address> {
        self.get_str(MOST_VOTED_KEEPER_KEY).and_then(|s| s.parse().ok())
    }

    /// A new state with the given entries shadowing the current ones.
    pub fn update<I: IntoIterator<Item = (String, Value)>>(&self, entries: I) -> Self {
        let mut data = self.data.clone();
        for (key, value) in entries {
            data.insert(key, value);
        }
        Self {
            participants: self.participants.clone(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use roundmint_vm_message::testing::arb_address;

    use crate::quorum;

    use super::{ConsensusParams, PeriodState, MOST_VOTED_KEEPER_KEY};

    #[test]
    fn update_leaves_original_untouched() {
        let s0 = PeriodState::new((0u64..4).map(arb_address));
        let s1 = s0.update([("k".to_owned(), json!(1))]);
        let s2 = s1.update([("k".to_owned(), json!(2))]);

        assert_eq!(s0.get("k"), None);
        assert_eq!(s1.get("k"), Some(&json!(1)));
        assert_eq!(s2.get("k"), Some(&json!(2)));
        assert_eq!(s0.participant_count(), 4);
        assert_eq!(s2.participant_count(), 4);
    }

    #[test]
    fn participants_iterate_sorted() {
        let s = PeriodState::new([3u64, 1, 2, 0].map(arb_address));
        let listed: Vec<_> = s.participants().cloned().collect();
        let mut sorted = listed.clone();
        sorted.sort();
        assert_eq!(listed, sorted);
    }

    #[test]
    fn keeper_accessor_reads_convention_key() {
        let keeper = arb_address(7);
        let s = PeriodState::new((0u64..4).map(arb_address));
        assert_eq!(s.most_voted_keeper_address(), None);

        let s = s.update([(
            MOST_VOTED_KEEPER_KEY.to_owned(),
            Value::String(keeper.as_str().to_owned()),
        )]);
        assert_eq!(s.most_voted_keeper_address(), Some(keeper));
    }

    #[test]
    fn params_threshold_matches_free_function() {
        for n in 1..=20 {
            assert_eq!(
                ConsensusParams::new(n).consensus_threshold(),
                quorum::consensus_threshold(n)
            );
        }
    }
}
