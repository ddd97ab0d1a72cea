// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Byzantine quorum arithmetic.
//!
//! All predicates work on a vote map `voter → value` and are pure functions
//! of it, so the outcome does not depend on the order in which votes arrived.

use std::collections::BTreeMap;
use std::fmt::Display;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuorumError {
    #[error("voter {0} has already voted")]
    AlreadyVoted(String),
    #[error("no value can reach the consensus threshold any more")]
    NoMajorityPossible,
}

/// The Byzantine quorum size for `n` voters: `floor(2n/3) + 1`.
///
/// With at most `f` faulty voters out of `n = 3f + 1`, this is the smallest
/// bucket of identical votes that is guaranteed to contain an honest majority.
pub fn consensus_threshold(n: usize) -> usize {
    2 * n / 3 + 1
}

fn largest_bucket<A, V: Ord>(votes: &BTreeMap<A, V>) -> usize {
    let mut tally: BTreeMap<&V, usize> = BTreeMap::new();
    for v in votes.values() {
        *tally.entry(v).or_default() += 1;
    }
    tally.values().copied().max().unwrap_or(0)
}

/// True iff some value has reached the Byzantine quorum.
pub fn threshold_reached<A: Ord, V: Ord>(votes: &BTreeMap<A, V>, n: usize) -> bool {
    largest_bucket(votes) >= consensus_threshold(n)
}

/// True iff the votes not yet cast could still push some value to the quorum.
///
/// The best case for any value is its current bucket plus every remaining
/// voter; checking the largest bucket therefore checks them all, including
/// values nobody voted for yet.
pub fn majority_possible<A: Ord, V: Ord>(votes: &BTreeMap<A, V>, n: usize) -> bool {
    let remaining = n.saturating_sub(votes.len());
    remaining + largest_bucket(votes) >= consensus_threshold(n)
}

/// Evaluate [`majority_possible`] as if `new_voter` had already cast
/// `new_vote`, failing fast when consensus has become unreachable.
///
/// Rejecting the vote that proves divergence lets the round take an
/// alternative transition instead of waiting for stragglers that cannot
/// change the outcome. The caller must not have recorded the vote yet.
pub fn check_majority_possible_with_new_voter<A, V>(
    votes: &BTreeMap<A, V>,
    new_voter: &A,
    new_vote: &V,
    n: usize,
) -> Result<(), QuorumError>
where
    A: Ord + Display,
    V: Ord,
{
    if votes.contains_key(new_voter) {
        return Err(QuorumError::AlreadyVoted(new_voter.to_string()));
    }

    let mut tally: BTreeMap<&V, usize> = BTreeMap::new();
    for v in votes.values() {
        *tally.entry(v).or_default() += 1;
    }
    *tally.entry(new_vote).or_default() += 1;

    let largest = tally.values().copied().max().unwrap_or(0);
    let remaining = n.saturating_sub(votes.len() + 1);
    if remaining + largest < consensus_threshold(n) {
        return Err(QuorumError::NoMajorityPossible);
    }
    Ok(())
}

/// The value with the most votes and its count.
///
/// Ties break towards the smallest value in the map's order, so every replica
/// picks the same winner no matter how votes arrived.
pub fn most_voted<A: Ord, V: Ord>(votes: &BTreeMap<A, V>) -> Option<(&V, usize)> {
    let mut tally: BTreeMap<&V, usize> = BTreeMap::new();
    for v in votes.values() {
        *tally.entry(v).or_default() += 1;
    }

    let mut best: Option<(&V, usize)> = None;
    for (value, count) in tally {
        match best {
            Some((_, c)) if count <= c => {}
            _ => best = Some((value, count)),
        }
    }
    best
}
