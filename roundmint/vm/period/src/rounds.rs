// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Round abstractions.
//!
//! A round is a bounded phase that collects payloads of a single transaction
//! type from the participants and emits a verdict at the end of a block. The
//! variants here cover the recurring aggregation patterns: everyone sends a
//! distinct value, a quorum agrees on the same value, a quorum sends anything,
//! a boolean vote, and a single designated keeper.
//!
//! A round may be read and mutated only between `begin_block` and `end_block`
//! of a single consensus block; the driver upholds this.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use thiserror::Error;

use roundmint_vm_core::Address;
use roundmint_vm_encoding::to_canonical_string;
use roundmint_vm_message::{Payload, Transaction};

use crate::event::Event;
use crate::quorum;
use crate::state::{ConsensusParams, PeriodState};

/// Data field carrying the boolean in a [`VotingRound`] payload.
pub const VOTE_ATTRIBUTE: &str = "vote";

#[derive(Error, Debug)]
pub enum RoundError {
    /// The transaction carries a payload tag the round does not accept.
    #[error("round {round_id} only accepts {expected} payloads, got {got}")]
    TransactionTypeNotRecognized {
        round_id: &'static str,
        expected: &'static str,
        got: String,
    },
    /// The payload fails the round's checks; the engine rejects the
    /// transaction, the round is left untouched.
    #[error("transaction not valid: {0}")]
    TransactionNotValid(String),
    /// Programmer error or replica divergence; aborts the current callback.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Verdict of a completed round: the state for the next round and the event
/// that selects it in the transition table.
pub type Verdict = (PeriodState, Event);

/// A phase of the period.
///
/// `check_payload` and `process_payload` are the variant-specific hooks; the
/// transaction-level methods wrap them with the tag check. Processing a
/// payload that would not pass `check_payload` is a programmer error.
pub trait Round {
    /// Stable identifier, used by the transition table.
    fn round_id(&self) -> &'static str;

    /// The only payload tag this round accepts.
    fn allowed_tx_type(&self) -> &'static str;

    /// The state the round was entered with.
    fn state(&self) -> &PeriodState;

    fn params(&self) -> &ConsensusParams;

    fn check_payload(&self, payload: &Payload) -> Result<(), RoundError>;

    fn process_payload(&mut self, payload: Payload) -> Result<(), RoundError>;

    /// The verdict, once the round is complete; `None` keeps it running.
    fn end_block(&self) -> Option<Verdict>;

    fn check_allowed_tx_type(&self, tx: &Transaction) -> Result<(), RoundError> {
        let got = tx.payload().transaction_type();
        if got != self.allowed_tx_type() {
            return Err(RoundError::TransactionTypeNotRecognized {
                round_id: self.round_id(),
                expected: self.allowed_tx_type(),
                got: got.to_owned(),
            });
        }
        Ok(())
    }

    /// Validate the transaction against the round without mutating it.
    fn check_transaction(&self, tx: &Transaction) -> Result<(), RoundError> {
        self.check_allowed_tx_type(tx)?;
        self.check_payload(tx.payload())
    }

    /// Apply the transaction to the round's accumulator.
    fn process_transaction(&mut self, tx: Transaction) -> Result<(), RoundError> {
        self.check_allowed_tx_type(&tx)?;
        self.process_payload(tx.into_payload())
    }
}

/// Canonical encoding of a value, the unit of comparison in tallies.
fn canonical(value: &Value) -> Result<String, RoundError> {
    to_canonical_string(value)
        .map_err(|e| RoundError::Internal(format!("cannot serialize payload value: {e}")))
}

/// Payloads collected so far, keyed by sender.
///
/// The shared accumulator of every collection-style round: one payload per
/// participant, insertion rejected for strangers and repeat senders.
#[derive(Debug, Default)]
pub struct Collection {
    entries: BTreeMap<Address, Payload>,
}

impl Collection {
    fn check(&self, state: &PeriodState, payload: &Payload) -> Result<(), RoundError> {
        let sender = payload.sender();
        if !state.is_participant(sender) {
            return Err(RoundError::TransactionNotValid(format!(
                "{sender} is not a participant"
            )));
        }
        if self.entries.contains_key(sender) {
            return Err(RoundError::TransactionNotValid(format!(
                "{sender} has already sent a payload"
            )));
        }
        Ok(())
    }

    fn insert(&mut self, payload: Payload) -> Result<(), RoundError> {
        match self.entries.entry(payload.sender().clone()) {
            Entry::Occupied(e) => Err(RoundError::Internal(format!(
                "payload from {} processed twice",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(payload);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn payloads(&self) -> impl Iterator<Item = (&Address, &Payload)> {
        self.entries.iter()
    }

    /// All collected values as one JSON object keyed by sender.
    fn collected_values(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(sender, payload)| (sender.as_str().to_owned(), payload.value()))
                .collect(),
        )
    }
}

/// Static configuration of a [`CollectDifferentUntilAllRound`].
#[derive(Clone, Copy, Debug)]
pub struct CollectDifferentUntilAllConfig {
    pub round_id: &'static str,
    pub allowed_tx_type: &'static str,
    /// State key the verdict writes the sender → value object under.
    pub collection_key: &'static str,
    pub done_event: Event,
}

/// Collects a payload with a distinct value from every participant, e.g. the
/// initial registration where each participant contributes its own identity.
pub struct CollectDifferentUntilAllRound {
    config: CollectDifferentUntilAllConfig,
    state: PeriodState,
    params: ConsensusParams,
    collection: Collection,
    seen_values: BTreeSet<String>,
}

impl CollectDifferentUntilAllRound {
    pub fn new(
        config: CollectDifferentUntilAllConfig,
        state: PeriodState,
        params: ConsensusParams,
    ) -> Self {
        Self {
            config,
            state,
            params,
            collection: Collection::default(),
            seen_values: BTreeSet::new(),
        }
    }

    /// Complete only when every participant has contributed.
    pub fn collection_threshold_reached(&self) -> bool {
        self.collection.len() == self.state.participant_count()
    }
}

impl Round for CollectDifferentUntilAllRound {
    fn round_id(&self) -> &'static str {
        self.config.round_id
    }

    fn allowed_tx_type(&self) -> &'static str {
        self.config.allowed_tx_type
    }

    fn state(&self) -> &PeriodState {
        &self.state
    }

    fn params(&self) -> &ConsensusParams {
        &self.params
    }

    fn check_payload(&self, payload: &Payload) -> Result<(), RoundError> {
        self.collection.check(&self.state, payload)?;
        if self.seen_values.contains(&canonical(&payload.value())?) {
            return Err(RoundError::TransactionNotValid(format!(
                "payload value of {} has already been collected",
                payload.sender()
            )));
        }
        Ok(())
    }

    fn process_payload(&mut self, payload: Payload) -> Result<(), RoundError> {
        let value = canonical(&payload.value())?;
        self.collection.insert(payload)?;
        self.seen_values.insert(value);
        Ok(())
    }

    fn end_block(&self) -> Option<Verdict> {
        if !self.collection_threshold_reached() {
            return None;
        }
        let state = self.state.update([(
            self.config.collection_key.to_owned(),
            self.collection.collected_values(),
        )]);
        Some((state, self.config.done_event))
    }
}

/// Static configuration of a [`CollectSameUntilThresholdRound`].
#[derive(Clone, Copy, Debug)]
pub struct CollectSameConfig {
    pub round_id: &'static str,
    pub allowed_tx_type: &'static str,
    /// Data field whose value is tallied; the whole data object when `None`.
    pub payload_attribute: Option<&'static str>,
    /// State key the verdict writes the agreed value under.
    pub collection_key: &'static str,
    pub done_event: Event,
    pub no_majority_event: Option<Event>,
}

/// Collects payloads until a Byzantine quorum agrees on the same value.
pub struct CollectSameUntilThresholdRound {
    config: CollectSameConfig,
    state: PeriodState,
    params: ConsensusParams,
    collection: Collection,
    votes: BTreeMap<Address, String>,
}

impl CollectSameUntilThresholdRound {
    pub fn new(config: CollectSameConfig, state: PeriodState, params: ConsensusParams) -> Self {
        Self {
            config,
            state,
            params,
            collection: Collection::default(),
            votes: BTreeMap::new(),
        }
    }

    /// The tallied ballot of a payload.
    fn ballot(&self, payload: &Payload) -> Result<String, RoundError> {
        let value = match self.config.payload_attribute {
            Some(attribute) => payload.data().get(attribute).cloned().ok_or_else(|| {
                RoundError::TransactionNotValid(format!(
                    "payload of {} has no attribute {attribute}",
                    payload.sender()
                ))
            })?,
            None => payload.value(),
        };
        canonical(&value)
    }

    pub fn threshold_reached(&self) -> bool {
        matches!(
            quorum::most_voted(&self.votes),
            Some((_, count)) if count >= self.params.consensus_threshold()
        )
    }

    /// The value agreed by at least the quorum.
    ///
    /// Ties on the count break towards the lexicographically smallest
    /// canonical encoding. Asking before the threshold is reached is a
    /// programmer error.
    pub fn most_voted_payload(&self) -> Result<Value, RoundError> {
        match quorum::most_voted(&self.votes) {
            Some((ballot, count)) if count >= self.params.consensus_threshold() => {
                serde_json::from_str(ballot).map_err(|e| {
                    RoundError::Internal(format!("cannot parse the winning ballot: {e}"))
                })
            }
            _ => Err(RoundError::Internal(
                "most voted payload requested before the threshold was reached".to_owned(),
            )),
        }
    }
}

impl Round for CollectSameUntilThresholdRound {
    fn round_id(&self) -> &'static str {
        self.config.round_id
    }

    fn allowed_tx_type(&self) -> &'static str {
        self.config.allowed_tx_type
    }

    fn state(&self) -> &PeriodState {
        &self.state
    }

    fn params(&self) -> &ConsensusParams {
        &self.params
    }

    fn check_payload(&self, payload: &Payload) -> Result<(), RoundError> {
        self.collection.check(&self.state, payload)?;
        self.ballot(payload).map(|_| ())
    }

    fn process_payload(&mut self, payload: Payload) -> Result<(), RoundError> {
        let ballot = self.ballot(&payload)?;
        let sender = payload.sender().clone();

        quorum::check_majority_possible_with_new_voter(
            &self.votes,
            &sender,
            &ballot,
            self.state.participant_count(),
        )
        .map_err(|e| RoundError::Internal(e.to_string()))?;

        self.collection.insert(payload)?;
        self.votes.insert(sender, ballot);
        Ok(())
    }

    fn end_block(&self) -> Option<Verdict> {
        if self.threshold_reached() {
            let value = self.most_voted_payload().ok()?;
            let state = self
                .state
                .update([(self.config.collection_key.to_owned(), value)]);
            return Some((state, self.config.done_event));
        }
        if let Some(event) = self.config.no_majority_event {
            if !quorum::majority_possible(&self.votes, self.state.participant_count()) {
                return Some((self.state.clone(), event));
            }
        }
        None
    }
}

/// Static configuration of a [`CollectDifferentUntilThresholdRound`].
#[derive(Clone, Copy, Debug)]
pub struct CollectDifferentUntilThresholdConfig {
    pub round_id: &'static str,
    pub allowed_tx_type: &'static str,
    /// State key the verdict writes the sender → value object under.
    pub collection_key: &'static str,
    pub done_event: Event,
}

/// Collects payloads until a Byzantine quorum of participants has sent one;
/// the values need not agree, sender uniqueness is enough.
pub struct CollectDifferentUntilThresholdRound {
    config: CollectDifferentUntilThresholdConfig,
    state: PeriodState,
    params: ConsensusParams,
    collection: Collection,
}

impl CollectDifferentUntilThresholdRound {
    pub fn new(
        config: CollectDifferentUntilThresholdConfig,
        state: PeriodState,
        params: ConsensusParams,
    ) -> Self {
        Self {
            config,
            state,
            params,
            collection: Collection::default(),
        }
    }

    pub fn collection_threshold_reached(&self) -> bool {
        self.collection.len() >= self.params.consensus_threshold()
    }
}

impl Round for CollectDifferentUntilThresholdRound {
    fn round_id(&self) -> &'static str {
        self.config.round_id
    }

    fn allowed_tx_type(&self) -> &'static str {
        self.config.allowed_tx_type
    }

    fn state(&self) -> &PeriodState {
        &self.state
    }

    fn params(&self) -> &ConsensusParams {
        &self.params
    }

    fn check_payload(&self, payload: &Payload) -> Result<(), RoundError> {
        self.collection.check(&self.state, payload)
    }

    fn process_payload(&mut self, payload: Payload) -> Result<(), RoundError> {
        self.collection.insert(payload)
    }

    fn end_block(&self) -> Option<Verdict> {
        if !self.collection_threshold_reached() {
            return None;
        }
        let state = self.state.update([(
            self.config.collection_key.to_owned(),
            self.collection.collected_values(),
        )]);
        Some((state, self.config.done_event))
    }
}

/// Static configuration of a [`VotingRound`].
#[derive(Clone, Copy, Debug)]
pub struct VotingConfig {
    pub round_id: &'static str,
    pub allowed_tx_type: &'static str,
    pub done_event: Event,
    pub negative_event: Event,
    pub no_majority_event: Option<Event>,
}

/// Collects boolean votes; a quorum of `true` and a quorum of `false` emit
/// distinct events, and at any given tally at most one of them is reachable.
pub struct VotingRound {
    config: VotingConfig,
    state: PeriodState,
    params: ConsensusParams,
    collection: Collection,
    votes: BTreeMap<Address, bool>,
}

impl VotingRound {
    pub fn new(config: VotingConfig, state: PeriodState, params: ConsensusParams) -> Self {
        Self {
            config,
            state,
            params,
            collection: Collection::default(),
            votes: BTreeMap::new(),
        }
    }

    fn vote_of(payload: &Payload) -> Result<bool, RoundError> {
        payload
            .data()
            .get(VOTE_ATTRIBUTE)
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                RoundError::TransactionNotValid(format!(
                    "payload of {} carries no boolean {VOTE_ATTRIBUTE} field",
                    payload.sender()
                ))
            })
    }

    fn vote_count(&self, vote: bool) -> usize {
        self.votes.values().filter(|v| **v == vote).count()
    }

    pub fn positive_vote_threshold_reached(&self) -> bool {
        self.vote_count(true) >= self.params.consensus_threshold()
    }

    pub fn negative_vote_threshold_reached(&self) -> bool {
        self.vote_count(false) >= self.params.consensus_threshold()
    }
}

impl Round for VotingRound {
    fn round_id(&self) -> &'static str {
        self.config.round_id
    }

    fn allowed_tx_type(&self) -> &'static str {
        self.config.allowed_tx_type
    }

    fn state(&self) -> &PeriodState {
        &self.state
    }

    fn params(&self) -> &ConsensusParams {
        &self.params
    }

    fn check_payload(&self, payload: &Payload) -> Result<(), RoundError> {
        self.collection.check(&self.state, payload)?;
        Self::vote_of(payload).map(|_| ())
    }

    fn process_payload(&mut self, payload: Payload) -> Result<(), RoundError> {
        let vote = Self::vote_of(&payload)?;
        let sender = payload.sender().clone();

        quorum::check_majority_possible_with_new_voter(
            &self.votes,
            &sender,
            &vote,
            self.state.participant_count(),
        )
        .map_err(|e| RoundError::Internal(e.to_string()))?;

        self.collection.insert(payload)?;
        self.votes.insert(sender, vote);
        Ok(())
    }

    fn end_block(&self) -> Option<Verdict> {
        if self.positive_vote_threshold_reached() {
            return Some((self.state.clone(), self.config.done_event));
        }
        if self.negative_vote_threshold_reached() {
            return Some((self.state.clone(), self.config.negative_event));
        }
        if let Some(event) = self.config.no_majority_event {
            if !quorum::majority_possible(&self.votes, self.state.participant_count()) {
                return Some((self.state.clone(), event));
            }
        }
        None
    }
}

/// Static configuration of an [`OnlyKeeperSendsRound`].
#[derive(Clone, Copy, Debug)]
pub struct OnlyKeeperSendsConfig {
    pub round_id: &'static str,
    pub allowed_tx_type: &'static str,
    /// State key the verdict writes the keeper's value under.
    pub collection_key: &'static str,
    pub done_event: Event,
}

/// A round where a single designated participant sends the sole payload.
///
/// The keeper is whoever the state's `most_voted_keeper_address` names; a
/// state without one cannot host this round.
pub struct OnlyKeeperSendsRound {
    config: OnlyKeeperSendsConfig,
    state: PeriodState,
    params: ConsensusParams,
    keeper_payload: Option<Payload>,
}

impl OnlyKeeperSendsRound {
    pub fn new(config: OnlyKeeperSendsConfig, state: PeriodState, params: ConsensusParams) -> Self {
        Self {
            config,
            state,
            params,
            keeper_payload: None,
        }
    }

    pub fn has_keeper_sent_payload(&self) -> bool {
        self.keeper_payload.is_some()
    }
}

impl Round for OnlyKeeperSendsRound {
    fn round_id(&self) -> &'static str {
        self.config.round_id
    }

    fn allowed_tx_type(&self) -> &'static str {
        self.config.allowed_tx_type
    }

    fn state(&self) -> &PeriodState {
        &self.state
    }

    fn params(&self) -> &ConsensusParams {
        &self.params
    }

    fn check_payload(&self, payload: &Payload) -> Result<(), RoundError> {
        let keeper = self.state.most_voted_keeper_address().ok_or_else(|| {
            RoundError::Internal("the state designates no keeper".to_owned())
        })?;
        if payload.sender() != &keeper {
            return Err(RoundError::TransactionNotValid(format!(
                "only the keeper {keeper} may send this payload, got {}",
                payload.sender()
            )));
        }
        if self.has_keeper_sent_payload() {
            return Err(RoundError::TransactionNotValid(
                "the keeper has already sent the payload".to_owned(),
            ));
        }
        Ok(())
    }

    fn process_payload(&mut self, payload: Payload) -> Result<(), RoundError> {
        if self.has_keeper_sent_payload() {
            return Err(RoundError::Internal(
                "keeper payload processed twice".to_owned(),
            ));
        }
        self.keeper_payload = Some(payload);
        Ok(())
    }

    fn end_block(&self) -> Option<Verdict> {
        let payload = self.keeper_payload.as_ref()?;
        let state = self
            .state
            .update([(self.config.collection_key.to_owned(), payload.value())]);
        Some((state, self.config.done_event))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use roundmint_vm_core::Address;
    use roundmint_vm_message::testing::{arb_address, registered};
    use roundmint_vm_message::{FieldDef, FieldKind, Payload, PayloadType, Transaction};

    use crate::event::Event;
    use crate::state::{ConsensusParams, PeriodState, MOST_VOTED_KEEPER_KEY};

    use super::{
        CollectDifferentUntilAllConfig, CollectDifferentUntilAllRound,
        CollectDifferentUntilThresholdConfig, CollectDifferentUntilThresholdRound,
        CollectSameConfig, CollectSameUntilThresholdRound, OnlyKeeperSendsConfig,
        OnlyKeeperSendsRound, Round, RoundError, VotingConfig, VotingRound,
    };

    const DONE: Event = Event("done");
    const NEGATIVE: Event = Event("negative");
    const NO_MAJORITY: Event = Event("no_majority");

    const OBSERVATION: PayloadType = PayloadType {
        transaction_type: "rounds_test_observation",
        fields: &[FieldDef::required("value", FieldKind::String)],
    };

    const VOTE: PayloadType = PayloadType {
        transaction_type: "rounds_test_vote",
        fields: &[FieldDef::required("vote", FieldKind::Bool)],
    };

    const REGISTRATION: PayloadType = PayloadType {
        transaction_type: "rounds_test_registration",
        fields: &[FieldDef::required("identity", FieldKind::String)],
    };

    const PUBLISH: PayloadType = PayloadType {
        transaction_type: "rounds_test_publish",
        fields: &[FieldDef::required("tx_hash", FieldKind::String)],
    };

    fn setup() -> (PeriodState, ConsensusParams) {
        for t in [OBSERVATION, VOTE, REGISTRATION, PUBLISH] {
            registered(t);
        }
        let state = PeriodState::new((0u64..4).map(arb_address));
        (state, ConsensusParams::new(4))
    }

    fn payload(t: PayloadType, sender: Address, data: Value) -> Payload {
        let data: Map<String, Value> = data.as_object().unwrap().clone();
        Payload::new(t.transaction_type, sender, data).unwrap()
    }

    fn observation_round(state: PeriodState, params: ConsensusParams) -> CollectSameUntilThresholdRound {
        CollectSameUntilThresholdRound::new(
            CollectSameConfig {
                round_id: "collect_observation",
                allowed_tx_type: OBSERVATION.transaction_type,
                payload_attribute: Some("value"),
                collection_key: "most_voted_value",
                done_event: DONE,
                no_majority_event: Some(NO_MAJORITY),
            },
            state,
            params,
        )
    }

    #[test]
    fn collect_same_happy_path() {
        let (state, params) = setup();
        let mut round = observation_round(state, params);

        for seed in 0u64..3 {
            let p = payload(OBSERVATION, arb_address(seed), json!({"value": "x"}));
            round.check_payload(&p).unwrap();
            round.process_payload(p).unwrap();
        }

        assert!(round.threshold_reached());
        assert_eq!(round.most_voted_payload().unwrap(), json!("x"));

        let (next_state, event) = round.end_block().expect("round is complete");
        assert_eq!(event, DONE);
        assert_eq!(next_state.get("most_voted_value"), Some(&json!("x")));
        // The entry state is untouched.
        assert_eq!(round.state().get("most_voted_value"), None);
    }

    #[test]
    fn collect_same_fast_fails_on_divergence() {
        let (state, params) = setup();
        let mut round = observation_round(state, params);

        round
            .process_payload(payload(OBSERVATION, arb_address(0), json!({"value": "x"})))
            .unwrap();
        round
            .process_payload(payload(OBSERVATION, arb_address(1), json!({"value": "y"})))
            .unwrap();

        // Third distinct value: 1 remaining + largest bucket of 1 < 3.
        let err = round
            .process_payload(payload(OBSERVATION, arb_address(2), json!({"value": "z"})))
            .unwrap_err();
        assert!(matches!(err, RoundError::Internal(_)));

        // The diverging payload was not recorded.
        assert!(round.end_block().is_none());
    }

    #[test]
    fn collect_same_rejects_repeat_sender_and_stranger() {
        let (state, params) = setup();
        let mut round = observation_round(state, params);

        let p = payload(OBSERVATION, arb_address(0), json!({"value": "x"}));
        round.process_payload(p.clone()).unwrap();

        assert!(matches!(
            round.check_payload(&p),
            Err(RoundError::TransactionNotValid(_))
        ));

        let stranger = payload(OBSERVATION, arb_address(99), json!({"value": "x"}));
        assert!(matches!(
            round.check_payload(&stranger),
            Err(RoundError::TransactionNotValid(_))
        ));
    }

    #[test]
    fn most_voted_payload_needs_threshold() {
        let (state, params) = setup();
        let mut round = observation_round(state, params);
        round
            .process_payload(payload(OBSERVATION, arb_address(0), json!({"value": "x"})))
            .unwrap();

        assert!(matches!(
            round.most_voted_payload(),
            Err(RoundError::Internal(_))
        ));
        assert!(round.end_block().is_none());
    }

    #[test]
    fn check_transaction_rejects_wrong_tag() {
        let (state, params) = setup();
        let round = observation_round(state, params);

        let p = payload(VOTE, arb_address(0), json!({"vote": true}));
        let tx = Transaction::new_unchecked(p, "00".to_owned());
        assert!(matches!(
            round.check_transaction(&tx),
            Err(RoundError::TransactionTypeNotRecognized { .. })
        ));
    }

    fn voting_round(state: PeriodState, params: ConsensusParams) -> VotingRound {
        VotingRound::new(
            VotingConfig {
                round_id: "vote_on_value",
                allowed_tx_type: VOTE.transaction_type,
                done_event: DONE,
                negative_event: NEGATIVE,
                no_majority_event: Some(NO_MAJORITY),
            },
            state,
            params,
        )
    }

    #[test]
    fn voting_positive() {
        let (state, params) = setup();
        let mut round = voting_round(state, params);

        for seed in 0u64..3 {
            round
                .process_payload(payload(VOTE, arb_address(seed), json!({"vote": true})))
                .unwrap();
        }

        assert!(round.positive_vote_threshold_reached());
        assert!(!round.negative_vote_threshold_reached());
        let (_, event) = round.end_block().expect("vote is decided");
        assert_eq!(event, DONE);
    }

    #[test]
    fn voting_negative() {
        let (state, params) = setup();
        let mut round = voting_round(state, params);

        for seed in 0u64..3 {
            round
                .process_payload(payload(VOTE, arb_address(seed), json!({"vote": false})))
                .unwrap();
        }

        assert!(round.negative_vote_threshold_reached());
        let (_, event) = round.end_block().expect("vote is decided");
        assert_eq!(event, NEGATIVE);
    }

    #[test]
    fn voting_undecided_yields_nothing() {
        let (state, params) = setup();
        let mut round = voting_round(state, params);

        round
            .process_payload(payload(VOTE, arb_address(0), json!({"vote": true})))
            .unwrap();
        round
            .process_payload(payload(VOTE, arb_address(1), json!({"vote": true})))
            .unwrap();

        assert!(round.end_block().is_none());
    }

    #[test]
    fn voting_requires_boolean_vote() {
        let (state, params) = setup();
        let round = voting_round(state, params);

        // A payload of the right tag whose vote field is not a boolean;
        // built from a sibling variant to bypass the codec-level check.
        let p = payload(OBSERVATION, arb_address(0), json!({"value": "x"}));
        assert!(matches!(
            round.check_payload(&p),
            Err(RoundError::TransactionNotValid(_))
        ));
    }

    #[test]
    fn only_keeper_sends() {
        let (state, params) = setup();
        let keeper = arb_address(0);
        let state = state.update([(
            MOST_VOTED_KEEPER_KEY.to_owned(),
            Value::String(keeper.as_str().to_owned()),
        )]);

        let mut round = OnlyKeeperSendsRound::new(
            OnlyKeeperSendsConfig {
                round_id: "publish",
                allowed_tx_type: PUBLISH.transaction_type,
                collection_key: "published_tx",
                done_event: DONE,
            },
            state,
            params,
        );

        assert!(round.end_block().is_none());

        let intruder = payload(PUBLISH, arb_address(1), json!({"tx_hash": "0xbb"}));
        assert!(matches!(
            round.check_payload(&intruder),
            Err(RoundError::TransactionNotValid(_))
        ));

        let p = payload(PUBLISH, keeper, json!({"tx_hash": "0xaa"}));
        round.check_payload(&p).unwrap();
        round.process_payload(p.clone()).unwrap();
        assert!(round.has_keeper_sent_payload());

        // A second submission fails the check, a second processing is a bug.
        assert!(matches!(
            round.check_payload(&p),
            Err(RoundError::TransactionNotValid(_))
        ));
        assert!(matches!(
            round.process_payload(p),
            Err(RoundError::Internal(_))
        ));

        let (next_state, event) = round.end_block().expect("keeper has sent");
        assert_eq!(event, DONE);
        assert_eq!(
            next_state.get("published_tx"),
            Some(&json!({"tx_hash": "0xaa"}))
        );
    }

    #[test]
    fn only_keeper_needs_a_keeper() {
        let (state, params) = setup();
        let round = OnlyKeeperSendsRound::new(
            OnlyKeeperSendsConfig {
                round_id: "publish",
                allowed_tx_type: PUBLISH.transaction_type,
                collection_key: "published_tx",
                done_event: DONE,
            },
            state,
            params,
        );

        let p = payload(PUBLISH, arb_address(0), json!({"tx_hash": "0xaa"}));
        assert!(matches!(
            round.check_payload(&p),
            Err(RoundError::Internal(_))
        ));
    }

    #[test]
    fn collect_different_until_all_needs_everyone() {
        let (state, params) = setup();
        let mut round = CollectDifferentUntilAllRound::new(
            CollectDifferentUntilAllConfig {
                round_id: "registration",
                allowed_tx_type: REGISTRATION.transaction_type,
                collection_key: "registrations",
                done_event: DONE,
            },
            state,
            params,
        );

        for seed in 0u64..3 {
            round
                .process_payload(payload(
                    REGISTRATION,
                    arb_address(seed),
                    json!({"identity": format!("id-{seed}")}),
                ))
                .unwrap();
            assert!(round.end_block().is_none());
        }

        // A repeated value from a fresh sender is rejected.
        let dup = payload(REGISTRATION, arb_address(3), json!({"identity": "id-0"}));
        assert!(matches!(
            round.check_payload(&dup),
            Err(RoundError::TransactionNotValid(_))
        ));

        round
            .process_payload(payload(
                REGISTRATION,
                arb_address(3),
                json!({"identity": "id-3"}),
            ))
            .unwrap();
        assert!(round.collection_threshold_reached());

        let (next_state, event) = round.end_block().expect("everyone registered");
        assert_eq!(event, DONE);
        let collected = next_state.get("registrations").unwrap();
        assert_eq!(collected.as_object().unwrap().len(), 4);
        assert_eq!(
            collected[arb_address(3).as_str()],
            json!({"identity": "id-3"})
        );
    }

    #[test]
    fn collect_different_until_threshold_stops_at_quorum() {
        let (state, params) = setup();
        let mut round = CollectDifferentUntilThresholdRound::new(
            CollectDifferentUntilThresholdConfig {
                round_id: "collect_signatures",
                allowed_tx_type: OBSERVATION.transaction_type,
                collection_key: "signatures",
                done_event: DONE,
            },
            state,
            params,
        );

        for seed in 0u64..2 {
            round
                .process_payload(payload(
                    OBSERVATION,
                    arb_address(seed),
                    json!({"value": format!("sig-{seed}")}),
                ))
                .unwrap();
        }
        assert!(round.end_block().is_none());

        round
            .process_payload(payload(OBSERVATION, arb_address(2), json!({"value": "sig-2"})))
            .unwrap();
        assert!(round.collection_threshold_reached());

        let (next_state, event) = round.end_block().expect("quorum has sent");
        assert_eq!(event, DONE);
        assert_eq!(
            next_state.get("signatures").unwrap().as_object().unwrap().len(),
            3
        );
    }
}
