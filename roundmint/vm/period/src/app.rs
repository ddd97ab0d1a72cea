// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use roundmint_vm_core::Timestamp;
use roundmint_vm_message::Transaction;

use crate::event::Event;
use crate::rounds::{Round, RoundError};
use crate::state::{ConsensusParams, PeriodState};
use crate::timeouts::{EntryId, Timeouts};

/// Constructor of a round instance from the state it is entered with.
pub type RoundFactory = fn(PeriodState, ConsensusParams) -> Box<dyn Round>;

/// A round as the transition table refers to it: the stable id plus its
/// constructor.
#[derive(Clone, Copy)]
pub struct RoundDef {
    pub round_id: &'static str,
    pub new_round: RoundFactory,
}

/// Static description of a period application.
///
/// The transition table is a flat relation of `(from round, event) → round`
/// rows keyed by stable round ids. It is conservatively open: events without
/// a row are ignored at runtime, not rejected.
pub struct AbciAppSpec {
    pub initial_round: RoundDef,
    pub transitions: BTreeMap<(&'static str, Event), RoundDef>,
    /// Events to schedule as timeouts whenever a round is entered. When such
    /// an event fires it goes through the transition table like any other.
    pub event_to_timeout: BTreeMap<Event, Duration>,
    /// Rounds that terminate the period; they are never instantiated.
    pub final_rounds: BTreeSet<&'static str>,
}

/// The round state machine.
///
/// Holds the current round, the synchronized [`PeriodState`] and the timeout
/// queue, and maps `(round, event)` pairs to the next round. Time only moves
/// when the driver feeds in block timestamps, so identical inputs replay into
/// identical transitions on every replica.
pub struct AbciApp {
    spec: AbciAppSpec,
    params: ConsensusParams,
    state: PeriodState,
    current_round: Option<Box<dyn Round>>,
    last_round_id: Option<&'static str>,
    last_timestamp: Option<Timestamp>,
    latest_result: Option<PeriodState>,
    timeouts: Timeouts,
    /// Timeout entries scheduled for the current round.
    scheduled: Vec<EntryId>,
}

impl AbciApp {
    pub fn new(spec: AbciAppSpec, params: ConsensusParams, state: PeriodState) -> Self {
        Self {
            spec,
            params,
            state,
            current_round: None,
            last_round_id: None,
            last_timestamp: None,
            latest_result: None,
            timeouts: Timeouts::new(),
            scheduled: Vec::new(),
        }
    }

    /// Instantiate the initial round.
    ///
    /// Timeouts are not scheduled yet; they attach to block time, which is
    /// first known at the opening `begin_block`.
    pub fn setup(&mut self) {
        let round = (self.spec.initial_round.new_round)(self.state.clone(), self.params);
        tracing::debug!(round = round.round_id(), "initial round");
        self.current_round = Some(round);
    }

    pub fn current_round(&self) -> Option<&dyn Round> {
        self.current_round.as_deref()
    }

    pub fn current_round_id(&self) -> Option<&'static str> {
        self.current_round.as_ref().map(|r| r.round_id())
    }

    pub fn last_round_id(&self) -> Option<&'static str> {
        self.last_round_id
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.last_timestamp
    }

    /// The state produced by the most recent verdict.
    pub fn latest_result(&self) -> Option<&PeriodState> {
        self.latest_result.as_ref()
    }

    /// The synchronized state the current round started from.
    pub fn state(&self) -> &PeriodState {
        &self.state
    }

    /// True once a final round has been reached.
    pub fn is_finished(&self) -> bool {
        self.current_round.is_none()
    }

    pub fn check_transaction(&self, tx: &Transaction) -> Result<(), RoundError> {
        match self.current_round.as_deref() {
            Some(round) => round.check_transaction(tx),
            None => Err(RoundError::Internal(
                "cannot check a transaction, the period has finished".to_owned(),
            )),
        }
    }

    pub fn process_transaction(&mut self, tx: Transaction) -> Result<(), RoundError> {
        match self.current_round.as_deref_mut() {
            Some(round) => round.process_transaction(tx),
            None => Err(RoundError::Internal(
                "cannot process a transaction, the period has finished".to_owned(),
            )),
        }
    }

    /// Apply an event to the transition table, swapping in the next round.
    ///
    /// `result` is the state from the verdict that produced the event; timeout
    /// events carry no verdict and leave the synchronized state as is. Events
    /// without a transition row are logged and ignored, the engine cannot be
    /// trusted to only ever deliver known ones.
    pub fn process_event(&mut self, event: Event, result: Option<PeriodState>) {
        let Some(round) = self.current_round.as_ref() else {
            tracing::warn!(event = %event, "event after the period finished, ignoring");
            return;
        };
        let from = round.round_id();

        let Some(def) = self.spec.transitions.get(&(from, event)).copied() else {
            tracing::warn!(round = from, event = %event, "unknown event, ignoring");
            return;
        };

        if let Some(result) = result {
            self.state = result.clone();
            self.latest_result = Some(result);
        }

        // Outstanding timeouts belong to the round we are leaving.
        for entry_id in self.scheduled.drain(..) {
            if let Err(e) = self.timeouts.cancel_timeout(entry_id) {
                tracing::warn!(error = e.to_string(), "stale timeout entry");
            }
        }

        self.last_round_id = Some(from);

        if self.spec.final_rounds.contains(def.round_id) {
            tracing::info!(from, to = def.round_id, event = %event, "period finished");
            self.current_round = None;
            return;
        }

        tracing::debug!(from, to = def.round_id, event = %event, "round transition");
        self.current_round = Some((def.new_round)(self.state.clone(), self.params));
        self.schedule_timeouts();
    }

    /// Advance block time: remember the timestamp and fire every timeout whose
    /// deadline has passed, in deadline order.
    pub fn update_time(&mut self, timestamp: Timestamp) {
        self.last_timestamp = Some(timestamp);

        // The current round may not have timeouts yet, e.g. the initial round
        // before the first block, or a round whose timeouts all fired without
        // causing a transition.
        if self.scheduled.is_empty() && self.current_round.is_some() {
            self.schedule_timeouts();
        }

        while let Some((deadline, _)) = self.timeouts.get_earliest_timeout() {
            if deadline > timestamp {
                break;
            }
            // The peek above guarantees an entry.
            let Some(fired) = self.timeouts.pop_timeout() else {
                break;
            };
            self.scheduled.retain(|id| *id != fired.entry_id);
            tracing::debug!(
                event = %fired.event,
                deadline = fired.deadline.as_secs(),
                "timeout expired"
            );
            self.process_event(fired.event, None);
        }
    }

    /// Schedule the configured timeouts for the current round, relative to
    /// the last seen block time.
    fn schedule_timeouts(&mut self) {
        let Some(now) = self.last_timestamp else {
            return;
        };
        for (event, timeout) in self.spec.event_to_timeout.iter() {
            let entry_id = self.timeouts.add_timeout(now.after(*timeout), *event);
            self.scheduled.push(entry_id);
        }
    }
}
