// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
mod app;
mod event;
pub mod quorum;
pub mod rounds;
mod state;
pub mod timeouts;

pub use app::{AbciApp, AbciAppSpec, RoundDef, RoundFactory};
pub use event::Event;
pub use rounds::{Round, RoundError};
pub use state::{ConsensusParams, PeriodState, MOST_VOTED_KEEPER_KEY};
