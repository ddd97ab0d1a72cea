// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use std::fmt;

/// Event emitted by a round verdict or an expired timeout, driving the
/// transition table.
///
/// Events are stable strings rather than a closed enum so that applications
/// can define their own vocabulary and the transition table stays plain data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Event(pub &'static str);

impl Event {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
