// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unix timestamp (in seconds) taken from a block header.
///
/// Timeout deadlines compare against this, never against the system clock,
/// so that every replica sees time advance in the same deterministic steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// The instant reached after waiting `d` from this one. Saturates instead
    /// of wrapping, a deadline in the far future is as good as never.
    pub fn after(&self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Timestamp;

    #[test]
    fn after_adds_seconds() {
        assert_eq!(Timestamp(10).after(Duration::from_secs(30)), Timestamp(40));
    }

    #[test]
    fn after_saturates() {
        let far = Timestamp(u64::MAX).after(Duration::from_secs(1));
        assert_eq!(far, Timestamp(u64::MAX));
    }
}
