// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of bytes in the account part of an address.
pub const ADDR_LEN: usize = 20;

/// Number of characters in the canonical string form: `0x` plus two per byte.
pub const ADDR_STR_LEN: usize = 2 + 2 * ADDR_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must be {ADDR_STR_LEN} characters long, got {0}")]
    WrongLength(usize),
    #[error("address contains non-hex characters: {0}")]
    NotHex(String),
}

/// Account address of a participant.
///
/// The canonical form is a `0x`-prefixed, 42 character, lowercase hex string.
/// Parsing accepts mixed case but normalizes, so that two spellings of the
/// same account cannot appear as two different participants.
///
/// `Ord` follows the canonical string, which makes every collection keyed
/// by sender iterate in the same order on every replica.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Address of the account with the given 20 byte digest.
    pub fn from_bytes(bz: &[u8; ADDR_LEN]) -> Self {
        Self(format!("0x{}", hex::encode(bz)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(hex_part) = s.strip_prefix("0x") else {
            return Err(AddressError::MissingPrefix(s.to_owned()));
        };
        if s.len() != ADDR_STR_LEN {
            return Err(AddressError::WrongLength(s.len()));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::NotHex(s.to_owned()));
        }
        Ok(Self(format!("0x{}", hex_part.to_lowercase())))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
