// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Canonical JSON encoding.
//!
//! Signatures cover these bytes and quorum tallies compare them, so two
//! replicas (and two code paths on the same replica) must produce identical
//! output for structurally equal values. Canonical form is UTF-8 JSON with
//! object keys sorted and no insignificant whitespace.
//!
//! Sorting comes from `serde_json::Map` being backed by a `BTreeMap`;
//! enabling the `preserve_order` feature anywhere in the workspace would
//! silently break this.

use serde::Serialize;
use serde_json::Value;

/// Convert any serializable value into a JSON value whose objects iterate
/// in key order.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}

/// Canonical bytes of a JSON value.
pub fn to_canonical_vec(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Canonical string of a JSON value.
///
/// Lexicographic comparison of these strings is the tie-break order used by
/// `most_voted_payload`.
pub fn to_canonical_string(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}
