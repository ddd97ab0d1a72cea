// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
mod payload;
pub mod registry;
mod transaction;
mod verify;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use payload::{Payload, PayloadError};
pub use registry::{FieldDef, FieldKind, PayloadType};
pub use transaction::{Transaction, TransactionError};
pub use verify::{Secp256k1Verifier, SignatureVerifier};
