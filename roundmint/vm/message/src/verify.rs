// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use roundmint_crypto::{recover, to_account_digest};
use roundmint_vm_core::{Address, LedgerId};

/// The external signature verification collaborator.
///
/// The rounds never look inside a signature; they only need a yes/no answer
/// bound to the sender and the ledger. Implementations must be deterministic,
/// the same inputs have to verify the same way on every replica.
pub trait SignatureVerifier {
    /// True iff `signature_hex` over `message` on `ledger_id` was produced by
    /// the owner of `sender`.
    fn verify(
        &self,
        ledger_id: &LedgerId,
        sender: &Address,
        message: &[u8],
        signature_hex: &str,
    ) -> bool;
}

/// Default verifier for recoverable secp256k1 signatures.
///
/// Recovers the public key from the signature (which validates it), derives
/// the account address and compares it with the claimed sender. The ledger id
/// is appended to the message the same way signing does, for replay
/// protection across ledgers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(
        &self,
        ledger_id: &LedgerId,
        sender: &Address,
        message: &[u8],
        signature_hex: &str,
    ) -> bool {
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };

        let mut data = message.to_vec();
        data.extend_from_slice(ledger_id.as_bytes());

        match recover(&data, &signature) {
            Ok(pk) => Address::from_bytes(&to_account_digest(&pk)) == *sender,
            Err(_) => false,
        }
    }
}
