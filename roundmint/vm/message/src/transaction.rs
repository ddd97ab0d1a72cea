// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use serde_json::{json, Value};
use thiserror::Error;

use roundmint_crypto::{sign_recoverable, SecretKey};
use roundmint_vm_core::LedgerId;
use roundmint_vm_encoding::to_canonical_vec;

use crate::payload::{Payload, PayloadError};
use crate::verify::SignatureVerifier;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("invalid signature: {0}")]
    SignatureNotValid(String),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("transaction envelope is invalid: {0}")]
    InvalidEnvelope(String),
    #[error("transaction cannot be parsed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A payload wrapped with the sender's signature.
///
/// The signature covers the canonical payload bytes with the ledger id
/// appended, so the same payload cannot be replayed on another ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    payload: Payload,
    signature: String,
}

impl Transaction {
    /// Wrap a payload with existing signature bytes.
    ///
    /// The signature is not verified.
    pub fn new_unchecked(payload: Payload, signature: String) -> Self {
        Self { payload, signature }
    }

    /// Sign the payload, binding it to the ledger.
    pub fn sign(
        payload: Payload,
        sk: &SecretKey,
        ledger_id: &LedgerId,
    ) -> Result<Self, TransactionError> {
        let data = signable(&payload, ledger_id)?;
        let signature = hex::encode(sign_recoverable(sk, &data));
        Ok(Self { payload, signature })
    }

    /// Verify that the payload sender produced the signature.
    pub fn verify(
        &self,
        verifier: &dyn SignatureVerifier,
        ledger_id: &LedgerId,
    ) -> Result<(), TransactionError> {
        let message = self.payload.encode()?;
        if verifier.verify(ledger_id, self.payload.sender(), &message, &self.signature) {
            Ok(())
        } else {
            Err(TransactionError::SignatureNotValid(format!(
                "signature of {} over payload {} does not verify",
                self.payload.sender(),
                self.payload.id(),
            )))
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Consume self and return the payload.
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Canonical bytes of the transaction envelope: the payload JSON carried
    /// as a UTF-8 string next to the hex signature.
    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        let payload = String::from_utf8(self.payload.encode()?)
            .map_err(|e| TransactionError::InvalidEnvelope(e.to_string()))?;
        let envelope = json!({
            "payload": payload,
            "signature": self.signature,
        });
        Ok(to_canonical_vec(&envelope)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(envelope) = value else {
            return Err(TransactionError::InvalidEnvelope(
                "transaction is not a JSON object".to_owned(),
            ));
        };

        let payload = match envelope.get("payload") {
            Some(Value::String(s)) => Payload::decode(s.as_bytes())?,
            _ => {
                return Err(TransactionError::InvalidEnvelope(
                    "envelope key payload must be a string".to_owned(),
                ))
            }
        };
        let signature = match envelope.get("signature") {
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(TransactionError::InvalidEnvelope(
                    "envelope key signature must be a string".to_owned(),
                ))
            }
        };

        Ok(Self { payload, signature })
    }
}

/// Bytes covered by the signature.
fn signable(payload: &Payload, ledger_id: &LedgerId) -> Result<Vec<u8>, PayloadError> {
    let mut data = payload.encode()?;
    data.extend_from_slice(ledger_id.as_bytes());
    Ok(data)
}
