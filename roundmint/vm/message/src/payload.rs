// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
use rand::Rng;
use serde_json::{Map, Value};
use thiserror::Error;

use roundmint_vm_core::{Address, AddressError};
use roundmint_vm_encoding::to_canonical_vec;

use crate::registry::{self, FieldKind};

/// Envelope keys that cannot double as variant data fields.
const RESERVED_KEYS: [&str; 3] = ["id", "sender", "transaction_type"];

/// Number of random bytes in a default transaction id; hex doubles the length.
const TX_ID_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("transaction type not recognized: {0}")]
    TransactionTypeNotRecognized(String),
    #[error("transaction type registered twice: {0}")]
    DuplicateTransactionType(&'static str),
    #[error("payload of {transaction_type} is missing field {field}")]
    MissingField {
        transaction_type: &'static str,
        field: &'static str,
    },
    #[error("payload of {transaction_type} has unknown field {field}")]
    UnknownField {
        transaction_type: &'static str,
        field: String,
    },
    #[error("field {field} of {transaction_type} must be of kind {expected:?}")]
    WrongFieldKind {
        transaction_type: &'static str,
        field: &'static str,
        expected: FieldKind,
    },
    #[error("payload field {0} collides with an envelope key")]
    ReservedField(String),
    #[error("payload envelope is invalid: {0}")]
    InvalidEnvelope(String),
    #[error("payload cannot be parsed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload sender is invalid: {0}")]
    Sender(#[from] AddressError),
}

/// A single payload of a registered variant, as sent by one participant.
///
/// The wire form is a self-describing canonical JSON object: the envelope
/// keys (`transaction_type`, `sender`, `id`) and the variant data fields all
/// sorted together, so equal payloads encode byte-identically on every
/// replica. Signatures are made over exactly these bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    transaction_type: String,
    sender: Address,
    id: String,
    data: Map<String, Value>,
}

impl Payload {
    /// Create a payload of a registered variant with a fresh random id.
    pub fn new(
        transaction_type: &str,
        sender: Address,
        data: Map<String, Value>,
    ) -> Result<Self, PayloadError> {
        Self::with_id(transaction_type, sender, random_id(), data)
    }

    /// Create a payload with a caller-chosen id, e.g. when re-sending.
    pub fn with_id(
        transaction_type: &str,
        sender: Address,
        id: String,
        data: Map<String, Value>,
    ) -> Result<Self, PayloadError> {
        let payload_type = registry::resolve(transaction_type)?;
        if let Some(key) = data.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(PayloadError::ReservedField(key.clone()));
        }
        payload_type.check_fields(&data)?;
        Ok(Self {
            transaction_type: transaction_type.to_owned(),
            sender,
            id,
            data,
        })
    }

    pub fn transaction_type(&self) -> &str {
        &self.transaction_type
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// The variant-specific data as a single JSON value.
    ///
    /// Rounds tally the canonical encoding of this to decide agreement.
    pub fn value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Canonical bytes of the self-describing envelope.
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let mut envelope = self.data.clone();
        envelope.insert("id".to_owned(), Value::String(self.id.clone()));
        envelope.insert(
            "sender".to_owned(),
            Value::String(self.sender.as_str().to_owned()),
        );
        envelope.insert(
            "transaction_type".to_owned(),
            Value::String(self.transaction_type.clone()),
        );
        Ok(to_canonical_vec(&Value::Object(envelope))?)
    }

    /// Parse the envelope, look up the variant by its tag and validate the
    /// remaining fields against the registered schema.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Value::Object(mut envelope) = value else {
            return Err(PayloadError::InvalidEnvelope(
                "payload is not a JSON object".to_owned(),
            ));
        };

        let transaction_type = take_string(&mut envelope, "transaction_type")?;
        let sender: Address = take_string(&mut envelope, "sender")?.parse()?;
        let id = take_string(&mut envelope, "id")?;

        let payload_type = registry::resolve(&transaction_type)?;
        payload_type.check_fields(&envelope)?;

        Ok(Self {
            transaction_type,
            sender,
            id,
            data: envelope,
        })
    }
}

fn take_string(envelope: &mut Map<String, Value>, key: &str) -> Result<String, PayloadError> {
    match envelope.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(PayloadError::InvalidEnvelope(format!(
            "envelope key {key} must be a string"
        ))),
        None => Err(PayloadError::InvalidEnvelope(format!(
            "envelope key {key} is missing"
        ))),
    }
}

fn random_id() -> String {
    let mut bz = [0u8; TX_ID_LEN];
    rand::thread_rng().fill(&mut bz);
    hex::encode(bz)
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;
    use serde_json::{json, Map, Value};

    use crate::registry::{self, FieldDef, FieldKind, PayloadType};
    use crate::testing::{arb_address, registered};

    use super::{Payload, PayloadError};

    const OBSERVATION: PayloadType = PayloadType {
        transaction_type: "payload_test_observation",
        fields: &[FieldDef::required("value", FieldKind::String)],
    };

    fn observation(value: &str) -> Payload {
        registered(OBSERVATION);
        let data = json!({ "value": value });
        Payload::with_id(
            OBSERVATION.transaction_type,
            "0x00a329c0648769a73afac7f9381e08fb43dbea72".parse().unwrap(),
            "00000000000000000000000000000001".to_owned(),
            data.as_object().unwrap().clone(),
        )
        .unwrap()
    }

    #[quickcheck]
    fn prop_roundtrip(seed: u64, value: String) -> Result<(), String> {
        registered(OBSERVATION);
        let data = json!({ "value": value });
        let payload = Payload::new(
            OBSERVATION.transaction_type,
            arb_address(seed),
            data.as_object().unwrap().clone(),
        )
        .map_err(|e| e.to_string())?;

        let bytes = payload.encode().map_err(|e| e.to_string())?;
        let decoded = Payload::decode(&bytes).map_err(|e| e.to_string())?;
        if decoded != payload {
            return Err("decoded payload differs".into());
        }
        Ok(())
    }

    #[test]
    fn encoding_is_canonical() {
        // Same payload assembled in two different insertion orders.
        let p1 = observation("x");
        let mut data = Map::new();
        data.insert("value".to_owned(), Value::String("x".to_owned()));
        let p2 = Payload::with_id(
            OBSERVATION.transaction_type,
            p1.sender().clone(),
            p1.id().to_owned(),
            data,
        )
        .unwrap();

        assert_eq!(p1, p2);
        assert_eq!(p1.encode().unwrap(), p2.encode().unwrap());

        // Envelope keys and data keys sort together.
        let text = String::from_utf8(p1.encode().unwrap()).unwrap();
        assert_eq!(
            text,
            r#"{"id":"00000000000000000000000000000001","sender":"0x00a329c0648769a73afac7f9381e08fb43dbea72","transaction_type":"payload_test_observation","value":"x"}"#
        );
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let bz = json!({
            "transaction_type": "payload_test_never_registered",
            "sender": "0x00a329c0648769a73afac7f9381e08fb43dbea72",
            "id": "00000000000000000000000000000001",
        });
        assert!(matches!(
            Payload::decode(&serde_json::to_vec(&bz).unwrap()),
            Err(PayloadError::TransactionTypeNotRecognized(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_field() {
        registered(OBSERVATION);
        let bz = json!({
            "transaction_type": OBSERVATION.transaction_type,
            "sender": "0x00a329c0648769a73afac7f9381e08fb43dbea72",
            "id": "00000000000000000000000000000001",
        });
        assert!(matches!(
            Payload::decode(&serde_json::to_vec(&bz).unwrap()),
            Err(PayloadError::MissingField { .. })
        ));
    }

    #[test]
    fn new_rejects_reserved_field() {
        registered(OBSERVATION);
        let data = json!({ "value": "x", "sender": "oops" });
        let res = Payload::new(
            OBSERVATION.transaction_type,
            "0x00a329c0648769a73afac7f9381e08fb43dbea72".parse().unwrap(),
            data.as_object().unwrap().clone(),
        );
        assert!(matches!(res, Err(PayloadError::ReservedField(_))));
    }

    #[test]
    fn registry_registration_is_upfront() {
        // `registered` tolerates repetition within the test process.
        registered(OBSERVATION);
        assert!(registry::is_registered(OBSERVATION.transaction_type));
    }
}
