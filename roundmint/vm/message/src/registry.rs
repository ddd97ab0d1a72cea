// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: Apache-2.0, MIT
//! Process-wide registry of payload variants.
//!
//! The registry is populated once at application startup, before any
//! transaction is decoded, and is read-only thereafter. Decoding recovers the
//! concrete variant from the `transaction_type` tag embedded in the
//! serialized form, so every tag must be unique across the process.

use std::collections::BTreeMap;
use std::sync::RwLock;

use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::payload::PayloadError;

/// JSON kind a payload field must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    Number,
    Object,
    Array,
    Any,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Number => value.is_number(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::Any => true,
        }
    }
}

/// Schema of a single variant-specific field.
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDef {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A payload variant: its unique tag and the schema of its data fields.
#[derive(Clone, Copy, Debug)]
pub struct PayloadType {
    pub transaction_type: &'static str,
    pub fields: &'static [FieldDef],
}

impl PayloadType {
    /// Check that the data carries exactly the declared fields, with the
    /// declared kinds. Extra fields are as malformed as missing ones, they
    /// would silently change the canonical encoding the signature covers.
    pub fn check_fields(&self, data: &Map<String, Value>) -> Result<(), PayloadError> {
        for field in self.fields {
            match data.get(field.name) {
                None if field.required => {
                    return Err(PayloadError::MissingField {
                        transaction_type: self.transaction_type,
                        field: field.name,
                    })
                }
                None => {}
                Some(value) if !field.kind.matches(value) => {
                    return Err(PayloadError::WrongFieldKind {
                        transaction_type: self.transaction_type,
                        field: field.name,
                        expected: field.kind,
                    })
                }
                Some(_) => {}
            }
        }
        if let Some(name) = data
            .keys()
            .find(|k| !self.fields.iter().any(|f| f.name == k.as_str()))
        {
            return Err(PayloadError::UnknownField {
                transaction_type: self.transaction_type,
                field: name.clone(),
            });
        }
        Ok(())
    }
}

lazy_static! {
    static ref REGISTRY: RwLock<BTreeMap<&'static str, PayloadType>> =
        RwLock::new(BTreeMap::new());
}

/// Register a payload variant.
///
/// Duplicate tags are a fatal configuration error: two variants would decode
/// from the same serialized form.
pub fn register(payload_type: PayloadType) -> Result<(), PayloadError> {
    let mut registry = REGISTRY.write().expect("payload registry lock poisoned");
    if registry.contains_key(payload_type.transaction_type) {
        return Err(PayloadError::DuplicateTransactionType(
            payload_type.transaction_type,
        ));
    }
    registry.insert(payload_type.transaction_type, payload_type);
    Ok(())
}

/// Look up the variant registered under the given tag.
pub fn resolve(transaction_type: &str) -> Result<PayloadType, PayloadError> {
    REGISTRY
        .read()
        .expect("payload registry lock poisoned")
        .get(transaction_type)
        .copied()
        .ok_or_else(|| PayloadError::TransactionTypeNotRecognized(transaction_type.to_owned()))
}

pub fn is_registered(transaction_type: &str) -> bool {
    REGISTRY
        .read()
        .expect("payload registry lock poisoned")
        .contains_key(transaction_type)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{is_registered, register, resolve, FieldDef, FieldKind, PayloadType};
    use crate::payload::PayloadError;

    const DUP: PayloadType = PayloadType {
        transaction_type: "registry_test_dup",
        fields: &[],
    };

    #[test]
    fn duplicate_registration_fails() {
        register(DUP).unwrap();
        assert!(matches!(
            register(DUP),
            Err(PayloadError::DuplicateTransactionType(_))
        ));
        assert!(is_registered("registry_test_dup"));
    }

    #[test]
    fn resolve_unknown_fails() {
        assert!(matches!(
            resolve("registry_test_never_registered"),
            Err(PayloadError::TransactionTypeNotRecognized(_))
        ));
    }

    #[test]
    fn field_checks() {
        const FIELDS: &[FieldDef] = &[
            FieldDef::required("value", FieldKind::String),
            FieldDef::optional("note", FieldKind::String),
        ];
        let t = PayloadType {
            transaction_type: "registry_test_fields",
            fields: FIELDS,
        };

        let ok = json!({"value": "x"});
        assert!(t.check_fields(ok.as_object().unwrap()).is_ok());

        let missing = json!({"note": "n"});
        assert!(matches!(
            t.check_fields(missing.as_object().unwrap()),
            Err(PayloadError::MissingField { .. })
        ));

        let wrong = json!({"value": 1});
        assert!(matches!(
            t.check_fields(wrong.as_object().unwrap()),
            Err(PayloadError::WrongFieldKind { .. })
        ));

        let extra = json!({"value": "x", "other": 1});
        assert!(matches!(
            t.check_fields(extra.as_object().unwrap()),
            Err(PayloadError::UnknownField { .. })
        ));
    }
}
