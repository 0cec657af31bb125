// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! JSON representation
//!
//! The export is lossy: it keeps only what a reader of the document sees.
//!
//! * [`S8`](crate::S8) and [`S16`](crate::S16) both become strings. Unpaired surrogates in an
//!   `S16` are replaced with U+FFFD.
//! * Counters become numbers. Bytes are encoded with standard base64.
//! * Map and dictionary keys become strings. Indices are written in decimal and ranks in their
//!   display form.
//! * CRDTs export their effective values, so deleted and overwritten entries disappear.
//! * Custom values this module does not know about become `null`.
//!
//! # Examples
//!
//! ```json
//! {
//!   "name": "John Doe",
//!   "visits": 43,
//!   "phones": [
//!     "+44 1234567",
//!     "+44 2345678"
//!   ]
//! }
//! ```
use crate::{
    Key, Scalar,
    crdts::{Container, Dict, Seq},
};
use serde_json::Value;

fn key_to_string(key: &Key) -> String {
    match key {
        Key::Index(i) => i.to_string(),
        Key::Name(name) => name.clone(),
        Key::Rank(rank) => rank.to_string(),
    }
}

/// Converts a [`Scalar`] to a [`serde_json::Value`].
impl From<&Scalar> for Value {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Bytes(v) => {
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, v).into()
            }
            Scalar::String(v) => v.clone().into(),
            // Non-finite doubles have no JSON form and become `null`.
            Scalar::Double(v) => (*v).into(),
            Scalar::U64(v) => (*v).into(),
            Scalar::I64(v) => (*v).into(),
            Scalar::Bool(v) => (*v).into(),
            #[cfg(feature = "ulid")]
            Scalar::Ulid(v) => v.to_string().into(),
        }
    }
}

/// Converts a [`crate::Value`] to a [`serde_json::Value`].
impl From<&crate::Value> for Value {
    fn from(value: &crate::Value) -> Self {
        match value {
            crate::Value::Nil => Value::Null,
            crate::Value::Atomic(scalar) => scalar.into(),
            crate::Value::S8(s) => s.as_str().into(),
            crate::Value::S16(s) => s.to_string_lossy().into(),
            crate::Value::Array(array) => Value::Array(array.iter().map(Into::into).collect()),
            crate::Value::Map(map) => Value::Object(
                map.entries()
                    .into_iter()
                    .map(|(k, v)| (key_to_string(k), v.into()))
                    .collect(),
            ),
            crate::Value::Counter(counter) => counter.get().into(),
            crate::Value::Custom(_) => custom_to_json(value),
        }
    }
}

impl From<crate::Value> for Value {
    fn from(value: crate::Value) -> Self {
        (&value).into()
    }
}

fn custom_to_json(value: &crate::Value) -> Value {
    if let Some(dict) = value.as_custom::<Dict>() {
        Value::Object(
            dict.items()
                .map(|(k, v)| (key_to_string(k), (&v).into()))
                .collect(),
        )
    } else if let Some(seq) = value.as_custom::<Seq>() {
        Value::Array(seq.items().iter().map(Into::into).collect())
    } else if let Some(container) = value.as_custom::<Container>() {
        (&container.get()).into()
    } else {
        Value::Null
    }
}
