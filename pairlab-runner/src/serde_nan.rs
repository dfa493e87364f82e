//! Serde adapter for `f64` fields that may be NaN.
//!
//! JSON has no NaN: serde_json writes non-finite floats as `null` and then
//! refuses to read `null` back into an `f64`. Fields tagged with
//! `#[serde(with = "crate::serde_nan")]` write `null` and read it back as NaN.

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_some(value)
    } else {
        serializer.serialize_none()
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
