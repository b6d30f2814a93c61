//! Untyped record values.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Error, InvalidInputError};

/// The JSON form of a repository record: an object with a string `$type`.
///
/// Records from collections without a typed model are carried in this form,
/// and typed records are parsed out of it with [`RecordValue::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue(Map<String, Value>);

impl RecordValue {
    /// Wrap a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error unless the value is an object whose `$type` is a string.
    pub fn new(value: Value) -> Result<Self, Error> {
        let invalid = |reason: &str| -> Error {
            InvalidInputError::RecordValue {
                reason: reason.to_string(),
            }
            .into()
        };

        let Value::Object(map) = value else {
            return Err(invalid("record value must be a JSON object"));
        };

        match map.get("$type") {
            Some(Value::String(_)) => Ok(Self(map)),
            Some(_) => Err(invalid("$type field must be a string")),
            None => Err(invalid("record value must contain a $type field")),
        }
    }

    /// Returns the `$type` field.
    pub fn record_type(&self) -> &str {
        self.0.get("$type").and_then(Value::as_str).unwrap_or_default()
    }

    /// Returns a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the fields as a JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Parse the record into a typed model.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.0.clone()))
    }

    /// Consume and return the inner JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl Serialize for RecordValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RecordValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RecordValue::new(value).map_err(serde::de::Error::custom)
    }
}
