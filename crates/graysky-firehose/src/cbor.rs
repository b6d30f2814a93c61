//! DAG-CBOR helpers.
//!
//! Frames and records arrive as DAG-CBOR. We decode them into
//! [`ciborium::Value`] and read fields by name; record bodies are then
//! converted to the JSON data model so the typed records can be parsed with
//! serde.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ciborium::Value as Cbor;
use cid::Cid;
use serde_json::{Map, Number, Value};

/// CBOR tag for a CID link.
pub(crate) const CID_LINK_TAG: u64 = 42;

/// Decode a single CBOR value from the front of `reader`, advancing it.
pub(crate) fn read_value(reader: &mut &[u8]) -> Result<Cbor, String> {
    ciborium::de::from_reader(reader).map_err(|e| e.to_string())
}

/// Parse a CID link (tag 42 over `0x00 || cid bytes`).
pub(crate) fn link_to_cid(value: &Cbor) -> Option<Cid> {
    let Cbor::Tag(CID_LINK_TAG, inner) = value else {
        return None;
    };
    let Cbor::Bytes(bytes) = inner.as_ref() else {
        return None;
    };
    match bytes.split_first() {
        Some((0x00, cid)) => Cid::try_from(cid).ok(),
        _ => None,
    }
}

/// Convert a DAG-CBOR value to the JSON data model.
///
/// Links become `{"$link": "<cid>"}` and byte strings become
/// `{"$bytes": "<base64>"}`.
pub(crate) fn to_json(value: &Cbor) -> Result<Value, String> {
    Ok(match value {
        Cbor::Null => Value::Null,
        Cbor::Bool(b) => Value::Bool(*b),
        Cbor::Text(s) => Value::String(s.clone()),
        Cbor::Integer(i) => {
            let i = i128::from(*i);
            if let Ok(i) = i64::try_from(i) {
                Value::Number(i.into())
            } else if let Ok(u) = u64::try_from(i) {
                Value::Number(u.into())
            } else {
                return Err(format!("integer {i} out of range"));
            }
        }
        Cbor::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| format!("non-finite float {f}"))?,
        Cbor::Bytes(bytes) => {
            let mut map = Map::new();
            map.insert("$bytes".to_string(), Value::String(STANDARD_NO_PAD.encode(bytes)));
            Value::Object(map)
        }
        Cbor::Tag(CID_LINK_TAG, _) => {
            let cid = link_to_cid(value).ok_or("invalid CID link")?;
            let mut map = Map::new();
            map.insert("$link".to_string(), Value::String(cid.to_string()));
            Value::Object(map)
        }
        Cbor::Tag(tag, _) => return Err(format!("unsupported tag {tag}")),
        Cbor::Array(items) => Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?),
        Cbor::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let Cbor::Text(key) = key else {
                    return Err("map keys must be strings".to_string());
                };
                map.insert(key.clone(), to_json(value)?);
            }
            Value::Object(map)
        }
        _ => return Err("unsupported CBOR value".to_string()),
    })
}

/// Named-field access over a decoded CBOR map.
pub(crate) struct Fields<'a> {
    kind: &'a str,
    entries: &'a [(Cbor, Cbor)],
}

impl<'a> Fields<'a> {
    /// Wrap `value`, which must be a map. `kind` names it in error messages.
    pub(crate) fn new(kind: &'a str, value: &'a Cbor) -> Result<Self, String> {
        match value {
            Cbor::Map(entries) => Ok(Self { kind, entries }),
            _ => Err(format!("{kind} is not a map")),
        }
    }

    fn raw(&self, key: &str) -> Option<&'a Cbor> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Cbor::Text(k) if k == key))
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
    }

    fn missing(&self, key: &str) -> String {
        format!("{}: missing or invalid field '{key}'", self.kind)
    }

    pub(crate) fn int(&self, key: &str) -> Result<i64, String> {
        self.opt_int(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_int(&self, key: &str) -> Result<Option<i64>, String> {
        match self.raw(key) {
            None => Ok(None),
            Some(Cbor::Integer(i)) => i64::try_from(*i).map(Some).map_err(|_| self.missing(key)),
            Some(_) => Err(self.missing(key)),
        }
    }

    pub(crate) fn text(&self, key: &str) -> Result<String, String> {
        self.opt_text(key)?.ok_or_else(|| self.missing(key))
    }

    pub(crate) fn opt_text(&self, key: &str) -> Result<Option<String>, String> {
        match self.raw(key) {
            None => Ok(None),
            Some(Cbor::Text(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.missing(key)),
        }
    }

    pub(crate) fn opt_bool(&self, key: &str) -> Result<Option<bool>, String> {
        match self.raw(key) {
            None => Ok(None),
            Some(Cbor::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.missing(key)),
        }
    }

    pub(crate) fn opt_bytes(&self, key: &str) -> Result<Option<&'a [u8]>, String> {
        match self.raw(key) {
            None => Ok(None),
            Some(Cbor::Bytes(b)) => Ok(Some(b)),
            Some(_) => Err(self.missing(key)),
        }
    }

    pub(crate) fn opt_array(&self, key: &str) -> Result<Option<&'a [Cbor]>, String> {
        match self.raw(key) {
            None => Ok(None),
            Some(Cbor::Array(items)) => Ok(Some(items)),
            Some(_) => Err(self.missing(key)),
        }
    }

    /// A CID link field, rendered as its string form.
    pub(crate) fn opt_link(&self, key: &str) -> Result<Option<String>, String> {
        match self.raw(key) {
            None => Ok(None),
            Some(v) => link_to_cid(v)
                .map(|cid| Some(cid.to_string()))
                .ok_or_else(|| self.missing(key)),
        }
    }
}
