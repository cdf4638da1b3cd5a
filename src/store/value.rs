//! Typed document values and their Firestore REST encoding.

use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A document is an ordered map of field names to values.
pub type Document = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Map(Document),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Document> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Firestore REST `Value` JSON.
    pub fn to_firestore(&self) -> Value {
        match self {
            FieldValue::Null => json!({ "nullValue": null }),
            FieldValue::Boolean(b) => json!({ "booleanValue": b }),
            // int64 travels as a decimal string
            FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
            FieldValue::Double(d) => json!({ "doubleValue": d }),
            FieldValue::String(s) => json!({ "stringValue": s }),
            FieldValue::Timestamp(t) => {
                json!({ "timestampValue": t.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
            }
            FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
            FieldValue::Array(values) => json!({
                "arrayValue": { "values": values.iter().map(FieldValue::to_firestore).collect::<Vec<_>>() }
            }),
        }
    }

    pub fn from_firestore(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| decode_error("value is not an object", value))?;
        let (kind, inner) = obj
            .iter()
            .next()
            .ok_or_else(|| decode_error("value has no type tag", value))?;
        match kind.as_str() {
            "nullValue" => Ok(FieldValue::Null),
            "booleanValue" => inner
                .as_bool()
                .map(FieldValue::Boolean)
                .ok_or_else(|| decode_error("booleanValue is not a bool", value)),
            "integerValue" => {
                let parsed = match inner {
                    Value::String(s) => s.parse::<i64>().ok(),
                    other => other.as_i64(),
                };
                parsed
                    .map(FieldValue::Integer)
                    .ok_or_else(|| decode_error("integerValue is not an int64", value))
            }
            "doubleValue" => inner
                .as_f64()
                .map(FieldValue::Double)
                .ok_or_else(|| decode_error("doubleValue is not a number", value)),
            "stringValue" | "referenceValue" | "bytesValue" => inner
                .as_str()
                .map(|s| FieldValue::String(s.to_string()))
                .ok_or_else(|| decode_error("string value is not a string", value)),
            "timestampValue" => inner
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| FieldValue::Timestamp(t.with_timezone(&Utc)))
                .ok_or_else(|| decode_error("timestampValue is not RFC 3339", value)),
            "mapValue" => Ok(FieldValue::Map(decode_fields(inner.get("fields"))?)),
            "arrayValue" => {
                let values = match inner.get("values").and_then(Value::as_array) {
                    Some(values) => values
                        .iter()
                        .map(FieldValue::from_firestore)
                        .collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                };
                Ok(FieldValue::Array(values))
            }
            "geoPointValue" => {
                let mut point = Document::new();
                for axis in ["latitude", "longitude"] {
                    let coord = inner.get(axis).and_then(Value::as_f64).unwrap_or(0.0);
                    point.insert(axis.to_string(), FieldValue::Double(coord));
                }
                Ok(FieldValue::Map(point))
            }
            other => Err(decode_error(&format!("unknown value type {}", other), value)),
        }
    }

    /// Plain JSON rendering for display; timestamps become RFC 3339 strings.
    pub fn to_plain_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => json!(b),
            FieldValue::Integer(i) => json!(i),
            FieldValue::Double(d) => json!(d),
            FieldValue::String(s) => json!(s),
            FieldValue::Timestamp(t) => json!(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            FieldValue::Map(fields) => document_to_json(fields),
            FieldValue::Array(values) => {
                Value::Array(values.iter().map(FieldValue::to_plain_json).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(t)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

fn encode_fields(fields: &Document) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_firestore()))
        .collect()
}

fn decode_fields(fields: Option<&Value>) -> Result<Document> {
    let Some(fields) = fields else {
        return Ok(Document::new());
    };
    let obj = fields
        .as_object()
        .ok_or_else(|| decode_error("fields is not an object", fields))?;
    obj.iter()
        .map(|(k, v)| {
            FieldValue::from_firestore(v)
                .map(|fv| (k.clone(), fv))
                .map_err(|e| match e {
                    Error::Decode { message, context } => Error::Decode {
                        message,
                        context: ErrorContext {
                            field_path: Some(match context.field_path {
                                Some(inner) => format!("{}.{}", k, inner),
                                None => k.clone(),
                            }),
                            ..context
                        },
                    },
                    other => other,
                })
        })
        .collect()
}

/// Request body `{ "fields": ... }` for a document write.
pub fn encode_document(document: &Document) -> Value {
    json!({ "fields": encode_fields(document) })
}

/// Decode a Firestore `Document` resource; only `fields` is kept.
pub fn decode_document(resource: &Value) -> Result<Document> {
    decode_fields(resource.get("fields"))
}

pub fn document_to_json(document: &Document) -> Value {
    Value::Object(
        document
            .iter()
            .map(|(k, v)| (k.clone(), v.to_plain_json()))
            .collect(),
    )
}

fn decode_error(message: &str, value: &Value) -> Error {
    Error::decode_with_context(
        message,
        ErrorContext::new()
            .with_details(value.to_string())
            .with_source("firestore_value"),
    )
}
