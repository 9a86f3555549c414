//! Staging encoding of documents.
//!
//! Documents are written as `{"value": [ ... ]}` envelopes, the same shape the
//! bulk upload endpoint accepts, so staged files are uploaded without being
//! decoded again.
//!
//! Geography values read from the service in the client-library shape
//! (`Latitude`, `Longitude` plus `IsEmpty`, `Z`, `M` and `CoordinateSystem`
//! metadata) are not accepted back on upload. On export they are rewritten to
//! `{"type": "Point", "coordinates": [lat, long]}`.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::service::Document;

const LATITUDE: &str = "Latitude";
const LONGITUDE: &str = "Longitude";

/// Metadata sub-fields of a geography value, dropped by the rewrite.
const GEO_METADATA: [&str; 4] = ["IsEmpty", "Z", "M", "CoordinateSystem"];

/// Envelope key holding the document list.
pub const ENVELOPE_KEY: &str = "value";

/// Returns the point form of `object` if it is a geography value.
///
/// An object qualifies when it has numeric `Latitude` and `Longitude` and no
/// keys other than the geography metadata. Coordinates keep their original
/// number representation.
fn geo_point(object: &Map<String, Value>) -> Option<Value> {
    let lat = object.get(LATITUDE).filter(|v| v.is_number())?.clone();
    let long = object.get(LONGITUDE).filter(|v| v.is_number())?.clone();
    let only_geo_keys = object
        .keys()
        .all(|k| k == LATITUDE || k == LONGITUDE || GEO_METADATA.contains(&k.as_str()));
    if !only_geo_keys {
        return None;
    }
    Some(json!({ "type": "Point", "coordinates": [lat, long] }))
}

/// Rewrites every geography value inside `value`, at any depth.
fn rewrite_geo(value: &mut Value) {
    match value {
        Value::Object(object) => {
            if let Some(point) = geo_point(object) {
                *value = point;
            } else {
                object.values_mut().for_each(rewrite_geo);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(rewrite_geo),
        _ => {}
    }
}

/// Converts one document to its staged form.
#[must_use]
pub fn export_document(record: &Document) -> Value {
    let mut value = Value::Object(record.clone());
    rewrite_geo(&mut value);
    value
}

/// Serializes one document to its staged JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_for_export(record: &Document) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&export_document(record))?)
}

/// Serializes a batch into a `{"value": [...]}` envelope.
///
/// An empty batch produces `{"value":[]}`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_batch(records: &[Document]) -> Result<Vec<u8>> {
    let values: Vec<Value> = records.iter().map(export_document).collect();
    let mut envelope = Map::with_capacity(1);
    envelope.insert(ENVELOPE_KEY.to_string(), Value::Array(values));
    Ok(serde_json::to_vec(&Value::Object(envelope))?)
}

/// Returns staged bytes ready for upload.
///
/// Staged content is uploaded exactly as written at export time.
#[must_use]
pub fn decode_for_import(bytes: Vec<u8>) -> Vec<u8> {
    bytes
}

/// Counts the documents in a staged envelope without altering it.
///
/// # Errors
///
/// Returns [`Error::ValidationFailed`] if the bytes are not an envelope.
pub fn count_records(bytes: &[u8]) -> Result<usize> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::ValidationFailed(format!("staged file is not valid JSON: {}", e)))?;
    root.get(ENVELOPE_KEY)
        .and_then(Value::as_array)
        .map(Vec::len)
        .ok_or_else(|| {
            Error::ValidationFailed(format!(
                "staged file has no '{}' array",
                ENVELOPE_KEY
            ))
        })
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
