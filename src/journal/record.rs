//! Opaque record payloads and the metadata attached to them on disk.

use crate::constants::metadata;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// An extracted record: an arbitrary JSON object this crate never interprets beyond
/// the unit and hash fields used for deduplication.
pub type LogRecord = Map<String, Value>;

/// Copy of `record` carrying `_writtenAt` and `_executionId`
pub fn with_write_metadata(
    record: LogRecord,
    execution_id: &str,
    written_at: DateTime<Utc>,
) -> LogRecord {
    let mut stamped = record;
    stamped.insert(
        metadata::WRITTEN_AT.to_string(),
        Value::String(written_at.to_rfc3339()),
    );
    stamped.insert(
        metadata::EXECUTION_ID.to_string(),
        Value::String(execution_id.to_string()),
    );
    stamped
}

/// Remove the write metadata added by [`with_write_metadata`]
pub fn strip_write_metadata(record: &mut LogRecord) {
    for key in metadata::ALL {
        record.remove(key);
    }
}

/// Identity used to drop duplicate records recovered from several logs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub unit: String,
    pub content_hash: String,
}

impl DedupKey {
    /// Key for `record`, preferring a hash the extractor already stored in
    /// `hash_field` over one computed from the record content.
    pub fn for_record(record: &LogRecord, unit_field: &str, hash_field: &str) -> Self {
        let unit = match record.get(unit_field) {
            Some(Value::String(unit)) => unit.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let content_hash = match record.get(hash_field) {
            Some(Value::String(hash)) if !hash.is_empty() => hash.clone(),
            _ => content_hash(record),
        };
        Self { unit, content_hash }
    }
}

/// SHA-256 over the canonical JSON form of `record` (object keys sorted)
pub fn content_hash(record: &LogRecord) -> String {
    let mut canonical = String::new();
    write_canonical_object(record, &mut canonical);
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

fn write_canonical_object(map: &Map<String, Value>, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(&map[key], out);
    }
    out.push('}');
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
