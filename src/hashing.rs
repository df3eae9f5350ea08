//! Submission Fingerprints - SHA-256 over Canonical JSON
//!
//! The provider has no idempotency key, so identical submissions create
//! independent jobs. Fingerprints let callers notice a repeat without the
//! client ever deduplicating.

use serde::Serialize;
use serde_json::{json, to_string, Value};
use sha2::{Digest, Sha256};

use crate::modifications::{for_submission, Modification};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// fingerprint = sha256(canonical {template, modifications-as-submitted})
///
/// Modification order is significant; unset entries are not.
pub fn submission_fingerprint(template_id: &str, modifications: &[Modification]) -> String {
    let payload = json!({
        "template": template_id,
        "modifications": for_submission(modifications),
    });
    sha256_hex(sort_value(&payload).to_string().as_bytes())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
