//! Deterministic fingerprinting of a provider request.
//!
//! The fingerprint is the cache key the `ProviderRecorder` (see
//! `skein-recorder`) uses to decide whether a provider call can be
//! replayed from a prior recording instead of hitting the network.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// The request shape that gets fingerprinted. Mirrors the fields an
/// `Agent Executor` has in hand before calling the provider (see
/// `skein-core::provider::CompletionRequest`), but is kept separate so
/// the hash has no dependency on the provider trait itself — only on
/// JSON-serializable pieces of it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FingerprintInput {
    /// The provider's canonical model identifier. Part of the hash so
    /// two agents with identical prompts/options but different models
    /// never share a cache entry.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// The assembled prompt (messages, system prompt — whatever shape
    /// the caller's provider expects, as a JSON value).
    pub prompt: Value,
    /// Provider-specific options (model, temperature, etc.).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_options: Option<Value>,
    /// Tool definitions available to this call, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    /// Structural definition of the expected output schema. Only the
    /// shape participates — free-form docstrings/titles are dropped by
    /// the caller before this point if they want naming-insensitivity;
    /// this function hashes whatever JSON it is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

/// Recursively sort object keys and drop empty arrays/objects and
/// nulls, producing a canonical form two structurally-equal-but
/// differently-ordered values collapse to.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let canon = canonicalize(&map[key]);
                if is_empty_or_null(&canon) {
                    continue;
                }
                sorted.insert(key.clone(), canon);
            }
            Value::Object(sorted)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

fn is_empty_or_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Errors hashing a provider request.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The input could not be serialized to JSON.
    #[error("fingerprint input not serializable: {0}")]
    NotSerializable(String),
}

/// Compute the content-addressed fingerprint of a provider request.
///
/// Returns a string of the form `sha256:<64 lowercase hex chars>`.
/// Deterministic: equal `FingerprintInput`s (up to key ordering inside
/// nested objects) always hash identically, per the testable property
/// in the specification's invariants section.
pub fn hash_provider_request(input: &FingerprintInput) -> Result<String, HashError> {
    let raw = serde_json::to_value(input)
        .map_err(|e| HashError::NotSerializable(e.to_string()))?;
    let canonical = canonicalize(&raw);
    let bytes = serde_json::to_vec(&canonical)
        .map_err(|e| HashError::NotSerializable(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(format!("sha256:{hex}"))
}
