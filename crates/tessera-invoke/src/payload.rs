//! Payload adaptation between callers and agent wire conventions.
//!
//! Direct agents receive the payload unchanged. Legacy-webhook agents receive
//! an envelope `{body, headers, query}` on top of their declared static
//! fields; the three envelope keys always win over a static field of the same
//! name.
//!
//! Bodies are serialized canonically (RFC 8785: sorted keys, no whitespace)
//! so that the bytes sent are exactly the bytes signed.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use tessera_contracts::{
    agent::PayloadConvention,
    error::{TesseraError, TesseraResult},
};

/// Deterministic byte encoding of `value`.
pub fn canonical_bytes(value: &Value) -> TesseraResult<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|e| TesseraError::Payload {
        reason: format!("payload cannot be canonicalized: {e}"),
    })
}

/// Reshape `payload` for the agent's convention.
///
/// `headers` are the transport headers of the call; legacy-webhook endpoints
/// expect to find them inside the envelope.
pub fn adapt_payload(
    convention: &PayloadConvention,
    payload: &Value,
    headers: &BTreeMap<String, String>,
) -> Value {
    match convention {
        PayloadConvention::Direct => payload.clone(),
        PayloadConvention::LegacyWebhook { static_fields } => {
            let mut envelope = static_fields.clone();
            let header_map: Map<String, Value> = headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            envelope.insert("body".to_string(), payload.clone());
            envelope.insert("headers".to_string(), Value::Object(header_map));
            envelope.insert("query".to_string(), Value::Object(Map::new()));
            Value::Object(envelope)
        }
    }
}

/// Decode a successful response body.
///
/// Empty bodies decode to `null`; bodies that are not JSON are kept as a
/// JSON string so the caller still sees what the agent said.
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Strip a top-level `data` envelope for direct agents.
///
/// Legacy-webhook responses are returned untouched.
pub fn unwrap_response(convention: &PayloadConvention, body: Value) -> Value {
    if convention.is_legacy_webhook() {
        return body;
    }
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
