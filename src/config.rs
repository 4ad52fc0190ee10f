//! Configuration blob parsing
//!
//! Pipeline steps hand configuration around as JSON strings. This module
//! decodes them with a size guard and error reporting that points at the
//! failing position, so a truncated or mangled pipeline variable is
//! diagnosable from the step log alone.

use crate::error::PrepError;
use serde_json::Value;

/// Upper bound on a single configuration blob (1MB).
pub const MAX_CONFIG_BYTES: usize = 1024 * 1024;

/// Decode a JSON configuration string.
///
/// An empty or whitespace-only blob is not malformed; it decodes to an
/// empty object. Shape validation (e.g. presence of an `entries` array)
/// is the caller's job.
pub fn parse_config(raw: &str, label: &str) -> Result<Value, PrepError> {
    if raw.trim().is_empty() {
        tracing::warn!("{} is empty, using an empty object", label);
        return Ok(Value::Object(serde_json::Map::new()));
    }

    if raw.len() > MAX_CONFIG_BYTES {
        return Err(PrepError::SizeLimitExceeded {
            label: label.to_string(),
        });
    }

    tracing::debug!("Parsing {} ({} chars)", label, raw.len());

    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            match &value {
                Value::Object(map) => {
                    tracing::debug!("Parsed {} as object with {} keys", label, map.len())
                }
                Value::Array(items) => {
                    tracing::debug!("Parsed {} as array with {} items", label, items.len())
                }
                _ => {}
            }
            Ok(value)
        }
        Err(err) => {
            log_parse_failure(raw, label, &err);
            Err(PrepError::MalformedConfig {
                label: label.to_string(),
                source: err,
            })
        }
    }
}

/// Log the failing line with a caret pointer under the reported column.
fn log_parse_failure(raw: &str, label: &str, err: &serde_json::Error) {
    tracing::error!(
        "Failed to parse {} (line {}, column {}): {}",
        label,
        err.line(),
        err.column(),
        err
    );

    if let Some(line) = raw.lines().nth(err.line().saturating_sub(1)) {
        tracing::debug!("Problem line: {}", line);
        if err.column() > 0 {
            tracing::debug!("Position: {}^", " ".repeat(err.column() - 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_empty_object() {
        let value = parse_config("", "test config").unwrap();
        assert_eq!(value, Value::Object(serde_json::Map::new()));

        let value = parse_config("   \n\t ", "test config").unwrap();
        assert_eq!(value, Value::Object(serde_json::Map::new()));
    }

    #[test]
    fn test_valid_json_passes_through() {
        let value = parse_config(r#"{"entries":[{"a":1}]}"#, "test config").unwrap();
        assert_eq!(value["entries"][0]["a"], 1);

        let value = parse_config(r#"[1,2,3]"#, "test config").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_size_limit_rejected_before_decode() {
        // Oversized and syntactically invalid: the size check must fire first.
        let huge = "x".repeat(MAX_CONFIG_BYTES + 1);
        let err = parse_config(&huge, "big config").unwrap_err();
        assert!(matches!(err, PrepError::SizeLimitExceeded { .. }));
    }

    #[test]
    fn test_malformed_json_carries_label() {
        let err = parse_config("{not json", "item map").unwrap_err();
        match err {
            PrepError::MalformedConfig { label, .. } => assert_eq!(label, "item map"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reserialize_is_byte_identical() {
        // Key order survives a decode/encode round trip.
        let input = r#"{"resource_name":"net1","extra":"x","nested":{"b":2,"a":1}}"#;
        let value = parse_config(input, "round trip").unwrap();
        assert_eq!(value.to_string(), input);
    }
}
