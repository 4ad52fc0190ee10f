//! Tag lookup with bounded retries
//!
//! Fetches `[0].properties.tags` for an asset identifier. Network-level
//! failures and server errors are retried with exponential backoff;
//! client errors and shape mismatches short-circuit to "no tags".

use super::http::{sanitize_for_log, InventoryHttpClient};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Default number of fetch attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Tags resolved for one asset identifier, values normalized to strings.
pub type TagSet = BTreeMap<String, String>;

/// Outcome of a single fetch attempt.
enum FetchOutcome {
    /// Usable 200 response, possibly with zero tags.
    Tags(TagSet),
    /// Terminal "no tags available" answer; do not retry.
    NoTags,
    /// Transient failure worth another attempt.
    Retryable(String),
}

/// Client for the inventory tag API
pub struct InventoryClient {
    http: InventoryHttpClient,
    api_url: String,
    max_attempts: u32,
}

impl InventoryClient {
    /// Create a client for the given API endpoint
    pub fn new(api_url: &str, max_attempts: u32) -> Result<Self> {
        Url::parse(api_url).with_context(|| format!("Invalid inventory API URL: {api_url}"))?;

        Ok(Self {
            http: InventoryHttpClient::new()?,
            api_url: api_url.to_string(),
            max_attempts: max_attempts.max(1),
        })
    }

    /// Fetch tags for an asset identifier
    ///
    /// Never fails: after `max_attempts` tries (backing off 1s, 2s, 4s, …
    /// between them) the result degrades to an empty set. A blank asset id
    /// skips the network entirely.
    pub async fn fetch_tags(&self, asset_id: &str) -> TagSet {
        let asset_id = asset_id.trim();
        if asset_id.is_empty() {
            tracing::warn!("Asset ID is empty, skipping tag lookup");
            return TagSet::new();
        }

        tracing::info!("Fetching tags for asset_id: {}", asset_id);

        for attempt in 0..self.max_attempts {
            match self.try_fetch(asset_id).await {
                FetchOutcome::Tags(tags) => {
                    tracing::info!("Retrieved {} tags", tags.len());
                    return tags;
                }
                FetchOutcome::NoTags => return TagSet::new(),
                FetchOutcome::Retryable(reason) => {
                    tracing::error!(
                        "Tag fetch failed (attempt {}/{}): {}",
                        attempt + 1,
                        self.max_attempts,
                        reason
                    );
                }
            }

            if attempt + 1 < self.max_attempts {
                let wait = Duration::from_secs(1u64 << attempt);
                tracing::info!("Retrying in {} seconds...", wait.as_secs());
                tokio::time::sleep(wait).await;
            }
        }

        tracing::warn!(
            "Failed to fetch tags after {} attempts, continuing without tags",
            self.max_attempts
        );
        TagSet::new()
    }

    async fn try_fetch(&self, asset_id: &str) -> FetchOutcome {
        let (status, body) = match self.http.get(&self.api_url, &[("asset_id", asset_id)]).await {
            Ok(pair) => pair,
            Err(err) => return FetchOutcome::Retryable(format!("{err:#}")),
        };

        if status == StatusCode::OK {
            return match serde_json::from_str::<Value>(&body) {
                Ok(data) => FetchOutcome::Tags(extract_tags(&data)),
                Err(err) => FetchOutcome::Retryable(format!("malformed response body: {err}")),
            };
        }

        if status.is_client_error() {
            tracing::warn!("Inventory API returned {}, not retrying", status);
            tracing::debug!("Error response: {}", sanitize_for_log(&body));
            return FetchOutcome::NoTags;
        }

        if status.is_server_error() {
            tracing::debug!("Error response: {}", sanitize_for_log(&body));
            return FetchOutcome::Retryable(format!("server returned {status}"));
        }

        tracing::warn!("Inventory API returned unexpected status {}", status);
        FetchOutcome::NoTags
    }
}

/// Pull `[0].properties.tags` out of the response body.
///
/// Any shape deviation (empty array, non-object `properties` or `tags`)
/// yields an empty set rather than an error.
fn extract_tags(data: &Value) -> TagSet {
    let Some(first) = data.as_array().and_then(|items| items.first()) else {
        tracing::warn!("No data returned for asset");
        return TagSet::new();
    };

    let Some(properties) = first.get("properties").and_then(Value::as_object) else {
        tracing::warn!("Properties is not an object, skipping tags");
        return TagSet::new();
    };

    let Some(tags) = properties.get("tags").and_then(Value::as_object) else {
        tracing::warn!("Tags is not an object, returning empty");
        return TagSet::new();
    };

    let mut set = TagSet::new();
    for (key, value) in tags {
        if key.trim().is_empty() {
            tracing::debug!("Skipping blank tag key");
            continue;
        }
        set.insert(key.clone(), coerce_tag_value(value));
    }
    set
}

/// Tag values arrive as arbitrary JSON; published variables are strings
/// only, so the conversion happens once here and is logged.
fn coerce_tag_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => {
            let coerced = other.to_string();
            tracing::debug!("Coerced tag value {} to string", coerced);
            coerced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_tags_from_well_formed_response() {
        let data = json!([{"properties": {"tags": {"env": "prod", "team": "infra"}}}]);
        let tags = extract_tags(&data);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["team"], "infra");
    }

    #[test]
    fn test_extract_tags_tolerates_bad_shapes() {
        assert!(extract_tags(&json!([])).is_empty());
        assert!(extract_tags(&json!({"not": "an array"})).is_empty());
        assert!(extract_tags(&json!([{"properties": "nope"}])).is_empty());
        assert!(extract_tags(&json!([{"properties": {"tags": [1, 2]}}])).is_empty());
    }

    #[test]
    fn test_tag_values_coerced_to_strings() {
        let data = json!([{"properties": {"tags": {
            "count": 42,
            "enabled": true,
            "missing": null,
            "name": "plain",
            "  ": "dropped"
        }}}]);
        let tags = extract_tags(&data);
        assert_eq!(tags["count"], "42");
        assert_eq!(tags["enabled"], "true");
        assert_eq!(tags["missing"], "");
        assert_eq!(tags["name"], "plain");
        assert!(!tags.contains_key("  "));
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        assert!(InventoryClient::new("not a url", 3).is_err());
        assert!(InventoryClient::new("https://inventory.example.com/api", 3).is_ok());
    }
}
