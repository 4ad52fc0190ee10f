//! HTTP utilities for inventory API calls

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Per-attempt request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of response body to log (to avoid flooding step logs)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX_LOG_BODY_LENGTH)
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for inventory API calls
#[derive(Clone)]
pub struct InventoryHttpClient {
    client: Client,
}

impl InventoryHttpClient {
    /// Create a new HTTP client with the fixed per-attempt timeout
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("wsprep/{}", crate::VERSION))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request, returning the status and raw body
    ///
    /// Non-success statuses are not errors here; the caller decides what
    /// each status class means for the retry loop.
    pub async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<(StatusCode, String)> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        tracing::debug!("Response {} ({} bytes)", status, body.len());

        Ok((status, body))
    }
}
