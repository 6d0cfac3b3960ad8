use std::borrow::Cow;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::multipart::Part;

use crate::error::PipelineError;
use crate::media::LocalImage;

const MAX_API_ERROR_CHARS: usize = 200;

/// Cookie under which the server tracks anonymous quota.
pub const ANONYMOUS_COOKIE_NAME: &str = "redesign_anonymous_id";

/// Shared HTTP client for the redesign service.
///
/// Connect timeout and pool tuning only — deliberately no total request
/// timeout, because step calls rely on the transport default and the
/// suggestion fetch applies its own per-request deadline.
#[must_use]
pub fn build_service_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Wrap an in-memory image as a multipart file part.
pub fn image_part(image: &LocalImage) -> Result<Part> {
    Part::bytes(image.bytes.clone())
        .file_name(image.name.clone())
        .mime_str(&image.mime_type)
        .context("set image part MIME type")
}

/// `Cookie` header value carrying the anonymous identity.
#[must_use]
pub fn anonymous_cookie(anonymous_id: &str) -> String {
    format!("{ANONYMOUS_COOKIE_NAME}={anonymous_id}")
}

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn scrub_after_marker(scrubbed: &mut String, marker: &str) {
    let mut search_from = 0;
    loop {
        let Some(rel) = scrubbed[search_from..].find(marker) else {
            break;
        };

        let start = search_from + rel;
        let content_start = start + marker.len();
        let end = token_end(scrubbed, content_start);

        // Skip bare markers without a token value.
        if end == content_start {
            search_from = content_start;
            continue;
        }

        scrubbed.replace_range(start..end, "[REDACTED]");
        search_from = start + "[REDACTED]".len();
    }
}

/// Scrub bearer-token-like values from service error strings so credentials
/// never reach logs or user-visible messages.
#[must_use]
pub fn scrub_secret_patterns(input: &str) -> Cow<'_, str> {
    const MARKER_PATTERNS: [&str; 6] = [
        "Authorization: Bearer ",
        "authorization: bearer ",
        "\"authorization\":\"Bearer ",
        "access_token=",
        "\"access_token\":\"",
        "\"token\":\"",
    ];

    if !MARKER_PATTERNS.iter().any(|m| input.contains(m)) {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in MARKER_PATTERNS {
        scrub_after_marker(&mut scrubbed, marker);
    }
    Cow::Owned(scrubbed)
}

/// Sanitize API error text by scrubbing secrets and truncating length.
#[must_use]
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let scrubbed = scrubbed.as_ref();
    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Pull the server's `error` field out of a response body, falling back to
/// the HTTP status line.
#[must_use]
pub fn error_message_from_body(body: &str, status: u16) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str().map(str::to_string)));
    from_json.unwrap_or_else(|| format!("Server error: {status}"))
}

/// Map a non-2xx, non-401 service response to the failure taxonomy.
pub async fn service_error(response: reqwest::Response) -> PipelineError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    PipelineError::Service {
        status,
        message: sanitize_api_error(&error_message_from_body(&body, status)),
    }
}
