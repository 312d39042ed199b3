//! Shared infrastructure for remote backends (Gemini, OCR service).
//!
//! Provides common helpers for HTTP client setup, image encoding,
//! rate limiting and retry logic.

use std::future::Future;
use std::time::Duration;

use base64::Engine;
use tracing::{debug, warn};

use super::backend::{BackendType, OcrError};
use crate::image_source::LoadedImage;

/// Upper bound on any single wait, whether from `Retry-After` or backoff.
const MAX_WAIT_SECS: u64 = 60;

/// Build the HTTP client a remote backend uses for its calls.
pub fn http_client(backend: BackendType, timeout: Duration) -> Result<reqwest::Client, OcrError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("timingboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| OcrError::OcrFailed(format!("Failed to create HTTP client for {}: {}", backend, e)))
}

/// Encode an image as base64, returning (base64_data, mime_type).
pub fn encode_image_base64(image: &LoadedImage) -> (String, String) {
    let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
    (data, image.mime_type.clone())
}

/// Parse Retry-After header value (seconds).
/// Returns duration to wait, or None if header is missing/invalid.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs.min(MAX_WAIT_SECS)))
}

/// Calculate exponential backoff delay for a given attempt.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay_ms.min(MAX_WAIT_SECS * 1000))
}

/// Apply a fixed rate-limiting delay before an API request.
pub async fn apply_rate_delay(delay_ms: u64, backend: BackendType) {
    if delay_ms > 0 {
        let delay = Duration::from_millis(delay_ms);
        debug!("{}: waiting {:?} before request", backend, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Retry an API request on 429 (rate limited) responses with exponential backoff.
///
/// Returns the first non-429 response. If all retries are exhausted,
/// returns `OcrError::RateLimited`.
pub async fn retry_on_rate_limit<F, Fut>(
    backend: BackendType,
    max_retries: u32,
    make_request: F,
) -> Result<reqwest::Response, OcrError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let response = make_request()
            .await
            .map_err(|e| OcrError::OcrFailed(format!("{} request failed: {}", backend, e)))?;

        if response.status().as_u16() != 429 {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let retry_after_secs = retry_after.as_deref().and_then(|s| s.trim().parse::<u64>().ok());

        if attempt >= max_retries {
            return Err(OcrError::RateLimited {
                backend,
                retry_after_secs,
            });
        }

        let wait = parse_retry_after(retry_after.as_deref())
            .unwrap_or_else(|| backoff_delay(attempt, 1000));

        warn!(
            "{} rate limited (attempt {}), waiting {:?}",
            backend,
            attempt + 1,
            wait
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

/// Read an error body for a failed response, trimmed for logging.
pub async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(300).collect();
    format!("HTTP {}: {}", status, snippet.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("5")), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(Some("600")), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, 1000), Duration::from_millis(4000));
        assert_eq!(backoff_delay(10, 1000), Duration::from_secs(60));
        assert_eq!(backoff_delay(80, 1000), Duration::from_secs(60));
    }

    #[test]
    fn test_encode_image_base64() {
        let image = LoadedImage::from_gray(image::GrayImage::new(2, 2)).unwrap();
        let (data, mime) = encode_image_base64(&image);
        assert_eq!(mime, "image/png");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(data)
            .unwrap();
        assert_eq!(decoded, image.bytes);
    }
}
