use anyhow::{Result, anyhow};
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let code = status.as_u16();
    if code == 529 || code == 503 {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("quota")
        || lower.contains("overloaded")
        // baidu reports qps overruns with a 200 and error_code 54003
        || lower.contains("\"54003\"")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

pub(crate) async fn wait_with_backoff(
    provider: &str,
    attempt: usize,
    delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    let mut wait = delay;
    if let Some(retry_after) = retry_after
        && retry_after > wait
    {
        wait = retry_after;
    }
    warn!(
        "{} rate limited; retrying in {:.1}s (attempt {}/{})",
        provider,
        wait.as_secs_f32(),
        attempt,
        RATE_LIMIT_MAX_RETRIES
    );
    sleep(wait).await;
    next_delay(delay)
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    let next_secs = current
        .as_secs()
        .saturating_mul(2)
        .max(RATE_LIMIT_BASE_DELAY.as_secs());
    Duration::from_secs(next_secs).min(RATE_LIMIT_MAX_DELAY)
}

/// Send the request built by `request` until it succeeds, backing off while
/// the service reports rate limiting. Returns the successful body.
pub(crate) async fn send_with_retry(
    provider: &str,
    request: impl Fn() -> RequestBuilder,
) -> Result<String> {
    let mut attempt = 0usize;
    let mut delay = RATE_LIMIT_BASE_DELAY;
    loop {
        attempt += 1;
        let response = request().send().await?;
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
            delay = wait_with_backoff(provider, attempt, delay, retry_after).await;
            continue;
        }
        if status.is_success() {
            return Ok(text);
        }
        return Err(anyhow!("{} error ({}): {}", provider, status, text.trim()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_up_to_the_cap() {
        assert_eq!(next_delay(Duration::from_secs(2)), Duration::from_secs(4));
        assert_eq!(next_delay(Duration::ZERO), RATE_LIMIT_BASE_DELAY);
        assert_eq!(next_delay(Duration::from_secs(45)), RATE_LIMIT_MAX_DELAY);
    }

    #[test]
    fn rate_limits_are_recognized_by_status_and_body() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::SERVICE_UNAVAILABLE, ""));
        assert!(is_rate_limited(
            StatusCode::OK,
            r#"{"error_code":"54003","error_msg":"Invalid Access Limit"}"#
        ));
        assert!(!is_rate_limited(StatusCode::OK, r#"{"trans_result":[]}"#));
        assert!(!is_rate_limited(StatusCode::BAD_REQUEST, "bad image"));
    }

    #[test]
    fn retry_after_reads_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert("retry-after", "soon".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }
}
