use anyhow::Result;
use reqwest::Response;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Re-sends a request on transport errors and 5xx responses
///
/// # Parameters
/// - `send`: Closure building and sending the request
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// The first response that is not a server error, or the last outcome once
/// attempts run out. Client errors are returned as-is so their body can be
/// read.
pub async fn with_retry<F, Fut>(mut send: F, retries: usize, delay_ms: u64) -> Result<Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        let outcome = send().await;
        let failure = match &outcome {
            Ok(response) if response.status().is_server_error() => {
                Some(response.status().to_string())
            }
            Ok(_) => None,
            Err(err) => Some(err.to_string()),
        };

        match failure {
            Some(reason) if attempt <= retries => {
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, reason
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            _ => return outcome.map_err(anyhow::Error::from),
        }
    }
}
