//! Reachability probe run before any check

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::error::{E2eError, E2eResult};

const PROBE_INTERVAL: Duration = Duration::from_millis(100);
const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Parse a base URL, rejecting anything that is not absolute http(s)
pub fn parse_base_url(raw: &str) -> E2eResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| E2eError::Configuration(format!("malformed base URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        scheme => Err(E2eError::Configuration(format!(
            "base URL '{}' must be http(s) with a host, got scheme '{}'",
            raw, scheme
        ))),
    }
}

/// Poll `url` until any HTTP response arrives or `timeout_duration` elapses
pub async fn probe_target(url: &Url, timeout_duration: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(PROBE_REQUEST_TIMEOUT)
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url.clone()).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    warn!("Target probe returned {}", resp.status());
                }
                info!("Target {} reachable", url);
                return Ok(());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                // Connection refused is expected while the site comes up
                if !e.is_connect() {
                    warn!("Target probe error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout_duration {
            break;
        }
        sleep(PROBE_INTERVAL).await;
    }

    Err(E2eError::TargetUnreachable {
        url: url.to_string(),
        attempts,
    })
}
