use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use anyhow::{Result, bail};

/// Fetches dataset documents over HTTP, e.g. from the catalog's JSON API.
pub struct HttpFetcher {
    client: Client,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Download the full body at `url`.
    ///
    /// Timeouts and connection failures are retried with a growing delay;
    /// any other failure, including a non-success status, is returned as is.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut retry_count = 0;

        loop {
            let result = self
                .client
                .get(url)
                .header("Accept", "application/json")
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        bail!("HTTP request to {} failed with status: {}", url, resp.status());
                    }
                    let bytes = resp.bytes().await?;
                    self.transferred_bytes
                        .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                    debug!(url, bytes = bytes.len(), "fetched dataset");
                    return Ok(bytes.to_vec());
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded for {}: {}", url, e);
                    }
                    warn!(url, retry = retry_count, max = self.max_retry, error = %e, "connection error, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
