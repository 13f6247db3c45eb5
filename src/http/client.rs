use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

use super::retry::{MAX_RETRIES, RETRY_DELAY_MS, check_retryable, is_retryable};

/// reqwest client that retries transient failures.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// Override the pause between attempts.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// GET `url` and decode the JSON body.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.with_retry("GET", url, || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("Failed to send request")?
                .error_for_status()
                .map_err(check_retryable)?;

            response
                .json::<T>()
                .await
                .context("Failed to parse JSON response")
        })
        .await
    }

    /// Stream the body of `url` into a writer and return the byte count.
    ///
    /// `create_writer` is called once per attempt so that a retried download
    /// starts from an empty file.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download<W, F>(&self, url: &str, create_writer: F) -> Result<u64>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        self.with_retry("download", url, || async {
            let mut response = self
                .client
                .get(url)
                .send()
                .await
                .context("Failed to start download")?
                .error_for_status()
                .map_err(check_retryable)?;

            let mut writer = create_writer()?;
            let mut bytes: u64 = 0;
            while let Some(chunk) = response
                .chunk()
                .await
                .context("Failed to read download stream")?
            {
                writer
                    .write_all(&chunk)
                    .context("Failed to write downloaded data")?;
                bytes += chunk.len() as u64;
            }
            writer.flush().context("Failed to flush downloaded data")?;

            debug!("Downloaded {} bytes from {}", bytes, url);
            Ok(bytes)
        })
        .await
    }

    async fn with_retry<F, Fut, T>(&self, method: &str, url: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !is_retryable(&e) || attempt >= MAX_RETRIES => {
                    return Err(e.context(format!("{} {} failed", method, url)));
                }
                Err(e) => {
                    warn!(
                        "{} {}: attempt {}/{} failed ({:#}), retrying in {:?}",
                        method, url, attempt, MAX_RETRIES, e, self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
