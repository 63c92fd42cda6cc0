//! Honeycomb batch events API sender
//!
//! Events are posted in batches to `{api_host}/1/batch/{dataset}` as
//! `[{"data": {...}}, ...]`. The response carries one status per event;
//! anything other than 202 is logged and counted as failed.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::{SendReport, Sender};
use crate::collector::RetryConfig;
use crate::config::HoneycombConfig;
use crate::error::SendError;
use crate::transformer::Event;

const TEAM_HEADER: &str = "X-Honeycomb-Team";
const ACCEPTED_STATUS: u16 = 202;

/// Honeycomb batch sender
#[derive(Clone)]
pub struct HoneycombSender {
    client: Client,
    endpoint: Url,
    writekey: String,
    max_batch_size: usize,
    retry: RetryConfig,
}

#[derive(Serialize)]
struct BatchEvent<'a> {
    data: &'a Event,
}

#[derive(Debug, Deserialize)]
struct BatchResponseItem {
    status: u16,
    #[serde(default)]
    error: Option<String>,
}

impl HoneycombSender {
    /// Build a sender from the `honeycomb` config section
    pub fn new(config: &HoneycombConfig, writekey: &str) -> Result<Self, SendError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("prom2hny/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SendError::HttpClientInit)?;

        Ok(Self {
            client,
            endpoint: batch_endpoint(&config.api_host, &config.dataset)?,
            writekey: writekey.to_string(),
            max_batch_size: config.max_batch_size.max(1),
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Batch endpoint events are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_batch(&self, batch: &[Event]) -> Result<SendReport, SendError> {
        let body: Vec<BatchEvent<'_>> = batch.iter().map(|data| BatchEvent { data }).collect();

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(TEAM_HEADER, &self.writekey)
            .json(&body)
            .send()
            .await
            .map_err(SendError::HttpRequest)?;

        let status = response.status();
        let text = response.text().await.map_err(SendError::HttpRequest)?;
        if !status.is_success() {
            return Err(SendError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let items: Vec<BatchResponseItem> =
            serde_json::from_str(&text).map_err(|e| SendError::ResponseParse(e.to_string()))?;

        let mut report = SendReport::default();
        for (index, item) in items.iter().take(batch.len()).enumerate() {
            if item.status == ACCEPTED_STATUS {
                report.sent += 1;
            } else {
                report.failed += 1;
                error!(
                    index,
                    status = item.status,
                    error = item.error.as_deref().unwrap_or(""),
                    "Error sending event"
                );
            }
        }

        // Events the response did not account for
        if items.len() < batch.len() {
            report.failed += batch.len() - items.len();
        }

        Ok(report)
    }

    async fn post_batch_with_retry(&self, batch: &[Event]) -> Result<SendReport, SendError> {
        let mut delay = self.retry.initial_delay;
        let mut last_error = None;

        for attempt in 0..=self.retry.max_retries {
            match self.post_batch(batch).await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }

                    last_error = Some(e);

                    if attempt < self.retry.max_retries {
                        warn!(
                            attempt = attempt + 1,
                            max = self.retry.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Batch send failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        delay = self.retry.next_delay(delay);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(SendError::MaxRetriesExceeded))
    }
}

#[async_trait]
impl Sender for HoneycombSender {
    #[instrument(skip(self, events), fields(events = events.len(), endpoint = %self.endpoint))]
    async fn send(&self, events: &[Event]) -> Result<SendReport, SendError> {
        let mut report = SendReport::default();
        let mut last_error = None;
        let mut failed_batches = 0;
        let batches = events.chunks(self.max_batch_size);
        let batch_count = batches.len();

        for batch in batches {
            match self.post_batch_with_retry(batch).await {
                Ok(batch_report) => report.merge(batch_report),
                Err(e) => {
                    error!(error = %e, events = batch.len(), "Failed to send batch");
                    report.failed += batch.len();
                    failed_batches += 1;
                    last_error = Some(e);
                }
            }
        }

        debug!(sent = report.sent, failed = report.failed, "Batches delivered");

        match last_error {
            Some(e) if failed_batches == batch_count => Err(e),
            _ => Ok(report),
        }
    }
}

/// `{api_host}/1/batch/{dataset}`, with the dataset percent-encoded
fn batch_endpoint(api_host: &str, dataset: &str) -> Result<Url, SendError> {
    let invalid = |reason: String| SendError::InvalidEndpoint {
        host: api_host.to_string(),
        reason,
    };

    let mut url = Url::parse(api_host).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["1", "batch", dataset]);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_endpoint() {
        let url = batch_endpoint("https://api.honeycomb.io", "kubernetes").unwrap();
        assert_eq!(url.as_str(), "https://api.honeycomb.io/1/batch/kubernetes");

        let url = batch_endpoint("https://api.honeycomb.io/", "k8s metrics").unwrap();
        assert_eq!(url.as_str(), "https://api.honeycomb.io/1/batch/k8s%20metrics");
    }

    #[test]
    fn test_batch_endpoint_invalid_host() {
        assert!(matches!(
            batch_endpoint("not a url", "kubernetes"),
            Err(SendError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_batch_body_shape() {
        let mut event = Event::new();
        event.add_field("metric_group", "node");
        let body = vec![BatchEvent { data: &event }];
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"[{"data":{"metric_group":"node"}}]"#
        );
    }

    #[test]
    fn test_sender_clamps_batch_size() {
        let config = HoneycombConfig {
            max_batch_size: 0,
            ..HoneycombConfig::default()
        };
        let sender = HoneycombSender::new(&config, "key").unwrap();
        assert_eq!(sender.max_batch_size, 1);
    }
}
