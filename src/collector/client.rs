//! Exposition endpoint HTTP client
//!
//! Connection pooling과 타임아웃을 지원하는 비동기 HTTP 클라이언트입니다.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{decode_response, CollectResult, MetricFamily};
use crate::error::CollectorError;

/// Prefer delimited protobuf, fall back to text 0.0.4
pub const ACCEPT_HEADER: &str = "application/vnd.google.protobuf;proto=io.prometheus.client.MetricFamily;encoding=delimited;q=0.7,text/plain;version=0.0.4;q=0.3";

/// Scrape client for a single exposition endpoint
#[derive(Clone)]
pub struct ScrapeClient {
    client: Client,
    url: String,
    timeout_ms: u64,
    bearer_token: Option<String>,
}

/// 재시도 설정
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수
    pub max_retries: u32,
    /// 초기 지연 시간
    pub initial_delay: Duration,
    /// 최대 지연 시간
    pub max_delay: Duration,
    /// 지연 시간 증가 배수
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after a failed attempt, given the previous delay
    pub fn next_delay(&self, current: Duration) -> Duration {
        std::cmp::min(
            Duration::from_secs_f64(current.as_secs_f64() * self.multiplier),
            self.max_delay,
        )
    }
}

impl ScrapeClient {
    /// 새 클라이언트 생성
    ///
    /// # Arguments
    /// * `url` - exposition endpoint (예: "http://kube-state-metrics:8080/metrics")
    /// * `timeout_ms` - 요청 타임아웃 (밀리초)
    pub fn new(url: &str, timeout_ms: u64) -> CollectResult<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(CollectorError::HttpClientInit)?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout_ms,
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every scrape
    pub fn with_bearer_token(mut self, token: &str) -> Self {
        self.bearer_token = Some(token.to_string());
        self
    }

    /// Endpoint this client scrapes
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode one snapshot
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn scrape(&self) -> CollectResult<Vec<MetricFamily>> {
        let mut req = self.client.get(&self.url).header(ACCEPT, ACCEPT_HEADER);

        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                CollectorError::timeout_with_duration(self.timeout_ms)
            } else {
                CollectorError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(CollectorError::HttpResponse)?;

        debug!(
            content_type = %content_type,
            bytes = body.len(),
            "Received exposition response"
        );

        decode_response(&content_type, &body)
    }

    /// 재시도 로직이 포함된 스크레이프
    pub async fn scrape_with_retry(&self, config: &RetryConfig) -> CollectResult<Vec<MetricFamily>> {
        let mut delay = config.initial_delay;
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.scrape().await {
                Ok(families) => return Ok(families),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }

                    last_error = Some(e);

                    if attempt < config.max_retries {
                        warn!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Scrape failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        delay = config.next_delay(delay);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(CollectorError::MaxRetriesExceeded))
    }
}
