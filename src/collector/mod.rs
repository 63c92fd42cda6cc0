//! kube-state-metrics 스크레이프 모듈
//!
//! Fetches a snapshot from a Prometheus exposition endpoint and decodes it
//! into [`MetricFamily`] values, using the delimited protobuf format when the
//! server offers it and the text format otherwise.
//!
//! # Example
//!
//! ```ignore
//! use prom2hny::collector::ScrapeClient;
//!
//! let client = ScrapeClient::new("http://kube-state-metrics:8080/metrics", 5000)?;
//! let families = client.scrape().await?;
//! ```

mod client;
pub mod protobuf;
pub mod text;

use std::collections::HashMap;

pub use client::{RetryConfig, ScrapeClient, ACCEPT_HEADER};

use crate::error::CollectorError;

/// Collector 작업 결과 타입
pub type CollectResult<T> = Result<T, CollectorError>;

/// Kind of a metric family, as declared by the exposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricKind {
    Counter,
    Gauge,
    Summary,
    #[default]
    Untyped,
    Histogram,
    GaugeHistogram,
}

impl MetricKind {
    /// Parse the type token of a `# TYPE` line
    pub fn from_type_token(token: &str) -> Option<Self> {
        match token {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            "summary" => Some(MetricKind::Summary),
            "untyped" => Some(MetricKind::Untyped),
            "histogram" => Some(MetricKind::Histogram),
            "gaugehistogram" => Some(MetricKind::GaugeHistogram),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
            MetricKind::Untyped => "untyped",
            MetricKind::Histogram => "histogram",
            MetricKind::GaugeHistogram => "gaugehistogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named collection of samples sharing help text and kind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricFamily {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    /// Create an empty family
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
            help: String::new(),
            samples: Vec::new(),
        }
    }

    /// Append a sample
    pub fn with_sample(mut self, sample: Sample) -> Self {
        self.samples.push(sample);
        self
    }
}

/// One sample of a family: a value plus its label set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sample {
    pub value: f64,
    pub labels: HashMap<String, String>,
}

impl Sample {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            labels: HashMap::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Wire format of a scrape response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpositionFormat {
    /// `application/vnd.google.protobuf; proto=io.prometheus.client.MetricFamily; encoding=delimited`
    DelimitedProtobuf,
    /// Text format version 0.0.4
    Text,
}

impl ExpositionFormat {
    /// Select the decoder for a response `Content-Type`.
    ///
    /// Anything that is not exactly the delimited MetricFamily protobuf
    /// falls back to the text format, including a missing header.
    pub fn from_content_type(content_type: &str) -> Self {
        let mut parts = content_type.split(';');
        let media_type = parts.next().unwrap_or("").trim().to_ascii_lowercase();

        let mut proto = None;
        let mut encoding = None;
        for param in parts {
            if let Some((key, value)) = param.split_once('=') {
                let value = value.trim().trim_matches('"');
                match key.trim().to_ascii_lowercase().as_str() {
                    "proto" => proto = Some(value.to_string()),
                    "encoding" => encoding = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        if media_type == "application/vnd.google.protobuf"
            && proto.as_deref() == Some("io.prometheus.client.MetricFamily")
            && encoding.as_deref() == Some("delimited")
        {
            ExpositionFormat::DelimitedProtobuf
        } else {
            ExpositionFormat::Text
        }
    }
}

/// Decode a scrape response body according to its content type
pub fn decode_response(content_type: &str, body: &[u8]) -> CollectResult<Vec<MetricFamily>> {
    match ExpositionFormat::from_content_type(content_type) {
        ExpositionFormat::DelimitedProtobuf => protobuf::decode_delimited(body),
        ExpositionFormat::Text => {
            let text = String::from_utf8_lossy(body);
            text::parse_text(&text)
        }
    }
}
