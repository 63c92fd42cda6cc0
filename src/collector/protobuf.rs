//! Delimited protobuf exposition decoding
//!
//! The body is a sequence of varint length-prefixed
//! `io.prometheus.client.MetricFamily` messages. Only the fields the
//! grouping pass reads are declared; prost skips the rest.

use bytes::{Bytes, BytesMut};
use prost::Message;

use super::{CollectResult, MetricFamily, MetricKind, Sample};

/// Message types mirroring `io.prometheus.client` (metrics.proto)
pub mod wire {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LabelPair {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub value: Option<String>,
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct Gauge {
        #[prost(double, optional, tag = "1")]
        pub value: Option<f64>,
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct Counter {
        #[prost(double, optional, tag = "1")]
        pub value: Option<f64>,
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct Untyped {
        #[prost(double, optional, tag = "1")]
        pub value: Option<f64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Metric {
        #[prost(message, repeated, tag = "1")]
        pub label: Vec<LabelPair>,
        #[prost(message, optional, tag = "2")]
        pub gauge: Option<Gauge>,
        #[prost(message, optional, tag = "3")]
        pub counter: Option<Counter>,
        #[prost(message, optional, tag = "5")]
        pub untyped: Option<Untyped>,
        #[prost(int64, optional, tag = "6")]
        pub timestamp_ms: Option<i64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct MetricFamily {
        #[prost(string, optional, tag = "1")]
        pub name: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub help: Option<String>,
        #[prost(enumeration = "MetricType", optional, tag = "3")]
        pub r#type: Option<i32>,
        #[prost(message, repeated, tag = "4")]
        pub metric: Vec<Metric>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum MetricType {
        Counter = 0,
        Gauge = 1,
        Summary = 2,
        Untyped = 3,
        Histogram = 4,
        GaugeHistogram = 5,
    }
}

impl From<wire::MetricType> for MetricKind {
    fn from(value: wire::MetricType) -> Self {
        match value {
            wire::MetricType::Counter => MetricKind::Counter,
            wire::MetricType::Gauge => MetricKind::Gauge,
            wire::MetricType::Summary => MetricKind::Summary,
            wire::MetricType::Untyped => MetricKind::Untyped,
            wire::MetricType::Histogram => MetricKind::Histogram,
            wire::MetricType::GaugeHistogram => MetricKind::GaugeHistogram,
        }
    }
}

impl From<MetricKind> for wire::MetricType {
    fn from(value: MetricKind) -> Self {
        match value {
            MetricKind::Counter => wire::MetricType::Counter,
            MetricKind::Gauge => wire::MetricType::Gauge,
            MetricKind::Summary => wire::MetricType::Summary,
            MetricKind::Untyped => wire::MetricType::Untyped,
            MetricKind::Histogram => wire::MetricType::Histogram,
            MetricKind::GaugeHistogram => wire::MetricType::GaugeHistogram,
        }
    }
}

/// Decode every length-delimited family in `body`
pub fn decode_delimited(body: &[u8]) -> CollectResult<Vec<MetricFamily>> {
    let mut buf = body;
    let mut families = Vec::new();

    while !buf.is_empty() {
        let family = wire::MetricFamily::decode_length_delimited(&mut buf)?;
        families.push(convert_family(family));
    }

    Ok(families)
}

/// Encode families in the delimited format served by exporters
pub fn encode_delimited(families: &[MetricFamily]) -> Bytes {
    let mut buf = BytesMut::new();
    for family in families {
        buf.extend_from_slice(&to_wire(family).encode_length_delimited_to_vec());
    }
    buf.freeze()
}

fn convert_family(family: wire::MetricFamily) -> MetricFamily {
    // An absent type decodes as the proto default, COUNTER
    let kind = wire::MetricType::try_from(family.r#type.unwrap_or_default())
        .map(MetricKind::from)
        .unwrap_or(MetricKind::Untyped);

    let samples = family
        .metric
        .into_iter()
        .map(|metric| {
            let value = match kind {
                MetricKind::Gauge => metric.gauge.and_then(|g| g.value),
                MetricKind::Counter => metric.counter.and_then(|c| c.value),
                MetricKind::Untyped => metric.untyped.and_then(|u| u.value),
                _ => None,
            }
            .unwrap_or_default();

            let labels = metric
                .label
                .into_iter()
                .map(|pair| (pair.name.unwrap_or_default(), pair.value.unwrap_or_default()))
                .collect();

            Sample { value, labels }
        })
        .collect();

    MetricFamily {
        name: family.name.unwrap_or_default(),
        kind,
        help: family.help.unwrap_or_default(),
        samples,
    }
}

fn to_wire(family: &MetricFamily) -> wire::MetricFamily {
    let metric = family
        .samples
        .iter()
        .map(|sample| {
            let mut label: Vec<wire::LabelPair> = sample
                .labels
                .iter()
                .map(|(k, v)| wire::LabelPair {
                    name: Some(k.clone()),
                    value: Some(v.clone()),
                })
                .collect();
            label.sort_by(|a, b| a.name.cmp(&b.name));

            let value = Some(sample.value);
            wire::Metric {
                label,
                gauge: (family.kind == MetricKind::Gauge).then_some(wire::Gauge { value }),
                counter: (family.kind == MetricKind::Counter).then_some(wire::Counter { value }),
                untyped: (family.kind == MetricKind::Untyped).then_some(wire::Untyped { value }),
                timestamp_ms: None,
            }
        })
        .collect();

    wire::MetricFamily {
        name: Some(family.name.clone()),
        help: (!family.help.is_empty()).then(|| family.help.clone()),
        r#type: Some(wire::MetricType::from(family.kind) as i32),
        metric,
    }
}
