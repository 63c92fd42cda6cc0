//! Naming-convention rules for kube-state-metrics families
//!
//! kube-state-metrics names every family `kube_<group>_<...>`. This module
//! holds the pieces of domain knowledge the grouping pass relies on:
//!
//! - which family names are accepted at all ([`is_valid_metric_name`]),
//! - which entity kind a family describes ([`group_name`]),
//! - which labels identify one entity of that kind ([`group_key`]),
//! - how a sample's value is read for a given family ([`ValueRule`]).
//!
//! # Example
//!
//! ```ignore
//! use prom2hny::transformer::rules::{group_key, group_name, ValueRule};
//!
//! let group = group_name("kube_pod_container_info");
//! assert_eq!(group, "pod-container");
//! assert_eq!(ValueRule::for_metric("kube_pod_info"), ValueRule::MetadataOnly);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::event::FieldValue;

/// Separator between fold key segments
pub const KEY_SEPARATOR: &str = ":";

/// Group name used for per-container pod families
pub const POD_CONTAINER_GROUP: &str = "pod-container";

static METRIC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^kube_[^_]+_*").expect("invalid metric name regex"));

/// Families that only contribute labels; their numeric value is meaningless
const METADATA_ONLY_METRICS: &[&str] = &[
    "kube_pod_labels",
    "kube_pod_info",
    "kube_service_info",
    "kube_pod_container_info",
    "kube_node_labels",
    "kube_service_labels",
];

/// Boolean condition families, one sample per condition value
const CONDITION_METRICS: &[&str] = &[
    "kube_pod_status_ready",
    "kube_pod_status_scheduled",
    "kube_node_status_disk_pressure",
    "kube_node_status_memory_pressure",
    "kube_node_status_out_of_disk",
    "kube_node_status_ready",
];

/// Check a family name against the `kube_<group>...` convention
///
/// The name needs at least one non-underscore character right after the
/// `kube_` prefix, so `kube_`, `kube__wut` and `blah_kube_blah` are rejected.
pub fn is_valid_metric_name(name: &str) -> bool {
    METRIC_NAME_RE.is_match(name)
}

/// Entity kind a family describes
///
/// The second `_`-separated segment, except `kube_pod_container_*` which
/// maps to `pod-container`. Callers validate the name first.
pub fn group_name(metric_name: &str) -> String {
    let mut segments = metric_name.split('_').skip(1);
    let group = segments.next().unwrap_or_default();

    if group == "pod" && segments.next() == Some("container") {
        return POD_CONTAINER_GROUP.to_string();
    }

    group.to_string()
}

/// Fold key identifying one entity across families
///
/// Missing labels become empty segments rather than errors.
pub fn group_key(group_name: &str, labels: &HashMap<String, String>) -> String {
    let label = |key: &str| labels.get(key).map(String::as_str).unwrap_or_default();

    let entity_key = match group_name {
        "node" => label("node").to_string(),
        POD_CONTAINER_GROUP => [label("namespace"), label("pod"), label("container")].join(KEY_SEPARATOR),
        other => [label("namespace"), label(other)].join(KEY_SEPARATOR),
    };

    format!("{group_name}{KEY_SEPARATOR}{entity_key}")
}

/// How the value of a sample is read, keyed by exact family name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// Raw gauge value
    Direct,
    /// Enum state carried by a label; the label becomes the value
    EnumValueLabel(&'static str),
    /// No value, labels only
    MetadataOnly,
    /// One boolean sample per condition; only the sample at 1 is kept and
    /// its condition label becomes the value
    ConditionBoolean(&'static str),
}

impl ValueRule {
    /// Look up the rule for a family name
    pub fn for_metric(metric_name: &str) -> Self {
        match metric_name {
            "kube_pod_status_phase" => ValueRule::EnumValueLabel("phase"),
            name if METADATA_ONLY_METRICS.contains(&name) => ValueRule::MetadataOnly,
            name if CONDITION_METRICS.contains(&name) => ValueRule::ConditionBoolean("condition"),
            _ => ValueRule::Direct,
        }
    }

    /// Apply the rule to one sample.
    ///
    /// Returns `None` when the sample is dropped, otherwise the value (if
    /// any) and the labels left after the consumed one is removed.
    pub fn apply(
        &self,
        value: f64,
        mut labels: HashMap<String, String>,
    ) -> Option<(Option<FieldValue>, HashMap<String, String>)> {
        match self {
            ValueRule::Direct => Some((Some(number_field(value)), labels)),
            ValueRule::MetadataOnly => Some((None, labels)),
            ValueRule::EnumValueLabel(label) => {
                let state = labels.remove(*label).unwrap_or_default();
                Some((Some(FieldValue::Text(state)), labels))
            }
            ValueRule::ConditionBoolean(label) => {
                if value != 1.0 {
                    return None;
                }
                let condition = labels.remove(*label).unwrap_or_default();
                Some((Some(FieldValue::Text(condition)), labels))
            }
        }
    }
}

/// JSON has no NaN or infinities; those are sent in exposition notation
fn number_field(value: f64) -> FieldValue {
    if value.is_nan() {
        FieldValue::Text("NaN".to_string())
    } else if value.is_infinite() {
        let token = if value > 0.0 { "+Inf" } else { "-Inf" };
        FieldValue::Text(token.to_string())
    } else {
        FieldValue::Number(value)
    }
}
