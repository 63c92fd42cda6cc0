//! Grouping engine - metric families to per-entity groups
//!
//! One pass over a decoded snapshot: every gauge sample is turned into a
//! [`DataPoint`] and folded into the [`EntityGroup`] of the Kubernetes object
//! it describes. The pass holds no state between calls and never fails; a
//! malformed family is skipped and the rest still group.

use std::collections::HashMap;

use crate::collector::{MetricFamily, MetricKind, Sample};

use super::event::{Event, FieldValue, METRIC_GROUP_FIELD};
use super::rules::{group_key, group_name, is_valid_metric_name, ValueRule};

/// One sample's contribution to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Family name, used as the field name
    pub name: String,
    /// `None` for label-only families
    pub value: Option<FieldValue>,
    /// Labels left after value extraction
    pub labels: HashMap<String, String>,
}

/// All data points describing one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGroup {
    /// Entity kind, e.g. `pod`, `node`, `pod-container`
    pub group_name: String,
    pub data_points: Vec<DataPoint>,
}

impl EntityGroup {
    fn new(group_name: String) -> Self {
        Self {
            group_name,
            data_points: Vec::new(),
        }
    }

    /// Materialize the group as a flat event
    ///
    /// Data points are applied in order: the value (when present) under the
    /// family name, then the labels. Later writes replace earlier ones, and
    /// `metric_group` is set last.
    pub fn to_event(&self) -> Event {
        let mut event = Event::new();

        for dp in &self.data_points {
            if let Some(value) = &dp.value {
                event.add_field(dp.name.as_str(), value.clone());
            }
            for (key, value) in &dp.labels {
                event.add_field(key.as_str(), value.as_str());
            }
        }

        event.add_field(METRIC_GROUP_FIELD, self.group_name.as_str());
        event
    }
}

/// Extract the data point of one gauge sample, or `None` if it is dropped
pub fn extract_data_point(family: &MetricFamily, sample: &Sample) -> Option<DataPoint> {
    let (value, labels) =
        ValueRule::for_metric(&family.name).apply(sample.value, sample.labels.clone())?;

    Some(DataPoint {
        name: family.name.clone(),
        value,
        labels,
    })
}

/// Group a snapshot into entities. Output order is unspecified.
pub fn group_metric_families(families: &[MetricFamily]) -> Vec<EntityGroup> {
    let mut groups: HashMap<String, EntityGroup> = HashMap::new();

    for family in families {
        if family.kind != MetricKind::Gauge {
            tracing::trace!(metric = %family.name, kind = %family.kind, "Skipping non-gauge family");
            continue;
        }

        if !is_valid_metric_name(&family.name) {
            tracing::warn!(
                metric = %family.name,
                "Unable to extract group name from metric name, skipping family"
            );
            continue;
        }

        let name = group_name(&family.name);

        for sample in &family.samples {
            let Some(dp) = extract_data_point(family, sample) else {
                continue;
            };

            let key = group_key(&name, &sample.labels);
            groups
                .entry(key)
                .or_insert_with(|| EntityGroup::new(name.clone()))
                .data_points
                .push(dp);
        }
    }

    tracing::debug!(
        families = families.len(),
        groups = groups.len(),
        "Grouped metric families"
    );

    groups.into_values().collect()
}

/// Group a snapshot and materialize every entity as an event
pub fn events_from_families(families: &[MetricFamily]) -> Vec<Event> {
    group_metric_families(families)
        .iter()
        .map(EntityGroup::to_event)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauge(name: &str, samples: Vec<Sample>) -> MetricFamily {
        MetricFamily {
            name: name.to_string(),
            kind: MetricKind::Gauge,
            help: String::new(),
            samples,
        }
    }

    fn find<'a>(groups: &'a [EntityGroup], group_name: &str) -> Vec<&'a EntityGroup> {
        groups.iter().filter(|g| g.group_name == group_name).collect()
    }

    #[test]
    fn test_extract_phase() {
        let family = gauge("kube_pod_status_phase", vec![]);
        let sample = Sample::new(1.0).with_label("phase", "Running");

        let dp = extract_data_point(&family, &sample).unwrap();
        assert_eq!(dp.name, "kube_pod_status_phase");
        assert_eq!(dp.value, Some(FieldValue::Text("Running".to_string())));
        assert!(!dp.labels.contains_key("phase"));
    }

    #[test]
    fn test_extract_condition_false_half_dropped() {
        let family = gauge("kube_pod_status_ready", vec![]);
        let sample = Sample::new(0.0).with_label("condition", "true");
        assert!(extract_data_point(&family, &sample).is_none());
    }

    #[test]
    fn test_extract_label_only() {
        let family = gauge("kube_pod_labels", vec![]);
        let sample = Sample::new(1.0)
            .with_label("namespace", "default")
            .with_label("label_app", "web");

        let dp = extract_data_point(&family, &sample).unwrap();
        assert_eq!(dp.value, None);
        assert_eq!(dp.labels, sample.labels);
    }

    #[test]
    fn test_distinct_entities_do_not_collide() {
        let families = vec![gauge(
            "kube_pod_container_resource_limits_memory_bytes",
            vec![
                Sample::new(1024.0)
                    .with_label("namespace", "default")
                    .with_label("pod", "web-1")
                    .with_label("container", "app"),
                Sample::new(2048.0)
                    .with_label("namespace", "default")
                    .with_label("pod", "web-2")
                    .with_label("container", "app"),
            ],
        )];

        let groups = group_metric_families(&families);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.group_name == "pod-container"));
    }

    #[test]
    fn test_families_fold_into_one_entity() {
        let families = vec![
            gauge(
                "kube_node_status_ready",
                vec![
                    Sample::new(1.0).with_label("node", "n1").with_label("condition", "true"),
                    Sample::new(0.0).with_label("node", "n1").with_label("condition", "false"),
                    Sample::new(0.0).with_label("node", "n1").with_label("condition", "unknown"),
                ],
            ),
            gauge(
                "kube_node_status_capacity_pods",
                vec![Sample::new(110.0).with_label("node", "n1")],
            ),
        ];

        let groups = group_metric_families(&families);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].data_points.len(), 2);

        let event = groups[0].to_event();
        assert_eq!(event.metric_group(), Some("node"));
        assert_eq!(
            event.get("kube_node_status_ready"),
            Some(&FieldValue::Text("true".to_string()))
        );
        assert_eq!(
            event.get("kube_node_status_capacity_pods"),
            Some(&FieldValue::Number(110.0))
        );
        assert_eq!(event.get("node"), Some(&FieldValue::Text("n1".to_string())));
        assert!(event.get("condition").is_none());
    }

    #[test]
    fn test_non_gauge_and_invalid_names_skipped() {
        let mut counter = gauge(
            "kube_pod_container_status_restarts_total",
            vec![Sample::new(3.0).with_label("pod", "p1")],
        );
        counter.kind = MetricKind::Counter;

        let families = vec![
            counter,
            gauge("process_cpu_seconds", vec![Sample::new(1.0)]),
            gauge("kube__wut", vec![Sample::new(1.0)]),
            gauge(
                "kube_service_info",
                vec![Sample::new(1.0)
                    .with_label("namespace", "default")
                    .with_label("service", "web")
                    .with_label("cluster_ip", "10.0.0.1")],
            ),
        ];

        let groups = group_metric_families(&families);
        assert_eq!(groups.len(), 1);

        let event = groups[0].to_event();
        assert_eq!(event.metric_group(), Some("service"));
        assert!(event.get("kube_service_info").is_none());
        assert_eq!(event.get("cluster_ip").and_then(FieldValue::as_str), Some("10.0.0.1"));
    }

    #[test]
    fn test_group_with_only_dropped_samples_is_not_emitted() {
        let families = vec![gauge(
            "kube_pod_status_scheduled",
            vec![Sample::new(0.0)
                .with_label("namespace", "default")
                .with_label("pod", "p1")
                .with_label("condition", "true")],
        )];
        assert!(group_metric_families(&families).is_empty());
    }

    #[test]
    fn test_label_conflicts_last_write_wins() {
        let group = EntityGroup {
            group_name: "pod".to_string(),
            data_points: vec![
                DataPoint {
                    name: "kube_pod_info".to_string(),
                    value: None,
                    labels: [("node".to_string(), "n1".to_string())].into(),
                },
                DataPoint {
                    name: "kube_pod_labels".to_string(),
                    value: None,
                    labels: [("node".to_string(), "n2".to_string())].into(),
                },
            ],
        };
        let event = group.to_event();
        assert_eq!(event.get("node").and_then(FieldValue::as_str), Some("n2"));
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn test_missing_labels_share_partial_key() {
        let families = vec![gauge(
            "kube_deployment_spec_replicas",
            vec![Sample::new(3.0), Sample::new(5.0)],
        )];

        let groups = group_metric_families(&families);
        let deployments = find(&groups, "deployment");
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].data_points.len(), 2);
    }

    #[test]
    fn test_events_from_families() {
        let families = vec![gauge(
            "kube_pod_status_phase",
            vec![Sample::new(1.0)
                .with_label("namespace", "default")
                .with_label("pod", "p1")
                .with_label("phase", "Pending")],
        )];
        let events = events_from_families(&families);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].get("kube_pod_status_phase").and_then(FieldValue::as_str),
            Some("Pending")
        );
        assert_eq!(events[0].metric_group(), Some("pod"));
    }

    #[test]
    fn test_non_finite_gauge_event_round_trips() {
        let families = vec![gauge(
            "kube_hpa_status_current_metrics_value",
            vec![Sample::new(f64::NAN)
                .with_label("namespace", "ns")
                .with_label("hpa", "h")],
        )];

        let events = events_from_families(&families);
        let json = serde_json::to_string(&events[0]).unwrap();
        assert!(!json.contains("null"));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(
            back.get("kube_hpa_status_current_metrics_value"),
            Some(&FieldValue::Text("NaN".to_string()))
        );
        assert_eq!(back.metric_group(), Some("hpa"));
    }
}

