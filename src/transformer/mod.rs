//! Metric grouping module
//!
//! Reshapes flat kube-state-metrics families into one event per
//! Kubernetes object (pod, node, service, container, ...).

pub mod engine;
pub mod event;
pub mod rules;

pub use engine::{
    events_from_families, extract_data_point, group_metric_families, DataPoint, EntityGroup,
};
pub use event::{Event, FieldValue, METRIC_GROUP_FIELD};
pub use rules::{group_key, group_name, is_valid_metric_name, ValueRule};
