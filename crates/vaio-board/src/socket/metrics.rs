//! Latest metrics snapshot per namespace.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use vaio_proto::{MetricsNamespace, MetricsUpdate};

/// One stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSample {
    /// Snapshot as sent by the backend.
    pub data: Value,
    /// When it arrived.
    pub received_at: DateTime<Utc>,
}

/// Keeps only the newest snapshot of each namespace.
#[derive(Debug, Default)]
pub struct MetricsStore {
    samples: RwLock<BTreeMap<MetricsNamespace, MetricsSample>>,
}

impl MetricsStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `update`, replacing the previous snapshot of its namespace.
    pub fn record(&self, update: MetricsUpdate) {
        self.samples.write().insert(
            update.namespace,
            MetricsSample {
                data: update.data,
                received_at: Utc::now(),
            },
        );
    }

    /// Newest snapshot data of `namespace`.
    #[must_use]
    pub fn latest(&self, namespace: MetricsNamespace) -> Option<Value> {
        self.samples.read().get(&namespace).map(|sample| sample.data.clone())
    }

    /// Every stored snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<MetricsNamespace, MetricsSample> {
        self.samples.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keeps_newest_per_namespace() {
        let store = MetricsStore::new();
        store.record(MetricsUpdate {
            namespace: MetricsNamespace::Gpu,
            data: json!({"util": 10}),
        });
        store.record(MetricsUpdate {
            namespace: MetricsNamespace::Gpu,
            data: json!({"util": 85}),
        });
        store.record(MetricsUpdate {
            namespace: MetricsNamespace::Cpu,
            data: json!({"load": 0.4}),
        });

        assert_eq!(store.latest(MetricsNamespace::Gpu), Some(json!({"util": 85})));
        assert!(store.latest(MetricsNamespace::Disk).is_none());
        assert_eq!(store.snapshot().len(), 2);
    }
}
