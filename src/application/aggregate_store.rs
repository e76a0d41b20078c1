// Shared aggregate state - one writer (ingest loop), many snapshot readers
use crate::domain::aggregate::{AggregateLimits, AggregateSnapshot, Aggregator};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Inner {
    aggregator: Aggregator,
    updated_at: Option<DateTime<Utc>>,
}

/// Cloneable handle to the live aggregates. Readers only ever get copies.
#[derive(Clone)]
pub struct AggregateStore {
    inner: Arc<RwLock<Inner>>,
}

impl AggregateStore {
    pub fn new(limits: AggregateLimits) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                aggregator: Aggregator::new(limits),
                updated_at: None,
            })),
        }
    }

    /// Run a mutation under the write lock and stamp the update time.
    pub async fn update<R>(&self, f: impl FnOnce(&mut Aggregator) -> R) -> R {
        let mut inner = self.inner.write().await;
        let result = f(&mut inner.aggregator);
        inner.updated_at = Some(Utc::now());
        result
    }

    pub async fn snapshot(&self) -> AggregateSnapshot {
        let inner = self.inner.read().await;
        let mut snapshot = inner.aggregator.snapshot();
        snapshot.updated_at_ms = inner.updated_at.map(|t| t.timestamp_millis());
        snapshot
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.aggregator.clear();
        inner.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::ThroughputPoint;

    #[tokio::test]
    async fn test_snapshot_is_detached_copy() {
        let store = AggregateStore::new(AggregateLimits::default());
        assert_eq!(store.snapshot().await.updated_at_ms, None);

        store.update(|agg| agg.apply_throughput(10.0)).await;
        let before = store.snapshot().await;

        store.update(|agg| agg.apply_throughput(20.0)).await;
        let after = store.snapshot().await;

        assert_eq!(before.throughput, vec![ThroughputPoint::new(1, 10.0)]);
        assert_eq!(after.throughput.len(), 2);
        assert!(after.updated_at_ms.is_some());
    }

    #[tokio::test]
    async fn test_clear_empties_views() {
        let store = AggregateStore::new(AggregateLimits::default());
        store.update(|agg| agg.apply_throughput(10.0)).await;
        store.clear().await;

        let snapshot = store.snapshot().await;
        assert!(snapshot.throughput.is_empty());
        assert!(snapshot.spectrum.is_empty());
    }
}
