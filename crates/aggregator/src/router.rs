use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;
use treeprice_core::{AggregateError, EntityValue, NumericValue};

use crate::index::GroupIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RouteSummary {
    pub routed: u64,
    pub dropped_unmapped: u64,
}

/// Push every value onto its group's queue; values for unknown entities
/// are dropped. The group queues close when this returns.
pub(crate) async fn route(
    index: Arc<GroupIndex>,
    mut values: mpsc::Receiver<EntityValue>,
    queues: Vec<mpsc::Sender<NumericValue>>,
    cancel: CancellationToken,
) -> Result<RouteSummary, AggregateError> {
    let mut summary = RouteSummary::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AggregateError::Cancelled),
            value = values.recv() => value,
        };
        let Some(EntityValue { entity, value }) = next else {
            break;
        };

        let Some(queue) = index.slot_of(&entity).and_then(|slot| queues.get(slot)) else {
            trace!(entity = %entity, "No group for entity, dropping value");
            summary.dropped_unmapped += 1;
            continue;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AggregateError::Cancelled),
            sent = queue.send(value) => {
                // The worker only lets go of its queue when it stops early.
                if sent.is_err() {
                    return Err(AggregateError::Cancelled);
                }
            }
        }
        summary.routed += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeprice_core::{GroupItem, TreeSize};

    #[tokio::test]
    async fn routes_known_entities_and_counts_drops() {
        let index = Arc::new(GroupIndex::from_items([
            GroupItem::member(TreeSize::Short, "elm"),
            GroupItem::member(TreeSize::Tall, "oak"),
        ]));
        let (short_tx, mut short_rx) = mpsc::channel(8);
        let (tall_tx, mut tall_rx) = mpsc::channel(8);
        let (values_tx, values_rx) = mpsc::channel(8);

        for (entity, v) in [("elm", 1.0), ("ash", 2.0), ("oak", 3.0), ("Elm", 4.0)] {
            values_tx.send(EntityValue::new(entity, v)).await.unwrap();
        }
        drop(values_tx);

        let summary = route(
            index,
            values_rx,
            vec![short_tx, tall_tx],
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary, RouteSummary { routed: 3, dropped_unmapped: 1 });
        assert_eq!(short_rx.recv().await, Some(NumericValue::Float(1.0)));
        assert_eq!(short_rx.recv().await, Some(NumericValue::Float(4.0)));
        assert_eq!(short_rx.recv().await, None);
        assert_eq!(tall_rx.recv().await, Some(NumericValue::Float(3.0)));
        assert_eq!(tall_rx.recv().await, None);
    }

    #[tokio::test]
    async fn stops_on_cancellation() {
        let index = Arc::new(GroupIndex::default());
        let (_values_tx, values_rx) = mpsc::channel::<EntityValue>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = route(index, values_rx, Vec::new(), cancel).await.unwrap_err();
        assert!(matches!(err, AggregateError::Cancelled));
    }
}
