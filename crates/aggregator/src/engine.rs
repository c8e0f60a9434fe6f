//! The aggregation engine: phase-two fan-out over a frozen [`GroupIndex`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use treeprice_core::{
    AggregateError, DecimalContext, EntityValue, GroupItem, GroupKey, NumericValue,
};

use crate::accumulator::Accumulator;
use crate::index::GroupIndex;
use crate::report::GroupAverage;
use crate::router::{self, RouteSummary};

/// Default capacity of each per-group queue.
pub const DEFAULT_GROUP_QUEUE: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub context: DecimalContext,
    /// Capacity of each per-group queue.
    pub group_queue: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            context: DecimalContext::default(),
            group_queue: DEFAULT_GROUP_QUEUE,
        }
    }
}

enum TaskOutput {
    Average { slot: usize, average: NumericValue },
    Routed(RouteSummary),
}

/// Computes one average per group.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Build the index from `groups`, then aggregate `values` against it.
    pub async fn process<G: GroupKey>(
        &self,
        groups: mpsc::Receiver<GroupItem<G>>,
        values: mpsc::Receiver<EntityValue>,
        cancel: &CancellationToken,
    ) -> Result<Vec<GroupAverage>, AggregateError> {
        let index = GroupIndex::build(groups, cancel).await?;
        self.aggregate(Arc::new(index), values, cancel).await
    }

    /// Average `values` per group of `index`, in discovery order.
    ///
    /// Returns either every group's average or the first failure; a
    /// cancellation is only reported when nothing else went wrong.
    pub async fn aggregate(
        &self,
        index: Arc<GroupIndex>,
        values: mpsc::Receiver<EntityValue>,
        cancel: &CancellationToken,
    ) -> Result<Vec<GroupAverage>, AggregateError> {
        let run = cancel.child_token();
        let mut tasks: JoinSet<Result<TaskOutput, AggregateError>> = JoinSet::new();
        let mut queues = Vec::with_capacity(index.len());

        for (slot, group) in index.groups().iter().enumerate() {
            let (tx, rx) = mpsc::channel(self.config.group_queue.max(1));
            queues.push(tx);
            let group = group.clone();
            let context = self.config.context;
            let token = run.clone();
            tasks.spawn(async move {
                let average = average_group(&group, rx, &context, &token).await?;
                Ok(TaskOutput::Average { slot, average })
            });
        }
        debug!(groups = index.len(), "Averaging workers started");

        {
            let index = Arc::clone(&index);
            let token = run.clone();
            tasks.spawn(async move {
                router::route(index, values, queues, token)
                    .await
                    .map(TaskOutput::Routed)
            });
        }

        let mut averages = vec![NumericValue::Absent; index.len()];
        let mut failure: Option<AggregateError> = None;

        while let Some(joined) = tasks.join_next().await {
            let output = joined
                .map_err(|e| AggregateError::TaskFailed(e.to_string()))
                .and_then(|result| result);
            match output {
                Ok(TaskOutput::Average { slot, average }) => {
                    if let Some(entry) = averages.get_mut(slot) {
                        *entry = average;
                    }
                }
                Ok(TaskOutput::Routed(summary)) => {
                    info!(
                        routed = summary.routed,
                        dropped_unmapped = summary.dropped_unmapped,
                        "Attribute values routed"
                    );
                }
                Err(e) => {
                    run.cancel();
                    let replace = match &failure {
                        None => true,
                        Some(AggregateError::Cancelled) => !matches!(e, AggregateError::Cancelled),
                        Some(_) => false,
                    };
                    if replace {
                        failure = Some(e);
                    }
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(AggregateError::Cancelled);
        }

        let scale = self.config.context.scale;
        Ok(index
            .groups()
            .iter()
            .zip(averages)
            .map(|(group, average)| GroupAverage::new(group.clone(), average, scale))
            .collect())
    }
}

async fn average_group(
    group: &str,
    mut queue: mpsc::Receiver<NumericValue>,
    context: &DecimalContext,
    cancel: &CancellationToken,
) -> Result<NumericValue, AggregateError> {
    let mut acc = Accumulator::default();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AggregateError::Cancelled),
            value = queue.recv() => value,
        };
        match next {
            Some(value) => acc.add(group, value)?,
            None => break,
        }
    }
    debug!(group, count = acc.count(), "Group drained");
    Ok(acc.finish(context))
}
