//! End-to-end wiring: classifier and parser producers feeding the engine.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use treeprice_core::{AggregateError, Error, RecordSource, StreamError, Taxonomy, TokenSource};
use treeprice_groupify::{ClassifySummary, GroupClassifier};
use treeprice_parsers::{AttributeParser, ParseSummary};

use crate::engine::Aggregator;
use crate::report::GroupAverage;

/// Default capacity of the classifier → engine queue.
pub const DEFAULT_GROUP_ITEM_QUEUE: usize = 1_000;
/// Default capacity of the parser → engine queue.
pub const DEFAULT_VALUE_QUEUE: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub group_queue: usize,
    pub value_queue: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            group_queue: DEFAULT_GROUP_ITEM_QUEUE,
            value_queue: DEFAULT_VALUE_QUEUE,
        }
    }
}

/// Averages plus what each producer saw.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub averages: Vec<GroupAverage>,
    pub classify: ClassifySummary,
    pub parse: ParseSummary,
}

/// Run classifier, parser and engine to completion.
///
/// Error priority: a producer failure beats an engine failure, which beats
/// cancellation. A failing producer cancels the run so the engine stops.
pub async fn run<S, T, R>(
    classifier: GroupClassifier<S, T>,
    parser: AttributeParser<R>,
    aggregator: &Aggregator,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<PipelineReport, Error>
where
    S: TokenSource + 'static,
    T: Taxonomy,
    R: RecordSource + 'static,
{
    let run = cancel.child_token();
    let (group_tx, group_rx) = mpsc::channel(config.group_queue.max(1));
    let (value_tx, value_rx) = mpsc::channel(config.value_queue.max(1));

    let classify = spawn_producer(run.clone(), |token| classifier.run(group_tx, token));
    let parse = spawn_producer(run.clone(), |token| parser.run(value_tx, token));
    debug!("Producers started");

    let engine = aggregator.process(group_rx, value_rx, &run).await;
    if engine.is_err() {
        run.cancel();
    }

    let classified = join_producer(classify).await;
    let parsed = join_producer(parse).await;

    let classify = producer_result(classified)?;
    let parse = producer_result(parsed)?;
    let averages = match engine {
        Ok(averages) => averages,
        Err(AggregateError::Cancelled) => return Err(Error::Cancelled),
        Err(e) => return Err(Error::Aggregate(e)),
    };
    let (Some(classify), Some(parse)) = (classify, parse) else {
        return Err(Error::Cancelled);
    };

    info!(
        groups = averages.len(),
        members = classify.members,
        records = parse.records,
        emitted = parse.emitted,
        "Pipeline finished"
    );
    Ok(PipelineReport {
        averages,
        classify,
        parse,
    })
}

fn spawn_producer<F, Fut, O>(
    token: CancellationToken,
    start: F,
) -> JoinHandle<Result<O, StreamError>>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<O, StreamError>> + Send + 'static,
    O: Send + 'static,
{
    let task = start(token.clone());
    tokio::spawn(async move {
        let result = task.await;
        if let Err(e) = &result {
            if !matches!(e, StreamError::Cancelled) {
                token.cancel();
            }
        }
        result
    })
}

async fn join_producer<O>(handle: JoinHandle<Result<O, StreamError>>) -> Result<O, Error> {
    match handle.await {
        Ok(result) => result.map_err(Error::Stream),
        Err(e) => Err(Error::Internal(format!("producer task failed: {e}"))),
    }
}

/// Real failures propagate; a cancelled producer yields `None`.
fn producer_result<O>(result: Result<O, Error>) -> Result<Option<O>, Error> {
    match result {
        Ok(summary) => Ok(Some(summary)),
        Err(e) if e.is_cancelled() => Ok(None),
        Err(e) => Err(e),
    }
}
