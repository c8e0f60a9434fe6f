//! Streams `(entity, value)` pairs out of tabular records.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use treeprice_core::numeric::normalize;
use treeprice_core::{
    ColumnError, EntityName, EntityValue, NumericMode, NumericValue, RecordSource, StreamError,
};

use crate::options::ParserOptions;

/// What happened to the records of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub records: u64,
    pub emitted: u64,
    /// Records with fewer fields than the selected columns need.
    pub short: u64,
    /// Values that were empty after normalization.
    pub blank: u64,
    pub unparseable: u64,
}

impl ParseSummary {
    pub fn skipped(&self) -> u64 {
        self.short + self.blank + self.unparseable
    }
}

/// Extracts one column pair from every record of a [`RecordSource`].
pub struct AttributeParser<S> {
    source: S,
    entity: usize,
    value: usize,
    mode: NumericMode,
}

impl<S: RecordSource> AttributeParser<S> {
    /// Resolve the configured columns against the source's header.
    pub fn new(source: S, options: &ParserOptions) -> Result<Self, ColumnError> {
        let (entity, value) = options.resolve(source.header())?;
        debug!(entity, value, mode = %options.mode, "Attribute columns resolved");
        Ok(Self {
            source,
            entity,
            value,
            mode: options.mode,
        })
    }

    /// Column positions as `(entity, value)`.
    pub fn columns(&self) -> (usize, usize) {
        (self.entity, self.value)
    }

    /// Turn one record into a pair, or `None` if it is skipped.
    fn extract(&self, record: &[String], summary: &mut ParseSummary) -> Option<EntityValue> {
        let (Some(entity), Some(raw)) = (record.get(self.entity), record.get(self.value)) else {
            summary.short += 1;
            return None;
        };

        let text = normalize(raw);
        if text.is_empty() {
            summary.blank += 1;
            return None;
        }

        match NumericValue::parse(&text, self.mode) {
            Ok(value) => Some(EntityValue::new(EntityName::parse(entity), value)),
            Err(e) => {
                warn!(record = summary.records, error = %e, "Skipping unparseable value");
                summary.unparseable += 1;
                None
            }
        }
    }

    /// Read every record, sending extracted pairs to `out`.
    ///
    /// Stops quietly if the receiver is dropped.
    pub async fn run(
        mut self,
        out: mpsc::Sender<EntityValue>,
        cancel: CancellationToken,
    ) -> Result<ParseSummary, StreamError> {
        let mut summary = ParseSummary::default();

        while let Some(record) = self.source.next_record(&cancel).await? {
            summary.records += 1;
            let Some(pair) = self.extract(&record, &mut summary) else {
                continue;
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                sent = out.send(pair) => {
                    if sent.is_err() {
                        debug!("Attribute receiver dropped, stopping parser");
                        return Ok(summary);
                    }
                }
            }
            summary.emitted += 1;
        }

        info!(
            records = summary.records,
            emitted = summary.emitted,
            skipped = summary.skipped(),
            "Attribute stream parsed"
        );
        Ok(summary)
    }

    /// Parse the whole source into a vector.
    pub async fn collect(
        mut self,
        cancel: &CancellationToken,
    ) -> Result<(Vec<EntityValue>, ParseSummary), StreamError> {
        let mut summary = ParseSummary::default();
        let mut pairs = Vec::new();
        while let Some(record) = self.source.next_record(cancel).await? {
            summary.records += 1;
            if let Some(pair) = self.extract(&record, &mut summary) {
                summary.emitted += 1;
                pairs.push(pair);
            }
        }
        Ok((pairs, summary))
    }
}
