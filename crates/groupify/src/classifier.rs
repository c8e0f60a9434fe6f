//! The classification state machine.
//!
//! ```text
//! depth 0   {                          Root
//! depth 1     "short": {               Section  (group chosen by the key)
//! depth 2+      "road": { "main": 5 }  Inside   (numbers emit members)
//!             }
//!           }
//! ```
//!
//! Depth is a plain counter: only the current depth and the most recent key
//! are ever needed.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use treeprice_core::{EntityName, GroupItem, GroupKey, StreamError, Taxonomy, Token, TokenSource};

/// Counts reported when a classification run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    pub tokens: u64,
    pub members: u64,
    pub sections: u64,
}

/// Assigns entities to groups while scanning a [`TokenSource`].
pub struct GroupClassifier<S, T: Taxonomy> {
    source: S,
    taxonomy: T,
    depth: usize,
    last_key: Option<String>,
    current: T::Group,
}

impl<S: TokenSource, T: Taxonomy> GroupClassifier<S, T> {
    pub fn new(source: S, taxonomy: T) -> Self {
        let current = taxonomy.unclassified();
        Self {
            source,
            taxonomy,
            depth: 0,
            last_key: None,
            current,
        }
    }

    /// Apply one token to the state machine.
    pub fn step(&mut self, token: Token) -> Option<GroupItem<T::Group>> {
        match token {
            Token::Open(_) => {
                let mut item = None;
                if self.depth == 1 {
                    let key = self.last_key.take().unwrap_or_default();
                    self.current = self.taxonomy.classify(&key);
                    if self.current.is_classified() {
                        item = Some(GroupItem::Section(self.current.clone()));
                    }
                }
                self.depth += 1;
                self.last_key = None;
                item
            }
            Token::Close(_) => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 1 {
                    self.current = self.taxonomy.unclassified();
                }
                self.last_key = None;
                None
            }
            Token::Key(key) => {
                self.last_key = Some(key);
                None
            }
            Token::Number(_) => self
                .last_key
                .take()
                .filter(|key| !key.is_empty())
                .map(|key| GroupItem::Member {
                    group: self.current.clone(),
                    entity: EntityName::parse(&key),
                }),
            // String values, booleans and nulls leave the pending key alone.
            Token::Other(_) => None,
        }
    }

    /// Drain the token source, sending every item to `out`.
    ///
    /// Stops quietly if the receiver is dropped. A decode error or
    /// cancellation ends the run with an error.
    pub async fn run(
        mut self,
        out: mpsc::Sender<GroupItem<T::Group>>,
        cancel: CancellationToken,
    ) -> Result<ClassifySummary, StreamError> {
        let mut summary = ClassifySummary::default();

        while let Some(token) = self.source.next_token(&cancel).await? {
            summary.tokens += 1;
            let Some(item) = self.step(token) else {
                continue;
            };
            match item {
                GroupItem::Section(_) => summary.sections += 1,
                GroupItem::Member { .. } => summary.members += 1,
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                sent = out.send(item) => {
                    if sent.is_err() {
                        debug!("Group item receiver dropped, stopping classifier");
                        return Ok(summary);
                    }
                }
            }
        }

        debug!(
            tokens = summary.tokens,
            members = summary.members,
            sections = summary.sections,
            "Group classification finished"
        );
        Ok(summary)
    }

    /// Classify the whole document into a vector, in document order.
    pub async fn collect(
        mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<GroupItem<T::Group>>, StreamError> {
        let mut items = Vec::new();
        while let Some(token) = self.source.next_token(cancel).await? {
            items.extend(self.step(token));
        }
        Ok(items)
    }
}
