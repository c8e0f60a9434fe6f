//! The frozen entity → group index built in phase one.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use treeprice_core::{AggregateError, EntityName, GroupItem, GroupKey};

/// Discovery-ordered groups and the entity → group mapping.
///
/// Immutable once built; share it behind an `Arc` to aggregate several
/// value streams against the same grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIndex {
    groups: Vec<String>,
    slots: HashMap<String, usize>,
    entities: HashMap<EntityName, usize>,
}

impl GroupIndex {
    /// Drain `items` completely and freeze the result.
    pub async fn build<G: GroupKey>(
        mut items: mpsc::Receiver<GroupItem<G>>,
        cancel: &CancellationToken,
    ) -> Result<Self, AggregateError> {
        let mut index = Self::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AggregateError::Cancelled),
                item = items.recv() => item,
            };
            match next {
                Some(item) => index.insert(item),
                None => break,
            }
        }
        debug!(
            groups = index.groups.len(),
            entities = index.entities.len(),
            "Group index frozen"
        );
        Ok(index)
    }

    /// Build from an in-memory sequence of items.
    pub fn from_items<G: GroupKey>(items: impl IntoIterator<Item = GroupItem<G>>) -> Self {
        let mut index = Self::default();
        for item in items {
            index.insert(item);
        }
        index
    }

    fn insert<G: GroupKey>(&mut self, item: GroupItem<G>) {
        let slot = self.slot_for(item.group().id());
        if let GroupItem::Member { entity, .. } = item {
            // An entity listed under several groups belongs to the last one.
            self.entities.insert(entity, slot);
        }
    }

    fn slot_for(&mut self, id: String) -> usize {
        if let Some(&slot) = self.slots.get(&id) {
            return slot;
        }
        let slot = self.groups.len();
        self.groups.push(id.clone());
        self.slots.insert(id, slot);
        slot
    }

    /// Group ids in discovery order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Position of the entity's group in [`groups`](Self::groups).
    pub fn slot_of(&self, entity: &EntityName) -> Option<usize> {
        self.entities.get(entity).copied()
    }

    pub fn group_of(&self, entity: &EntityName) -> Option<&str> {
        self.slot_of(entity)
            .and_then(|slot| self.groups.get(slot))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
