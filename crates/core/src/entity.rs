//! Entity names — the join key shared by the grouping document and the
//! attribute records.

use std::fmt;

use crate::numeric::NumericValue;

/// A normalized entity identifier.
///
/// Trimmed, lower-cased, with every run of whitespace squashed to a single
/// space. Two surface spellings that normalize identically join to the same
/// group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityName(String);

impl EntityName {
    /// Normalize raw text into an entity name.
    pub fn parse(raw: &str) -> Self {
        let folded = raw.to_lowercase();
        let squashed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
        Self(squashed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityName {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// One (entity, value) pair emitted by the attribute parser.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityValue {
    pub entity: EntityName,
    pub value: NumericValue,
}

impl EntityValue {
    pub fn new(entity: impl Into<EntityName>, value: impl Into<NumericValue>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(EntityName::parse("  Main   Street\t"), EntityName::parse("main street"));
        assert_eq!(EntityName::parse("O'Connell\n St").as_str(), "o'connell st");
    }

    #[test]
    fn blank_input_is_empty() {
        assert!(EntityName::parse("   ").is_empty());
    }

    #[test]
    fn entity_value_builder_normalizes() {
        let pair = EntityValue::new("Oak  Avenue", 1.5);
        assert_eq!(pair.entity.as_str(), "oak avenue");
        assert_eq!(pair.value, NumericValue::Float(1.5));
    }
}
