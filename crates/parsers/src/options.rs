//! Column selection and numeric mode for the attribute parser.

use serde::{Deserialize, Serialize};
use treeprice_core::{ColumnError, NumericMode};

/// A column given by header name (case-insensitive) or by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Parser configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Column holding the join key.
    pub entity: ColumnRef,
    /// Column holding the numeric value.
    pub value: ColumnRef,
    pub mode: NumericMode,
}

impl ParserOptions {
    pub fn new(entity: impl Into<ColumnRef>, value: impl Into<ColumnRef>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            mode: NumericMode::default(),
        }
    }

    pub fn by_names(entity: &str, value: &str) -> Self {
        Self::new(entity, value)
    }

    pub fn by_indexes(entity: usize, value: usize) -> Self {
        Self::new(entity, value)
    }

    pub fn with_mode(mut self, mode: NumericMode) -> Self {
        self.mode = mode;
        self
    }

    /// Force `f64` parsing.
    pub fn floats(self) -> Self {
        self.with_mode(NumericMode::Float)
    }

    /// Force exact decimal parsing (the default).
    pub fn decimals(self) -> Self {
        self.with_mode(NumericMode::Decimal)
    }

    /// Resolve both columns against `header`, returning `(entity, value)`
    /// positions.
    pub fn resolve(&self, header: &[String]) -> Result<(usize, usize), ColumnError> {
        if let ColumnRef::Name(name) = &self.entity {
            if name.trim().is_empty() {
                return Err(ColumnError::EntityColumnNotSpecified);
            }
        }
        if let ColumnRef::Name(name) = &self.value {
            if name.trim().is_empty() {
                return Err(ColumnError::ValueColumnNotSpecified);
            }
        }
        match (&self.entity, &self.value) {
            (ColumnRef::Name(a), ColumnRef::Name(b)) if same_name(a, b) => {
                return Err(ColumnError::ColumnNamesEqual);
            }
            (ColumnRef::Index(a), ColumnRef::Index(b)) if a == b => {
                return Err(ColumnError::ColumnIndexesEqual);
            }
            _ => {}
        }

        let needs_header = matches!(self.entity, ColumnRef::Name(_))
            || matches!(self.value, ColumnRef::Name(_));
        if needs_header && header.is_empty() {
            return Err(ColumnError::NoHeader);
        }

        let entity = match &self.entity {
            ColumnRef::Index(i) => *i,
            ColumnRef::Name(name) => find(header, name)
                .ok_or_else(|| ColumnError::EntityColumnMissing(name.trim().to_string()))?,
        };
        let value = match &self.value {
            ColumnRef::Index(i) => *i,
            ColumnRef::Name(name) => find(header, name)
                .ok_or_else(|| ColumnError::ValueColumnMissing(name.trim().to_string()))?,
        };
        if entity == value {
            return Err(ColumnError::ColumnIndexesEqual);
        }
        Ok((entity, value))
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Index of the column called `name`; with duplicate names the last one wins.
fn find(header: &[String], name: &str) -> Option<usize> {
    header.iter().rposition(|col| same_name(col, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn resolves_names_case_insensitively() {
        let options = ParserOptions::by_names("Street Name", "Price");
        let cols = header(&["Date", "Address", "STREET name ", "price"]);
        assert_eq!(options.resolve(&cols), Ok((2, 3)));
    }

    #[test]
    fn resolves_indexes_without_header() {
        let options = ParserOptions::by_indexes(0, 4);
        assert_eq!(options.resolve(&[]), Ok((0, 4)));
    }

    #[test]
    fn mixes_name_and_index() {
        let options = ParserOptions::new("Street Name", 3usize);
        let cols = header(&["Street Name", "x", "y", "Price"]);
        assert_eq!(options.resolve(&cols), Ok((0, 3)));
    }

    #[test]
    fn each_violation_has_its_own_error() {
        let cols = header(&["Date", "Street Name", "Price"]);
        let cases = [
            (ParserOptions::by_names(" ", "Price"), ColumnError::EntityColumnNotSpecified),
            (ParserOptions::by_names("Street Name", ""), ColumnError::ValueColumnNotSpecified),
            (ParserOptions::by_names("price", "PRICE"), ColumnError::ColumnNamesEqual),
            (ParserOptions::by_indexes(1, 1), ColumnError::ColumnIndexesEqual),
            (
                ParserOptions::by_names("Street", "Price"),
                ColumnError::EntityColumnMissing("Street".into()),
            ),
            (
                ParserOptions::by_names("Street Name", "Cost"),
                ColumnError::ValueColumnMissing("Cost".into()),
            ),
            (ParserOptions::new("Price", 2usize), ColumnError::ColumnIndexesEqual),
        ];
        for (options, expected) in cases {
            assert_eq!(options.resolve(&cols), Err(expected), "{options:?}");
        }
    }

    #[test]
    fn duplicate_header_names_pick_the_last() {
        let options = ParserOptions::by_names("Street Name", "Price");
        let cols = header(&["Price", "Street Name", "price", "Street name"]);
        assert_eq!(options.resolve(&cols), Ok((3, 2)));
    }

    #[test]
    fn names_need_a_header() {
        let options = ParserOptions::by_names("Street Name", "Price");
        assert_eq!(options.resolve(&[]), Err(ColumnError::NoHeader));
    }

    #[test]
    fn mode_builders() {
        let options = ParserOptions::by_indexes(0, 1);
        assert_eq!(options.mode, NumericMode::Decimal);
        assert_eq!(options.clone().floats().mode, NumericMode::Float);
        assert_eq!(options.floats().decimals().mode, NumericMode::Decimal);
    }
}
