use bigdecimal::BigDecimal;
use treeprice_core::{AggregateError, DecimalContext, NumericKind, NumericValue};

/// Running sum and count for one group, typed by the first value seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum Accumulator {
    #[default]
    Empty,
    Float { sum: f64, count: u64 },
    Decimal { sum: BigDecimal, count: u64 },
}

impl Accumulator {
    fn kind(&self) -> NumericKind {
        match self {
            Self::Empty => NumericKind::Absent,
            Self::Float { .. } => NumericKind::Float,
            Self::Decimal { .. } => NumericKind::Decimal,
        }
    }

    /// Fold one value in. Absent values are ignored.
    pub(crate) fn add(&mut self, group: &str, value: NumericValue) -> Result<(), AggregateError> {
        match self {
            Self::Empty => {
                *self = match value {
                    NumericValue::Absent => Self::Empty,
                    NumericValue::Float(v) => Self::Float { sum: v, count: 1 },
                    NumericValue::Decimal(d) => Self::Decimal { sum: d, count: 1 },
                };
                Ok(())
            }
            Self::Float { sum, count } => match value {
                NumericValue::Absent => Ok(()),
                NumericValue::Float(v) => {
                    *sum += v;
                    *count += 1;
                    Ok(())
                }
                other => Err(mismatch(group, NumericKind::Float, other.kind())),
            },
            Self::Decimal { sum, count } => match value {
                NumericValue::Absent => Ok(()),
                NumericValue::Decimal(d) => {
                    *sum += d;
                    *count += 1;
                    Ok(())
                }
                other => Err(mismatch(group, NumericKind::Decimal, other.kind())),
            },
        }
    }

    pub(crate) fn count(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::Float { count, .. } | Self::Decimal { count, .. } => *count,
        }
    }

    /// Final average; an empty group yields [`NumericValue::Absent`].
    pub(crate) fn finish(self, context: &DecimalContext) -> NumericValue {
        match self {
            Self::Empty => NumericValue::Absent,
            Self::Float { sum, count } => context
                .average_f64(sum, count)
                .map_or(NumericValue::Absent, NumericValue::Float),
            Self::Decimal { sum, count } => context
                .average(&sum, count)
                .map_or(NumericValue::Absent, NumericValue::Decimal),
        }
    }
}

fn mismatch(group: &str, expected: NumericKind, found: NumericKind) -> AggregateError {
    AggregateError::TypeMismatch {
        group: group.to_string(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeprice_core::NumericMode;

    fn dec(s: &str) -> NumericValue {
        NumericValue::parse(s, NumericMode::Decimal).unwrap()
    }

    #[test]
    fn decimal_average_is_rounded_half_even() {
        let mut acc = Accumulator::default();
        for v in ["1", "2", "4"] {
            acc.add("short", dec(v)).unwrap();
        }
        assert_eq!(acc.count(), 3);
        let avg = acc.finish(&DecimalContext::default());
        assert_eq!(avg.render(2).as_deref(), Some("2.33"));
    }

    #[test]
    fn float_average() {
        let mut acc = Accumulator::default();
        acc.add("tall", NumericValue::Float(1.0)).unwrap();
        acc.add("tall", NumericValue::Float(2.5)).unwrap();
        let avg = acc.finish(&DecimalContext::default());
        assert_eq!(avg, NumericValue::Float(1.75));
    }

    #[test]
    fn absent_values_are_ignored() {
        let mut acc = Accumulator::default();
        acc.add("g", NumericValue::Absent).unwrap();
        assert_eq!(acc, Accumulator::Empty);
        acc.add("g", dec("3")).unwrap();
        acc.add("g", NumericValue::Absent).unwrap();
        assert_eq!(acc.count(), 1);
    }

    #[test]
    fn mixed_types_fail() {
        let mut acc = Accumulator::default();
        acc.add("short", dec("1")).unwrap();
        let err = acc.add("short", NumericValue::Float(1.0)).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::TypeMismatch {
                ref group,
                expected: NumericKind::Decimal,
                found: NumericKind::Float,
            } if group == "short"
        ));
        assert_eq!(acc.kind(), NumericKind::Decimal);
    }

    #[test]
    fn wide_decimals_are_summed_exactly() {
        let mut acc = Accumulator::default();
        acc.add("short", dec("123456789012345678901234567890")).unwrap();
        acc.add("short", dec("2")).unwrap();
        let avg = acc.finish(&DecimalContext::default());
        assert_eq!(
            avg.render(2).as_deref(),
            Some("61728394506172839450617283946.00")
        );
    }

    #[test]
    fn sums_past_machine_range_do_not_overflow() {
        let mut acc = Accumulator::default();
        for _ in 0..4 {
            acc.add("short", dec("50000000000000000000000000000")).unwrap();
        }
        let avg = acc.finish(&DecimalContext::default());
        assert_eq!(
            avg.render(2).as_deref(),
            Some("50000000000000000000000000000.00")
        );
    }

    #[test]
    fn empty_group_is_absent() {
        let avg = Accumulator::default().finish(&DecimalContext::default());
        assert!(avg.is_absent());
    }
}
