//! Result rows and their JSON / text renderings.

use serde::{Serialize, Serializer};
use treeprice_core::NumericValue;

/// The average of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAverage {
    pub group: String,
    pub average: NumericValue,
    /// Fractional digits used when rendering.
    pub scale: u32,
}

impl GroupAverage {
    pub fn new(group: impl Into<String>, average: NumericValue, scale: u32) -> Self {
        Self {
            group: group.into(),
            average,
            scale,
        }
    }

    /// Average as a fixed-scale string, `None` for a group without values.
    pub fn rendered(&self) -> Option<String> {
        self.average.render(self.scale)
    }
}

#[derive(Serialize)]
struct Row<'a> {
    group: &'a str,
    average: Option<String>,
}

impl Serialize for GroupAverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Row {
            group: &self.group,
            average: self.rendered(),
        }
        .serialize(serializer)
    }
}

/// `[{"group": "short", "average": "15.00"}, {"group": "tall", "average": null}]`
pub fn to_json(averages: &[GroupAverage]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(averages)
}

/// One `group: average` line per group; groups without values show `-`.
pub fn to_text(averages: &[GroupAverage]) -> String {
    let width = averages.iter().map(|a| a.group.len()).max().unwrap_or(0);
    let mut out = String::new();
    for avg in averages {
        let value = avg.rendered().unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{:<width$}  {}\n", avg.group, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeprice_core::NumericMode;

    fn rows() -> Vec<GroupAverage> {
        let fifteen = NumericValue::parse("15", NumericMode::Decimal).unwrap();
        vec![
            GroupAverage::new("short", fifteen, 2),
            GroupAverage::new("tall", NumericValue::Absent, 2),
        ]
    }

    #[test]
    fn json_uses_null_for_absent() {
        let json: serde_json::Value = serde_json::from_str(&to_json(&rows()).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"group": "short", "average": "15.00"},
                {"group": "tall", "average": null},
            ])
        );
    }

    #[test]
    fn empty_list_is_empty_array() {
        assert_eq!(to_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn text_is_aligned() {
        assert_eq!(to_text(&rows()), "short  15.00\ntall   -\n");
    }

    #[test]
    fn floats_render_at_scale() {
        let row = GroupAverage::new("g", NumericValue::Float(2.5), 2);
        assert_eq!(row.rendered().as_deref(), Some("2.50"));
    }
}
