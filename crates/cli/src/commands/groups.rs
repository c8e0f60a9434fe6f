//! `treeprice groups` — List every group with the streets classified into it.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use treeprice_config::AppConfig;
use treeprice_core::{GroupItem, GroupKey, TreeSizes};
use treeprice_groupify::GroupClassifier;
use treeprice_streams::JsonTokenStream;

/// Members per group, groups in discovery order, members in document order.
pub type Listing = Vec<(String, Vec<String>)>;

pub async fn run(
    config: AppConfig,
    trees: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = trees.unwrap_or(config.input.trees);
    let tokens = JsonTokenStream::open(&path)
        .await
        .map_err(|e| format!("Failed to open trees file {}: {e}", path.display()))?;
    let items = GroupClassifier::new(tokens, TreeSizes)
        .collect(&CancellationToken::new())
        .await?;

    print!("{}", render(&listing(items)));
    Ok(())
}

pub fn listing<G: GroupKey>(items: Vec<GroupItem<G>>) -> Listing {
    let mut groups: Listing = Vec::new();
    for item in items {
        let id = item.group().id();
        let slot = match groups.iter().position(|(name, _)| *name == id) {
            Some(slot) => slot,
            None => {
                groups.push((id, Vec::new()));
                groups.len() - 1
            }
        };
        if let GroupItem::Member { entity, .. } = item {
            groups[slot].1.push(entity.to_string());
        }
    }
    groups
}

pub fn render(groups: &Listing) -> String {
    let mut out = String::new();
    for (group, members) in groups {
        out.push_str(&format!("\n--- {group} ({}) ---\n", members.len()));
        if members.is_empty() {
            out.push_str("(none)\n");
        }
        for member in members {
            out.push_str(member);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeprice_core::TreeSize;

    #[test]
    fn groups_members_in_discovery_order() {
        let groups = listing(vec![
            GroupItem::Section(TreeSize::Tall),
            GroupItem::member(TreeSize::Tall, "elm road"),
            GroupItem::member(TreeSize::Unclassified, "stray"),
            GroupItem::Section(TreeSize::Short),
            GroupItem::member(TreeSize::Tall, "ash road"),
        ]);
        assert_eq!(
            groups,
            vec![
                ("tall".to_string(), vec!["elm road".to_string(), "ash road".to_string()]),
                ("unclassified".to_string(), vec!["stray".to_string()]),
                ("short".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn renders_empty_groups() {
        let text = render(&vec![("short".to_string(), vec![])]);
        assert_eq!(text, "\n--- short (0) ---\n(none)\n");
    }
}
