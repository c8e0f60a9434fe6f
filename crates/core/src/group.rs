//! Group keys and the taxonomy that maps document section names onto them.

use std::fmt;

use crate::entity::EntityName;

/// Identity + display contract for anything that can name a group.
pub trait GroupKey: fmt::Display + Clone + Send + Sync + 'static {
    /// Stable identifier; groups with equal ids are the same group.
    fn id(&self) -> String {
        self.to_string()
    }

    /// `false` for the taxonomy's "unclassified" zero value.
    fn is_classified(&self) -> bool {
        true
    }
}

impl GroupKey for String {}

/// Maps the key that opens a top-level section onto a group.
pub trait Taxonomy: Send + Sync + 'static {
    type Group: GroupKey;

    /// Case-insensitive lookup; unknown keys map to the unclassified group.
    fn classify(&self, key: &str) -> Self::Group;

    /// The zero value used outside any recognized section.
    fn unclassified(&self) -> Self::Group;
}

/// The two-level tree-size taxonomy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TreeSize {
    #[default]
    Unclassified,
    Short,
    Tall,
}

impl TreeSize {
    pub fn parse(key: &str) -> Self {
        let key = key.trim();
        if key.eq_ignore_ascii_case("short") {
            Self::Short
        } else if key.eq_ignore_ascii_case("tall") {
            Self::Tall
        } else {
            Self::Unclassified
        }
    }
}

impl fmt::Display for TreeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => write!(f, "unclassified"),
            Self::Short => write!(f, "short"),
            Self::Tall => write!(f, "tall"),
        }
    }
}

impl GroupKey for TreeSize {
    fn is_classified(&self) -> bool {
        *self != Self::Unclassified
    }
}

/// [`Taxonomy`] over [`TreeSize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSizes;

impl Taxonomy for TreeSizes {
    type Group = TreeSize;

    fn classify(&self, key: &str) -> TreeSize {
        TreeSize::parse(key)
    }

    fn unclassified(&self) -> TreeSize {
        TreeSize::Unclassified
    }
}

/// One item produced by the group classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupItem<G> {
    /// A recognized top-level section opened; the group exists even if no
    /// member follows.
    Section(G),
    /// An entity classified into a group.
    Member { group: G, entity: EntityName },
}

impl<G: GroupKey> GroupItem<G> {
    pub fn member(group: G, entity: impl Into<EntityName>) -> Self {
        Self::Member {
            group,
            entity: entity.into(),
        }
    }

    pub fn group(&self) -> &G {
        match self {
            Self::Section(group) | Self::Member { group, .. } => group,
        }
    }
}
