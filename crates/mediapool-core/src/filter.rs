//! Filter rules and groups evaluated against single items.
//!
//! Rules inside a group, and groups inside a filter, are combined left to
//! right the way a chain of `&&` / `||` short-circuits:
//!
//! - an `and` entry that comes out false fails the whole chain at once;
//! - an `or` entry that comes out true passes the whole chain at once;
//! - a false `or` entry clears the running result, which is what the chain
//!   returns if it reaches the end without an early exit.
//!
//! An empty chain passes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::id::TagId;
use crate::item::{Item, Original};
use crate::value::AttributeValue;

/// How an entry joins the chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// Arbitrary predicate for callers whose condition has no dedicated rule.
#[derive(Clone)]
pub struct ItemPredicate(Arc<dyn Fn(&Item) -> bool + Send + Sync>);

impl ItemPredicate {
    pub fn new(f: impl Fn(&Item) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl fmt::Debug for ItemPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ItemPredicate(..)")
    }
}

/// What a rule tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleKind {
    /// Case-insensitive substring of the title.
    TitleContains(String),
    HasTag(TagId),
    EmptyTags,
    /// Item holds a children list in `original`.
    MultiChildParent,
    /// Item has a parent.
    Child,
    EmptyReleaseDate,
    AttributeEquals { key: String, value: AttributeValue },
    #[serde(skip)]
    Custom(ItemPredicate),
}

impl RuleKind {
    fn test(&self, item: &Item) -> bool {
        match self {
            RuleKind::TitleContains(needle) => item
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            RuleKind::HasTag(tag) => item.tags.contains(tag),
            RuleKind::EmptyTags => item.tags.is_empty(),
            RuleKind::MultiChildParent => matches!(item.original, Some(Original::Children(_))),
            RuleKind::Child => item.parent.is_some(),
            RuleKind::EmptyReleaseDate => item.release_date.is_none(),
            RuleKind::AttributeEquals { key, value } => item.attributes.get(key) == Some(value),
            RuleKind::Custom(predicate) => (predicate.0)(item),
        }
    }
}

/// A single predicate with its negation flag and chain logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub logic: Logic,
}

impl FilterRule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            invert: false,
            logic: Logic::And,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }

    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = logic;
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.kind.test(item) != self.invert
    }
}

/// An ordered list of rules, itself an entry in the outer chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterGroup {
    pub rules: Vec<FilterRule>,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub logic: Logic,
}

impl FilterGroup {
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self {
            rules,
            invert: false,
            logic: Logic::And,
        }
    }

    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = logic;
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        chain(&self.rules, |rule| (rule.matches(item), rule.logic)) != self.invert
    }
}

/// Evaluate a list of groups against an item.
pub fn groups_match(groups: &[FilterGroup], item: &Item) -> bool {
    chain(groups, |group| (group.matches(item), group.logic))
}

fn chain<T>(entries: &[T], eval: impl Fn(&T) -> (bool, Logic)) -> bool {
    let mut any = true;
    for entry in entries {
        match eval(entry) {
            (false, Logic::And) => return false,
            (true, Logic::Or) => return true,
            (false, Logic::Or) => any = false,
            (true, Logic::And) => {}
        }
    }
    any
}
