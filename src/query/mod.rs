//! Path Selection
//!
//! A compact XPath-style selector over the document arena. It supports the
//! subset of the language the store is built on: absolute and relative
//! location paths, `//`, `.` and `..`, `*`, `node()`, `text()`, attributes,
//! a handful of axes and the predicates `[@a]`, `[@a="v"]` and `[n]`.
//! Results are de-duplicated and returned in document order.

mod parse;

pub use parse::{Axis, NodeTest, PathExpr, Predicate, Step};

use crate::error::ConfError;
use crate::tree::{NodeId, NodeKind, Tree};
use std::collections::{HashMap, HashSet};

/// One member of a selected node set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item {
    /// The virtual document node above the root element
    Document,
    Node(NodeId),
    /// Attribute `key` of the owning element
    Attr(NodeId, String),
}

impl Item {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Item::Node(id) => Some(*id),
            _ => None,
        }
    }
}

/// Evaluates path expressions against one document root
pub struct Selector<'a> {
    tree: &'a Tree,
    root: NodeId,
}

impl<'a> Selector<'a> {
    pub fn new(tree: &'a Tree, root: NodeId) -> Self {
        Self { tree, root }
    }

    /// Evaluate `expr` relative to `ctx` (the document node when `None`).
    pub fn select(&self, ctx: Option<NodeId>, expr: &str) -> Result<Vec<Item>, ConfError> {
        let path = PathExpr::parse(expr)?;
        Ok(self.evaluate(ctx, &path))
    }

    /// Like [`Selector::select`] but keeps element and text nodes only
    pub fn select_nodes(&self, ctx: Option<NodeId>, expr: &str) -> Result<Vec<NodeId>, ConfError> {
        Ok(self
            .select(ctx, expr)?
            .iter()
            .filter_map(Item::node)
            .collect())
    }

    pub fn evaluate(&self, ctx: Option<NodeId>, path: &PathExpr) -> Vec<Item> {
        let start = match ctx {
            Some(id) if !path.absolute => Item::Node(id),
            _ => Item::Document,
        };
        let mut current = vec![start];
        let mut ranks: Option<HashMap<NodeId, usize>> = None;

        for step in &path.steps {
            let mut next = Vec::new();
            for item in &current {
                let mut matched: Vec<Item> = self
                    .axis(item, step.axis)
                    .into_iter()
                    .filter(|candidate| self.matches(candidate, &step.test))
                    .collect();
                for predicate in &step.predicates {
                    matched = self.filter(matched, predicate);
                }
                next.extend(matched);
            }
            if next.len() > 1 {
                let ranks = ranks.get_or_insert_with(|| self.document_ranks());
                current = self.order_unique(next, ranks);
            } else {
                current = next;
            }
        }
        current
    }

    /// String value of a selected item
    pub fn string_value(&self, item: &Item) -> String {
        match item {
            Item::Document => self.tree.text_content(self.root),
            Item::Node(id) => self.tree.text_content(*id),
            Item::Attr(owner, key) => self.tree.attr(*owner, key).unwrap_or_default().to_string(),
        }
    }

    fn parent(&self, item: &Item) -> Option<Item> {
        match item {
            Item::Document => None,
            Item::Node(id) if *id == self.root => Some(Item::Document),
            Item::Node(id) => self.tree.parent(*id).map(Item::Node),
            Item::Attr(owner, _) => Some(Item::Node(*owner)),
        }
    }

    fn children(&self, item: &Item) -> Vec<Item> {
        match item {
            Item::Document => vec![Item::Node(self.root)],
            Item::Node(id) => self.tree.children(*id).iter().map(|c| Item::Node(*c)).collect(),
            Item::Attr(..) => Vec::new(),
        }
    }

    fn descendants(&self, item: &Item, out: &mut Vec<Item>) {
        for child in self.children(item) {
            out.push(child.clone());
            self.descendants(&child, out);
        }
    }

    fn axis(&self, item: &Item, axis: Axis) -> Vec<Item> {
        match axis {
            Axis::Child => self.children(item),
            Axis::SelfAxis => vec![item.clone()],
            Axis::Parent => self.parent(item).into_iter().collect(),
            Axis::Descendant => {
                let mut out = Vec::new();
                self.descendants(item, &mut out);
                out
            }
            Axis::DescendantOrSelf => {
                let mut out = vec![item.clone()];
                self.descendants(item, &mut out);
                out
            }
            Axis::Ancestor | Axis::AncestorOrSelf => {
                let mut out = Vec::new();
                if axis == Axis::AncestorOrSelf {
                    out.push(item.clone());
                }
                let mut current = self.parent(item);
                while let Some(parent) = current {
                    current = self.parent(&parent);
                    out.push(parent);
                }
                out
            }
            Axis::Attribute => match item {
                Item::Node(id) => self
                    .tree
                    .attrs(*id)
                    .map(|attrs| attrs.keys().map(|k| Item::Attr(*id, k.clone())).collect())
                    .unwrap_or_default(),
                _ => Vec::new(),
            },
        }
    }

    fn matches(&self, item: &Item, test: &NodeTest) -> bool {
        match item {
            Item::Document => matches!(test, NodeTest::AnyNode),
            Item::Attr(_, key) => match test {
                NodeTest::Name(name) => key == name,
                NodeTest::AnyElement | NodeTest::AnyNode => true,
                NodeTest::Text => false,
            },
            Item::Node(id) => {
                let Some(node) = self.tree.get(*id) else {
                    return false;
                };
                match test {
                    NodeTest::Name(name) => node.kind == NodeKind::Element && &node.name == name,
                    NodeTest::AnyElement => node.kind == NodeKind::Element,
                    NodeTest::AnyNode => true,
                    NodeTest::Text => node.kind == NodeKind::Text,
                }
            }
        }
    }

    fn filter(&self, items: Vec<Item>, predicate: &Predicate) -> Vec<Item> {
        match predicate {
            Predicate::Position(n) => items.into_iter().nth(n - 1).into_iter().collect(),
            Predicate::HasAttr(key) => items
                .into_iter()
                .filter(|item| match item {
                    Item::Node(id) => self.tree.attr(*id, key).is_some(),
                    _ => false,
                })
                .collect(),
            Predicate::AttrEq(key, value) => items
                .into_iter()
                .filter(|item| match item {
                    Item::Node(id) => self.tree.attr(*id, key) == Some(value.as_str()),
                    _ => false,
                })
                .collect(),
        }
    }

    fn document_ranks(&self) -> HashMap<NodeId, usize> {
        self.tree
            .descendants(self.root)
            .into_iter()
            .enumerate()
            .map(|(rank, id)| (id, rank))
            .collect()
    }

    fn order_unique(&self, items: Vec<Item>, ranks: &HashMap<NodeId, usize>) -> Vec<Item> {
        let mut seen = HashSet::new();
        let mut unique: Vec<Item> = items.into_iter().filter(|i| seen.insert(i.clone())).collect();
        unique.sort_by_key(|item| match item {
            Item::Document => (0, 0),
            Item::Node(id) => (ranks.get(id).map(|r| r + 1).unwrap_or(usize::MAX), 0),
            Item::Attr(owner, key) => {
                let position = self
                    .tree
                    .attrs(*owner)
                    .and_then(|attrs| attrs.get_index_of(key))
                    .unwrap_or(0);
                (
                    ranks.get(owner).map(|r| r + 1).unwrap_or(usize::MAX),
                    position + 1,
                )
            }
        });
        unique
    }
}
