//! Arena-backed concrete syntax tree.
//!
//! The grammar collaborator parses source text into this tree; dispatch
//! keys every per-node table on the arena index, so a node is evaluated
//! against all of its candidate patterns together, exactly once.

use crate::lines::LineColumn;

/// Arena index of a node. Ordered, so candidate aggregation stays
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// One node's data. `prefix` is the leading whitespace/comment text the
/// tokenizer attached to the node's first token; `text` is the token text
/// for leaves and empty for interior nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    kind: String,
    start: LineColumn,
    prefix: String,
    text: String,
}

impl Node {
    pub fn new(kind: impl Into<String>, start: LineColumn) -> Self {
        Self {
            kind: kind.into(),
            start,
            prefix: String::new(),
            text: String::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn start(&self) -> LineColumn {
        self.start
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parse tree whose nodes live in one arena. Node ids are only
/// meaningful for the tree that issued them.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    entries: Vec<Entry>,
}

impl SyntaxTree {
    pub fn new(root: Node) -> Self {
        Self {
            entries: vec![Entry {
                node: root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a node under `parent`, returning its id. Children keep
    /// insertion order, which is source order for a parser building
    /// left-to-right.
    pub fn push(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = NodeId(self.entries.len());
        self.entries.push(Entry {
            node,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.entries[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.entries[id.0].node
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entries[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entries[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Depth-first pre-order traversal from the root. This is the order
    /// diagnostics are emitted in.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root()],
        }
    }
}

pub struct PreOrder<'a> {
    tree: &'a SyntaxTree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        for &child in self.tree.children(id).iter().rev() {
            self.stack.push(child);
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SyntaxTree {
        let mut tree = SyntaxTree::new(Node::new("file", LineColumn::new(1, 0)));
        let stmt = tree.push(tree.root(), Node::new("expr_stmt", LineColumn::new(1, 0)));
        tree.push(stmt, Node::new("name", LineColumn::new(1, 0)).with_text("x"));
        tree.push(stmt, Node::new("op", LineColumn::new(1, 1)).with_text("="));
        tree.push(
            tree.root(),
            Node::new("endmarker", LineColumn::new(2, 0)),
        );
        tree
    }

    #[test]
    fn pre_order_visits_parents_before_children() {
        let tree = sample();
        let kinds: Vec<_> = tree
            .pre_order()
            .map(|id| tree.node(id).kind().to_string())
            .collect();
        assert_eq!(kinds, ["file", "expr_stmt", "name", "op", "endmarker"]);
    }

    #[test]
    fn parent_and_children_are_linked() {
        let tree = sample();
        let root = tree.root();
        assert_eq!(tree.parent(root), None);
        let stmt = tree.children(root)[0];
        assert_eq!(tree.parent(stmt), Some(root));
        assert_eq!(tree.children(stmt).len(), 2);
    }
}
