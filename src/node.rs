//! The node data model: spans, positions, attributes, and the borrowing
//! [`Node`] handle exposing the navigation surface over a parse's arena.

use crate::names::Symbol;
use crate::parse::Parse;
use crate::predicate::{PredicateId, Value};
use crate::tree::{NodeId, SiblingIter};
use crate::util::HashMap;
use std::fmt;
use std::sync::Arc;

/// A character range over the input text.  `end` is one past the last byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Index of the first byte of the range.
    pub start: usize,
    /// Index one past the last byte of the range.
    pub end: usize,
}

impl Span {
    /// Coercion from index pairs.
    #[inline]
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    /// Get the length of the span.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.end - self.start
    }

    /// Checks for the zero-length span.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end == self.start
    }

    /// True when `offset` falls inside the span.
    #[inline]
    #[must_use]
    pub const fn contains(self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// The stable public identity of a node: its start offset paired with its
/// height.  Unique within a parse, and preserved by the clone-on-extend
/// machinery, so positions recorded before an extension still resolve in
/// the extended parse.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// The node's start offset.
    pub start: usize,
    /// The node's height (0 for leaves).
    pub height: usize,
}

/// What sort of node this is.  Trash and boundary nodes are
/// non-traversible: they may never become children of another node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum NodeKind {
    /// A leaf span matched by a terminal rule.
    Leaf {
        /// Skipped over by atom matching when true.
        ignorable: bool,
    },
    /// A node built by a reduction, with children.
    Nonterminal,
    /// Characters no terminal rule matched.  Erroneous, and a boundary.
    Trash,
    /// A leaf matched by a boundary terminal.
    Boundary,
}

impl NodeKind {
    pub(crate) fn traversible(self) -> bool {
        !matches!(self, NodeKind::Trash | NodeKind::Boundary)
    }

    pub(crate) fn ignorable(self) -> bool {
        matches!(self, NodeKind::Leaf { ignorable: true })
    }
}

/// A record of a settled node test: the test's name and any extra payload
/// it attached to its verdict.
#[derive(Clone, Debug, PartialEq)]
pub struct TestRecord {
    pub(crate) test: String,
    pub(crate) extra: Option<Value>,
}

impl TestRecord {
    /// The test's registered name.
    #[must_use]
    pub fn test(&self) -> &str {
        &self.test
    }

    /// The extra payload, if the test attached one.
    #[must_use]
    pub fn extra(&self) -> Option<&Value> {
        self.extra.as_ref()
    }
}

/// A record of a settled structural test, kept on both ends of the pair:
/// the ancestor's copy names the descendant's position and vice versa.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuralRecord {
    pub(crate) test: String,
    pub(crate) peer: Position,
    pub(crate) extra: Option<Value>,
}

impl StructuralRecord {
    /// The test's registered name.
    #[must_use]
    pub fn test(&self) -> &str {
        &self.test
    }

    /// The position of the other node of the pair.
    #[must_use]
    pub fn peer(&self) -> Position {
        self.peer
    }

    /// The extra payload, if the test attached one.
    #[must_use]
    pub fn extra(&self) -> Option<&Value> {
        self.extra.as_ref()
    }
}

/// A structural test that has not been settled yet.  It lives on the top
/// of the spine above the descendant it belongs to and is re-evaluated
/// every time that spine gains a new parent.
#[derive(Clone, Debug)]
pub struct PendingTest {
    pub(crate) test: PredicateId,
    pub(crate) name: String,
    pub(crate) descendant: Position,
}

impl PendingTest {
    /// The test's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The position of the node the test belongs to.
    #[must_use]
    pub fn descendant(&self) -> Position {
        self.descendant
    }
}

/// Everything recorded on a node: test verdicts, unresolved structural
/// tests, and the user stash written by processors.
///
/// The engine's own records are read-only from outside; processors may
/// write freely to the stash.
#[derive(Clone, Debug, Default)]
pub struct Attributes {
    pub(crate) satisfied: Vec<TestRecord>,
    pub(crate) failures: Vec<TestRecord>,
    pub(crate) satisfied_ancestor: Vec<StructuralRecord>,
    pub(crate) failed_ancestor: Vec<StructuralRecord>,
    pub(crate) satisfied_descendant: Vec<StructuralRecord>,
    pub(crate) failed_descendant: Vec<StructuralRecord>,
    pub(crate) pending: Vec<PendingTest>,
    pub(crate) stash: HashMap<String, Value>,
}

impl Attributes {
    /// Node tests that passed here.
    #[must_use]
    pub fn satisfied(&self) -> &[TestRecord] {
        &self.satisfied
    }

    /// Node tests that failed here.
    #[must_use]
    pub fn failures(&self) -> &[TestRecord] {
        &self.failures
    }

    /// Structural tests settled as passed, recorded on the ancestor.
    #[must_use]
    pub fn satisfied_ancestor(&self) -> &[StructuralRecord] {
        &self.satisfied_ancestor
    }

    /// Structural tests settled as failed, recorded on the ancestor.
    #[must_use]
    pub fn failed_ancestor(&self) -> &[StructuralRecord] {
        &self.failed_ancestor
    }

    /// Structural tests settled as passed, recorded on the descendant.
    #[must_use]
    pub fn satisfied_descendant(&self) -> &[StructuralRecord] {
        &self.satisfied_descendant
    }

    /// Structural tests settled as failed, recorded on the descendant.
    #[must_use]
    pub fn failed_descendant(&self) -> &[StructuralRecord] {
        &self.failed_descendant
    }

    /// Structural tests still waiting for an ancestor to decide them.
    #[must_use]
    pub fn pending(&self) -> &[PendingTest] {
        &self.pending
    }

    /// Reads a key stashed by a processor.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.stash.get(key)
    }
}

/// The per-node payload stored in a parse's arena.
#[derive(Clone, Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) name: Symbol,
    pub(crate) span: Span,
    pub(crate) failed_test: bool,
    pub(crate) height: usize,
    pub(crate) size: usize,
    pub(crate) summary: Arc<str>,
    pub(crate) attributes: Attributes,
}

/// A borrowed handle on one node of a parse.
///
/// Handles are cheap to copy; all navigation goes through the owning
/// [`Parse`]'s arena.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    pub(crate) parse: &'a Parse,
    pub(crate) id: NodeId,
}

impl<'a> Node<'a> {
    pub(crate) fn data(self) -> &'a NodeData {
        &self.parse.tree[self.id]
    }

    /// The name of the rule or leaf that built this node.
    #[must_use]
    pub fn name(self) -> &'a str {
        self.parse.names.name(self.data().name)
    }

    /// The input characters this node covers.
    #[must_use]
    pub fn text(self) -> &'a str {
        &self.parse.text[self.data().span.start..self.data().span.end]
    }

    /// The input before this node.
    #[must_use]
    pub fn text_before(self) -> &'a str {
        &self.parse.text[..self.data().span.start]
    }

    /// The input after this node.
    #[must_use]
    pub fn text_after(self) -> &'a str {
        &self.parse.text[self.data().span.end..]
    }

    /// The entire input.
    #[must_use]
    pub fn full_text(self) -> &'a str {
        &self.parse.text
    }

    /// Start offset.
    #[must_use]
    pub fn start(self) -> usize {
        self.data().span.start
    }

    /// End offset (one past the last byte).
    #[must_use]
    pub fn end(self) -> usize {
        self.data().span.end
    }

    /// The covered range.
    #[must_use]
    pub fn span(self) -> Span {
        self.data().span
    }

    /// 0 for a leaf, one more than the first child otherwise.
    #[must_use]
    pub fn height(self) -> usize {
        self.data().height
    }

    /// Number of ancestors above this node.
    #[must_use]
    pub fn depth(self) -> usize {
        self.ancestors().count()
    }

    /// The stable `(start, height)` identity of this node.
    #[must_use]
    pub fn position(self) -> Position {
        Position {
            start: self.data().span.start,
            height: self.data().height,
        }
    }

    /// Number of nodes in this subtree, this node included.
    #[must_use]
    pub fn size(self) -> usize {
        self.data().size
    }

    /// The canonical string form of this subtree.
    #[must_use]
    pub fn summary(self) -> &'a str {
        &self.data().summary
    }

    /// The node this one is a child of, if any.
    #[must_use]
    pub fn parent(self) -> Option<Node<'a>> {
        self.parse.tree.parent(self.id).map(|id| Node {
            parse: self.parse,
            id,
        })
    }

    /// The top of this node's ancestor chain (itself, for a root).
    #[must_use]
    pub fn root(self) -> Node<'a> {
        self.ancestors().last().unwrap_or(self)
    }

    /// This node's children, left to right.  Empty for leaves.
    #[must_use]
    pub fn children(self) -> Children<'a> {
        Children {
            parse: self.parse,
            iter: self.parse.tree.children_iter(self.id),
        }
    }

    /// This node's ancestors, nearest first.
    #[must_use]
    pub fn ancestors(self) -> Ancestors<'a> {
        Ancestors {
            parse: self.parse,
            current: self.parse.tree.parent(self.id),
        }
    }

    /// This subtree in document order, this node first.
    #[must_use]
    pub fn subtree(self) -> Subtree<'a> {
        Subtree {
            parse: self.parse,
            stack: vec![self.id],
        }
    }

    /// Every node below this one, in document order.
    pub fn descendants(self) -> impl Iterator<Item = Node<'a>> + 'a {
        self.subtree().skip(1)
    }

    /// The leaves of this subtree, left to right.
    pub fn leaves(self) -> impl Iterator<Item = Node<'a>> + 'a {
        self.subtree().filter(|node| !node.is_nonterminal())
    }

    /// Every node of the parse that ends at or before this node starts, in
    /// document order.
    pub fn prior(self) -> impl Iterator<Item = Node<'a>> + 'a {
        let start = self.start();
        self.parse.nodes().filter(move |node| node.end() <= start)
    }

    /// Every node of the parse that starts at or after this node ends, in
    /// document order.
    pub fn later(self) -> impl Iterator<Item = Node<'a>> + 'a {
        let end = self.end();
        self.parse.nodes().filter(move |node| node.start() >= end)
    }

    /// The children of this node's parent, or the parse's roots for a
    /// root node.  Includes this node itself.
    #[must_use]
    pub fn siblings(self) -> Vec<Node<'a>> {
        match self.parent() {
            Some(parent) => parent.children().collect(),
            None => self.parse.roots().collect(),
        }
    }

    /// Siblings strictly before this node.
    #[must_use]
    pub fn prior_siblings(self) -> Vec<Node<'a>> {
        let mut siblings = self.siblings();
        siblings.truncate(self.sibling_index());
        siblings
    }

    /// Siblings strictly after this node.
    #[must_use]
    pub fn later_siblings(self) -> Vec<Node<'a>> {
        let mut siblings = self.siblings();
        siblings.split_off(self.sibling_index() + 1)
    }

    /// This node's index among its siblings.
    #[must_use]
    pub fn sibling_index(self) -> usize {
        self.siblings()
            .iter()
            .position(|sibling| sibling.id == self.id)
            .unwrap_or(0)
    }

    /// True when no sibling precedes this node.
    #[must_use]
    pub fn is_first_child(self) -> bool {
        self.sibling_index() == 0
    }

    /// True when no sibling follows this node.
    #[must_use]
    pub fn is_last_child(self) -> bool {
        self.sibling_index() + 1 == self.siblings().len()
    }

    /// True when `offset` falls inside this node's span.
    #[must_use]
    pub fn contains(self, offset: usize) -> bool {
        self.data().span.contains(offset)
    }

    /// Finds the node at `position` within this subtree.
    #[must_use]
    pub fn find(self, position: Position) -> Option<Node<'a>> {
        self.subtree().find(|node| node.position() == position)
    }

    /// True for leaf spans, boundaries and trash: anything without
    /// children.
    #[must_use]
    pub fn is_leaf(self) -> bool {
        !self.is_nonterminal()
    }

    /// True for nodes built by a reduction.
    #[must_use]
    pub fn is_nonterminal(self) -> bool {
        self.data().kind == NodeKind::Nonterminal
    }

    /// True for leaves whose terminal rule is ignorable.
    #[must_use]
    pub fn is_ignorable(self) -> bool {
        self.data().kind.ignorable()
    }

    /// True for everything except ignorable leaves, trash, and boundaries.
    #[must_use]
    pub fn is_significant(self) -> bool {
        self.data().kind.traversible() && !self.is_ignorable()
    }

    /// True for trash nodes.
    #[must_use]
    pub fn is_trash(self) -> bool {
        self.data().kind == NodeKind::Trash
    }

    /// True for boundary nodes, which are boundary leaves and trash.
    #[must_use]
    pub fn is_boundary(self) -> bool {
        !self.data().kind.traversible()
    }

    /// True for erroneous nodes (currently only trash).
    #[must_use]
    pub fn is_error(self) -> bool {
        self.is_trash()
    }

    /// True when a node test or a structural test failed on this node.
    #[must_use]
    pub fn failed_test(self) -> bool {
        self.data().failed_test
    }

    /// True when structural tests are still unresolved at this node.
    #[must_use]
    pub fn has_pending_tests(self) -> bool {
        !self.data().attributes.pending.is_empty()
    }

    /// Everything recorded on this node.
    #[must_use]
    pub fn attributes(self) -> &'a Attributes {
        &self.data().attributes
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.parse, other.parse) && self.id == other.id
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name())
            .field("span", &self.span())
            .field("summary", &self.summary())
            .finish()
    }
}

/// A mutable handle passed to processors; reads like [`Node`], writes only
/// to the attribute stash.
#[derive(Debug)]
pub struct NodeMut<'a> {
    pub(crate) parse: &'a mut Parse,
    pub(crate) id: NodeId,
}

impl NodeMut<'_> {
    /// A read-only view of the same node.
    #[must_use]
    pub fn node(&self) -> Node<'_> {
        Node {
            parse: self.parse,
            id: self.id,
        }
    }

    /// Reads a stashed key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.parse.tree[self.id].attributes.stash.get(key)
    }

    /// Stashes a value under `key`.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.parse.tree[self.id]
            .attributes
            .stash
            .insert(key.to_string(), value.into());
    }

    /// Removes a stashed key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.parse.tree[self.id].attributes.stash.remove(key)
    }
}

/// Iterator over a node's children.
#[derive(Debug)]
pub struct Children<'a> {
    parse: &'a Parse,
    iter: SiblingIter<'a, NodeData>,
}

impl<'a> Iterator for Children<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|id| Node {
            parse: self.parse,
            id,
        })
    }
}

/// Iterator up a node's ancestor chain.
#[derive(Debug)]
pub struct Ancestors<'a> {
    parse: &'a Parse,
    current: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.parse.tree.parent(id);
        Some(Node {
            parse: self.parse,
            id,
        })
    }
}

/// Pre-order iterator over a subtree.
#[derive(Debug)]
pub struct Subtree<'a> {
    parse: &'a Parse,
    stack: Vec<NodeId>,
}

impl<'a> Subtree<'a> {
    pub(crate) fn over(parse: &'a Parse, roots: &[NodeId]) -> Subtree<'a> {
        let mut stack: Vec<NodeId> = roots.to_vec();
        stack.reverse();
        Subtree { parse, stack }
    }
}

impl<'a> Iterator for Subtree<'a> {
    type Item = Node<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let children: Vec<NodeId> = self.parse.tree.children_iter(id).collect();
        self.stack.extend(children.into_iter().rev());
        Some(Node {
            parse: self.parse,
            id,
        })
    }
}
