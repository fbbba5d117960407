//! `Parse` stores one forest over the input: an arena of nodes plus the
//! ordered roots covering the text.
//!
//! Parses are never mutated by the search; every reduction clones the arena
//! and splices the new node over its children's root slots, so node
//! positions, memoized sizes and summaries all survive unchanged in the
//! parent parse.

use crate::diag::Diagnostic;
use crate::grammar::Grammar;
use crate::names::NameTable;
use crate::node::{
    Attributes, Node, NodeData, NodeKind, NodeMut, PendingTest, Position, Span,
    StructuralRecord, Subtree, TestRecord,
};
use crate::predicate::{Outcome, PredicateId, Value};
use crate::rule::{LeafId, RuleId};
use crate::tree::{NodeId, Tree};
use itertools::Itertools;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// An ordered forest of nodes covering a stretch of input, with memoized
/// counters used by the dominance filter.
#[derive(Clone, Debug)]
pub struct Parse {
    pub(crate) tree: Tree<NodeData>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) text: Arc<str>,
    pub(crate) names: Arc<NameTable>,
    pub(crate) summary: String,
    pub(crate) incorrectness: usize,
    pub(crate) pending: usize,
}

fn extra_of(outcome: Outcome) -> Option<Value> {
    match outcome {
        Outcome::PassWith(value) | Outcome::FailWith(value) => Some(value),
        _ => None,
    }
}

impl Parse {
    pub(crate) fn empty(text: Arc<str>, names: Arc<NameTable>) -> Parse {
        Parse {
            tree: Tree::default(),
            roots: vec![],
            text,
            names,
            summary: String::new(),
            incorrectness: 0,
            pending: 0,
        }
    }

    /// The input this parse covers a stretch of.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The canonical string form: root summaries joined with `;`.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Number of roots.
    #[must_use]
    pub fn length(&self) -> usize {
        self.roots.len()
    }

    /// Total number of nodes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.roots.iter().map(|&root| self.tree[root].size).sum()
    }

    /// Number of roots that are erroneous: trash, or marked by a failed
    /// test.
    #[must_use]
    pub fn incorrectness_count(&self) -> usize {
        self.incorrectness
    }

    /// Number of roots with structural tests still unresolved.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
    }

    /// True when any root is erroneous.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.incorrectness > 0
    }

    /// True when nothing is erroneous and nothing is pending.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.has_errors() && self.pending == 0
    }

    /// The negation of [`Parse::is_success`].
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// The root nodes, left to right.
    pub fn roots(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        self.roots.iter().map(move |&id| Node { parse: self, id })
    }

    /// Every node of the forest in document order.
    #[must_use]
    pub fn nodes(&self) -> Subtree<'_> {
        Subtree::over(self, &self.roots)
    }

    /// Finds the node with the given stable position, if any.
    #[must_use]
    pub fn get(&self, position: Position) -> Option<Node<'_>> {
        self.nodes().find(|node| node.position() == position)
    }

    pub(crate) fn node(&self, id: NodeId) -> Node<'_> {
        Node { parse: self, id }
    }

    /// Appends a leaf root matched by `leaf_id` over `span`, running its
    /// node tests and seeding its structural tests.
    pub(crate) fn push_leaf(
        &mut self,
        grammar: &Grammar,
        leaf_id: LeafId,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let leaf = grammar.leaf_by_id(leaf_id);
        let kind = if leaf.boundary {
            NodeKind::Boundary
        } else {
            NodeKind::Leaf {
                ignorable: leaf.ignorable,
            }
        };
        let name = leaf.name;
        let data = NodeData {
            kind,
            name,
            span,
            failed_test: false,
            height: 0,
            size: 1,
            summary: Arc::from(grammar.name_of(name)),
            attributes: Attributes::default(),
        };
        let id = self.tree.add_node(data, &[]);
        self.roots.push(id);
        if !self.summary.is_empty() {
            self.summary.push(';');
        }
        self.summary.push_str(grammar.name_of(name));
        let predicates = &grammar.leaf_by_id(leaf_id).predicates;
        self.run_node_tests(id, &predicates.node_tests, grammar)?;
        self.seed_pending(id, &predicates.ancestor_tests, grammar);
        self.run_processor(id, predicates.process, grammar);
        self.recount();
        Ok(())
    }

    /// Appends a trash root boxing the unmatched characters of `span`.
    pub(crate) fn push_trash(&mut self, grammar: &Grammar, span: Span) {
        let name = grammar.trash_symbol();
        let data = NodeData {
            kind: NodeKind::Trash,
            name,
            span,
            failed_test: false,
            height: 0,
            size: 1,
            summary: Arc::from(grammar.name_of(name)),
            attributes: Attributes::default(),
        };
        let id = self.tree.add_node(data, &[]);
        self.roots.push(id);
        if !self.summary.is_empty() {
            self.summary.push(';');
        }
        self.summary.push_str(grammar.name_of(name));
        self.recount();
    }

    /// The summary this parse would have after reducing roots `i..j` by
    /// `rule`, computed without cloning anything.
    pub(crate) fn candidate_summary(
        &self,
        grammar: &Grammar,
        i: usize,
        j: usize,
        rule: RuleId,
    ) -> String {
        let mut out = String::new();
        for &root in &self.roots[..i] {
            out.push_str(&self.tree[root].summary);
            out.push(';');
        }
        out.push_str(grammar.name_of(grammar.rule_by_id(rule).name));
        out.push('[');
        out.push_str(
            &self.roots[i..j]
                .iter()
                .map(|&root| &*self.tree[root].summary)
                .join(","),
        );
        out.push(']');
        for &root in &self.roots[j..] {
            out.push(';');
            out.push_str(&self.tree[root].summary);
        }
        out
    }

    /// Builds the parse extending this one by reducing roots `i..j` to a new
    /// node under `rule`.  Returns `None` when the unary-branch check
    /// refuses the node.  The caller supplies the precomputed summary.
    pub(crate) fn add(
        &self,
        i: usize,
        j: usize,
        rule_id: RuleId,
        grammar: &Grammar,
        summary: &str,
    ) -> Result<Option<Parse>, Diagnostic> {
        let rule = grammar.rule_by_id(rule_id);
        let mut next = self.clone();
        let children: Vec<NodeId> = next.roots[i..j].to_vec();
        if grammar.unary_branch_check() && children.len() == 1 {
            let mut current = children[0];
            loop {
                let data = &next.tree[current];
                if data.name == rule.name {
                    return Ok(None);
                }
                if data.kind == NodeKind::Nonterminal && next.tree.child_count(current) == 1 {
                    current = next
                        .tree
                        .first_child(current)
                        .expect("a single-child node has a first child");
                } else {
                    break;
                }
            }
        }
        let span = Span::new(
            next.tree[children[0]].span.start,
            next.tree[children[children.len() - 1]].span.end,
        );
        let height = 1 + next.tree[children[0]].height;
        let size = 1 + children.iter().map(|&c| next.tree[c].size).sum::<usize>();
        let node_summary: Arc<str> = {
            let mut text = String::from(grammar.name_of(rule.name));
            text.push('[');
            for (index, &child) in children.iter().enumerate() {
                if index > 0 {
                    text.push(',');
                }
                text.push_str(&next.tree[child].summary);
            }
            text.push(']');
            Arc::from(text)
        };
        let data = NodeData {
            kind: NodeKind::Nonterminal,
            name: rule.name,
            span,
            failed_test: false,
            height,
            size,
            summary: node_summary,
            attributes: Attributes::default(),
        };
        let id = next.tree.add_node(data, &children);
        next.roots.splice(i..j, [id]);
        next.summary = summary.to_string();
        next.run_node_tests(id, &rule.predicates.node_tests, grammar)?;
        let mut inherited: Vec<PendingTest> = vec![];
        for &child in &children {
            inherited.append(&mut std::mem::take(
                &mut next.tree[child].attributes.pending,
            ));
        }
        let parent_position = Position {
            start: span.start,
            height,
        };
        let mut still_pending = vec![];
        for entry in inherited {
            let Some(descendant) = next.node(id).find(entry.descendant).map(|node| node.id)
            else {
                debug_assert!(false, "a migrated position resolves in the new subtree");
                continue;
            };
            let outcome = {
                let ancestor_view = Node { parse: &next, id };
                let descendant_view = Node {
                    parse: &next,
                    id: descendant,
                };
                grammar
                    .registry()
                    .run_ancestor_test(entry.test, &ancestor_view, &descendant_view)
            };
            match outcome {
                Outcome::Pending => still_pending.push(entry),
                Outcome::Ignore => {}
                Outcome::Pass | Outcome::PassWith(_) => {
                    let extra = extra_of(outcome);
                    next.tree[id]
                        .attributes
                        .satisfied_ancestor
                        .push(StructuralRecord {
                            test: entry.name.clone(),
                            peer: entry.descendant,
                            extra: extra.clone(),
                        });
                    next.tree[descendant]
                        .attributes
                        .satisfied_descendant
                        .push(StructuralRecord {
                            test: entry.name,
                            peer: parent_position,
                            extra,
                        });
                }
                Outcome::Fail | Outcome::FailWith(_) => {
                    let extra = extra_of(outcome);
                    next.tree[id]
                        .attributes
                        .failed_ancestor
                        .push(StructuralRecord {
                            test: entry.name.clone(),
                            peer: entry.descendant,
                            extra: extra.clone(),
                        });
                    next.tree[id].failed_test = true;
                    next.tree[descendant]
                        .attributes
                        .failed_descendant
                        .push(StructuralRecord {
                            test: entry.name,
                            peer: parent_position,
                            extra,
                        });
                    next.tree[descendant].failed_test = true;
                }
            }
        }
        next.tree[id].attributes.pending = still_pending;
        next.seed_pending(id, &rule.predicates.ancestor_tests, grammar);
        next.run_processor(id, rule.predicates.process, grammar);
        next.recount();
        Ok(Some(next))
    }

    /// Extracts the sub-forest of roots `range` into a fresh parse.
    pub(crate) fn slice_roots(&self, range: Range<usize>) -> Parse {
        let mut tree = Tree::default();
        let mut roots = vec![];
        for &root in &self.roots[range] {
            roots.push(self.tree.copy_subtree(root, &mut tree));
        }
        let mut out = Parse {
            tree,
            roots,
            text: self.text.clone(),
            names: self.names.clone(),
            summary: String::new(),
            incorrectness: 0,
            pending: 0,
        };
        out.rebuild_summary();
        out.recount();
        out
    }

    /// Joins two adjacent parses into one by concatenating their forests.
    pub(crate) fn concat(&self, other: &Parse) -> Parse {
        let mut out = self.clone();
        let offset = out.tree.graft(&other.tree);
        out.roots.extend(other.roots.iter().map(|&root| root + offset));
        out.rebuild_summary();
        out.recount();
        out
    }

    fn rebuild_summary(&mut self) {
        self.summary = self
            .roots
            .iter()
            .map(|&root| &*self.tree[root].summary)
            .join(";");
    }

    pub(crate) fn recount(&mut self) {
        self.incorrectness = self
            .roots
            .iter()
            .filter(|&&root| {
                let data = &self.tree[root];
                data.failed_test || data.kind == NodeKind::Trash
            })
            .count();
        self.pending = self
            .roots
            .iter()
            .filter(|&&root| !self.tree[root].attributes.pending.is_empty())
            .count();
    }

    fn run_node_tests(
        &mut self,
        id: NodeId,
        tests: &[PredicateId],
        grammar: &Grammar,
    ) -> Result<(), Diagnostic> {
        for &test in tests {
            let outcome = {
                let view = Node { parse: self, id };
                grammar.registry().run_node_test(test, &view)
            };
            let name = grammar.registry().node_test_name(test).to_string();
            let data = &mut self.tree[id];
            match outcome {
                Outcome::Pass | Outcome::PassWith(_) => data.attributes.satisfied.push(TestRecord {
                    test: name,
                    extra: extra_of(outcome),
                }),
                Outcome::Fail | Outcome::FailWith(_) => {
                    data.attributes.failures.push(TestRecord {
                        test: name,
                        extra: extra_of(outcome),
                    });
                    data.failed_test = true;
                    break;
                }
                Outcome::Ignore => {}
                Outcome::Pending => {
                    return Err(Diagnostic::UnexpectedTestResult(
                        name,
                        "a node test may not return Pending".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn seed_pending(&mut self, id: NodeId, tests: &[PredicateId], grammar: &Grammar) {
        let position = self.node(id).position();
        for &test in tests {
            let name = grammar.registry().ancestor_test_name(test).to_string();
            self.tree[id].attributes.pending.push(PendingTest {
                test,
                name,
                descendant: position,
            });
        }
    }

    fn run_processor(&mut self, id: NodeId, process: Option<PredicateId>, grammar: &Grammar) {
        if let Some(processor) = process {
            if !self.tree[id].failed_test {
                let mut handle = NodeMut { parse: self, id };
                grammar.registry().run_processor(processor, &mut handle);
            }
        }
    }
}

impl fmt::Display for Parse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}
