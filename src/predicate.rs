//! The predicate model: node tests, structural (ancestor) tests,
//! preconditions, and processors.
//!
//! Predicates are registered on the grammar by name and referenced by name
//! from rule and leaf declarations; commit time resolves every reference to a
//! callable and checks that the referenced predicate has the right shape for
//! the slot it is used in.

use crate::diag::Diagnostic;
use crate::node::{Node, NodeMut};
use crate::util::HashMap;
use std::collections::BTreeMap;
use std::fmt;

/// Index of a resolved predicate within its kind's table.
pub(crate) type PredicateId = usize;

/// What a test reported about a node or a node pair.
///
/// `Pending` is meaningful only for structural tests, where it means "I
/// cannot decide against this ancestor yet; ask again one level up".  A node
/// test returning it is out of contract and raises
/// [`Diagnostic::UnexpectedTestResult`].
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The test passed.
    Pass,
    /// The test passed, with an extra payload recorded alongside the result.
    PassWith(Value),
    /// The test failed; the node is marked and the failure recorded.
    Fail,
    /// The test failed, with an extra payload recorded alongside the result.
    FailWith(Value),
    /// The test abstains; nothing is recorded.
    Ignore,
    /// A structural test cannot be decided at this ancestor.
    Pending,
}

/// A value that tests may attach to their results and processors may stash
/// in a node's attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered list.
    List(Vec<Value>),
    /// A string-keyed map.
    Map(BTreeMap<String, Value>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

/// The four predicate roles, used to report kind mismatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredicateKind {
    /// A one-argument test of a just-built node.
    NodeTest,
    /// A two-argument test of an ancestor/descendant pair.
    AncestorTest,
    /// A cheap check run before a node is built.
    Precondition,
    /// A side-effecting hook run after a node passes its tests.
    Processor,
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PredicateKind::NodeTest => "node test",
            PredicateKind::AncestorTest => "ancestor test",
            PredicateKind::Precondition => "precondition",
            PredicateKind::Processor => "processor",
        })
    }
}

pub(crate) type NodeTestFn = Box<dyn Fn(&Node<'_>) -> Outcome>;
pub(crate) type AncestorTestFn = Box<dyn Fn(&Node<'_>, &Node<'_>) -> Outcome>;
pub(crate) type PreconditionFn = Box<dyn Fn(&str, usize, usize, &str, &[Node<'_>]) -> bool>;
pub(crate) type ProcessorFn = Box<dyn Fn(&mut NodeMut<'_>)>;

/// The grammar-owned table of registered predicates.
#[derive(Default)]
pub(crate) struct Registry {
    node_tests: Vec<(String, NodeTestFn)>,
    ancestor_tests: Vec<(String, AncestorTestFn)>,
    preconditions: Vec<(String, PreconditionFn)>,
    processors: Vec<(String, ProcessorFn)>,
    index: HashMap<String, (PredicateKind, PredicateId)>,
}

impl Registry {
    /// Registers a node test under `name`, replacing any previous predicate
    /// with that name.
    pub(crate) fn add_node_test(&mut self, name: &str, test: NodeTestFn) {
        let id = self.node_tests.len();
        self.node_tests.push((name.to_string(), test));
        self.index
            .insert(name.to_string(), (PredicateKind::NodeTest, id));
    }

    /// Registers an ancestor test under `name`.
    pub(crate) fn add_ancestor_test(&mut self, name: &str, test: AncestorTestFn) {
        let id = self.ancestor_tests.len();
        self.ancestor_tests.push((name.to_string(), test));
        self.index
            .insert(name.to_string(), (PredicateKind::AncestorTest, id));
    }

    /// Registers a precondition under `name`.
    pub(crate) fn add_precondition(&mut self, name: &str, precondition: PreconditionFn) {
        let id = self.preconditions.len();
        self.preconditions.push((name.to_string(), precondition));
        self.index
            .insert(name.to_string(), (PredicateKind::Precondition, id));
    }

    /// Registers a processor under `name`.
    pub(crate) fn add_processor(&mut self, name: &str, processor: ProcessorFn) {
        let id = self.processors.len();
        self.processors.push((name.to_string(), processor));
        self.index
            .insert(name.to_string(), (PredicateKind::Processor, id));
    }

    /// Resolves a name used in a `tests` slot.  Either test kind is
    /// acceptable there; the two are distinguished by their shape.
    pub(crate) fn resolve_test(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<(PredicateKind, PredicateId), Diagnostic> {
        match self.index.get(name).copied() {
            Some(entry @ ((PredicateKind::NodeTest | PredicateKind::AncestorTest), _)) => {
                Ok(entry)
            }
            Some((found, _)) => Err(Diagnostic::BadArity {
                name: name.to_string(),
                expected: PredicateKind::NodeTest,
                found,
            }),
            None => Err(Diagnostic::UndefinedTest(
                owner.to_string(),
                name.to_string(),
            )),
        }
    }

    /// Resolves a name used in a `preconditions` slot.
    pub(crate) fn resolve_precondition(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<PredicateId, Diagnostic> {
        match self.index.get(name).copied() {
            Some((PredicateKind::Precondition, id)) => Ok(id),
            Some((found, _)) => Err(Diagnostic::BadArity {
                name: name.to_string(),
                expected: PredicateKind::Precondition,
                found,
            }),
            None => Err(Diagnostic::UndefinedPrecondition(
                owner.to_string(),
                name.to_string(),
            )),
        }
    }

    /// Resolves a name used in a `process` slot.
    pub(crate) fn resolve_processor(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<PredicateId, Diagnostic> {
        match self.index.get(name).copied() {
            Some((PredicateKind::Processor, id)) => Ok(id),
            Some((found, _)) => Err(Diagnostic::BadArity {
                name: name.to_string(),
                expected: PredicateKind::Processor,
                found,
            }),
            None => Err(Diagnostic::UndefinedProcessor(
                owner.to_string(),
                name.to_string(),
            )),
        }
    }

    pub(crate) fn node_test_name(&self, id: PredicateId) -> &str {
        &self.node_tests[id].0
    }

    pub(crate) fn ancestor_test_name(&self, id: PredicateId) -> &str {
        &self.ancestor_tests[id].0
    }

    pub(crate) fn run_node_test(&self, id: PredicateId, node: &Node<'_>) -> Outcome {
        (self.node_tests[id].1)(node)
    }

    pub(crate) fn run_ancestor_test(
        &self,
        id: PredicateId,
        ancestor: &Node<'_>,
        descendant: &Node<'_>,
    ) -> Outcome {
        (self.ancestor_tests[id].1)(ancestor, descendant)
    }

    pub(crate) fn run_precondition(
        &self,
        id: PredicateId,
        name: &str,
        start: usize,
        end: usize,
        text: &str,
        children: &[Node<'_>],
    ) -> bool {
        (self.preconditions[id].1)(name, start, end, text, children)
    }

    pub(crate) fn run_processor(&self, id: PredicateId, node: &mut NodeMut<'_>) {
        (self.processors[id].1)(node);
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<T>(v: &[(String, T)]) -> Vec<&str> {
            v.iter().map(|(n, _)| n.as_str()).collect()
        }
        f.debug_struct("Registry")
            .field("node_tests", &names(&self.node_tests))
            .field("ancestor_tests", &names(&self.ancestor_tests))
            .field("preconditions", &names(&self.preconditions))
            .field("processors", &names(&self.processors))
            .finish()
    }
}
