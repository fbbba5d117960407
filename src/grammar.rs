//! The grammar: declaration surface, commit-time validation, and the parse
//! entry points driving the segment search.
//!
//! A grammar is built up by declaring rules, leaves, and predicates, then
//! frozen by its first parse.  Commit validates the whole declaration set
//! (symbol completeness, predicate resolution, empty-consumption and unary
//! loop analysis), computes the starter index, and snapshots the name
//! table for sharing with parses.

use crate::diag::Diagnostic;
use crate::hopper::Filter;
use crate::lex;
use crate::loopck;
use crate::names::{NameTable, Symbol};
use crate::node::{Node, NodeMut};
use crate::parse::Parse;
use crate::predicate::{Outcome, Registry};
use crate::rule::{
    self, Atom, AtomId, Leaf, LeafId, PredicateSet, Rule, RuleBody, RuleId,
};
use crate::segment::Segmentation;
use crate::util::HashMap;
use itertools::Itertools;
use log::debug;
use regex::Regex;
use std::cmp::Reverse;
use std::sync::Arc;

/// Predicate attachments for a rule or leaf declaration, all referenced by
/// registered name.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleOptions<'a> {
    /// Node and structural tests, distinguished by their registered shape.
    pub tests: &'a [&'a str],
    /// Preconditions, run before a node is built.
    pub preconditions: &'a [&'a str],
    /// A processor, run after the node passes its tests.
    pub process: Option<&'a str>,
}

/// Knobs of a parse invocation.
#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// The dominance filter stack, applied in order.  Empty disables
    /// dominance, returning every completed parse.
    pub filters: Vec<Filter>,
    /// Stop once this many tied-best parses are available.  `None` drives
    /// every segment to exhaustion.
    pub n: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            filters: Filter::default_filters(),
            n: None,
        }
    }
}

/// A compiled grammar: rules, leaves, the starter index, predicate tables,
/// and the analysis flags computed at commit.
///
/// Example:
/// ```
/// use thicket::Grammar;
///
/// let mut g = Grammar::new();
/// g.rule("S", "NP VP")?;
/// g.rule("NP", "D N")?;
/// g.rule("VP", "V")?;
/// g.leaf("D", "the")?;
/// g.leaf("N", "cat")?;
/// g.leaf("V", "sat")?;
/// let parses = g.parse("the cat sat")?;
/// assert_eq!(parses[0].summary(), "S[NP[D,_ws,N],_ws,VP[V]]");
/// # Ok::<(), thicket::Diagnostic>(())
/// ```
#[derive(Debug)]
pub struct Grammar {
    names: NameTable,
    shared_names: Option<Arc<NameTable>>,
    rules: Vec<Rule>,
    rules_by_name: HashMap<Symbol, Vec<RuleId>>,
    leaves: Vec<Leaf>,
    leaves_by_name: HashMap<Symbol, Vec<LeafId>>,
    atoms: Vec<Atom>,
    starters: HashMap<Symbol, Vec<AtomId>>,
    registry: Registry,
    keep_whitespace: bool,
    committed: bool,
    unary_check: bool,
    trash: Option<Symbol>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    /// Creates an empty grammar.
    #[must_use]
    pub fn new() -> Grammar {
        Grammar {
            names: NameTable::default(),
            shared_names: None,
            rules: vec![],
            rules_by_name: HashMap::default(),
            leaves: vec![],
            leaves_by_name: HashMap::default(),
            atoms: vec![],
            starters: HashMap::default(),
            registry: Registry::default(),
            keep_whitespace: false,
            committed: false,
            unary_check: false,
            trash: None,
        }
    }

    fn check_unfrozen(&self) -> Result<(), Diagnostic> {
        if self.committed {
            Err(Diagnostic::FrozenAfterParse)
        } else {
            Ok(())
        }
    }

    /// Declares a nonterminal rule.
    pub fn rule(&mut self, name: &str, body: &str) -> Result<(), Diagnostic> {
        self.rule_with(name, body, RuleOptions::default())
    }

    /// Declares a nonterminal rule with predicates attached.
    ///
    /// Identical re-declarations are idempotent; a new body under an
    /// existing name adds an independent rule for that name.
    pub fn rule_with(
        &mut self,
        name: &str,
        body: &str,
        options: RuleOptions<'_>,
    ) -> Result<(), Diagnostic> {
        self.check_unfrozen()?;
        let predicates =
            PredicateSet::from_names(options.tests, options.preconditions, options.process);
        let symbol = self.names.intern(name);
        if self.rules.iter().any(|rule| {
            rule.name == symbol && rule.source == body && rule.predicates.same_names(&predicates)
        }) {
            return Ok(());
        }
        let alternatives = rule::scan_body(name, body)?;
        if alternatives.len() == 1 {
            self.push_atom_rule(symbol, body.to_string(), &alternatives[0], predicates);
        } else {
            let mut subrules = vec![];
            for alternative in &alternatives {
                let source = alternative.iter().map(|atom| &atom.text).join(" ");
                subrules.push(self.push_atom_rule(
                    symbol,
                    source,
                    alternative,
                    predicates.clone(),
                ));
            }
            self.rules.push(Rule {
                name: symbol,
                source: body.to_string(),
                body: RuleBody::Subrules(subrules),
                predicates,
            });
        }
        Ok(())
    }

    fn push_atom_rule(
        &mut self,
        name: Symbol,
        source: String,
        raw: &[rule::RawAtom],
        predicates: PredicateSet,
    ) -> RuleId {
        let id = self.rules.len();
        let chain = rule::chain_atoms(&mut self.atoms, &mut self.names, id, raw);
        self.rules.push(Rule {
            name,
            source,
            body: RuleBody::Atoms(chain),
            predicates,
        });
        self.rules_by_name.entry(name).or_default().push(id);
        id
    }

    /// Declares a terminal rule matching a regular expression.
    pub fn leaf(&mut self, name: &str, pattern: &str) -> Result<(), Diagnostic> {
        self.declare_leaf(name, pattern, false, false, RuleOptions::default())
    }

    /// Declares a terminal rule with predicates attached.
    pub fn leaf_with(
        &mut self,
        name: &str,
        pattern: &str,
        options: RuleOptions<'_>,
    ) -> Result<(), Diagnostic> {
        self.declare_leaf(name, pattern, false, false, options)
    }

    /// Declares an ignorable terminal: atom matching skips it, but it is
    /// absorbed into whatever node spans it.
    pub fn ignore(&mut self, name: &str, pattern: &str) -> Result<(), Diagnostic> {
        self.declare_leaf(name, pattern, true, false, RuleOptions::default())
    }

    /// Declares an ignorable terminal with predicates attached.
    pub fn ignore_with(
        &mut self,
        name: &str,
        pattern: &str,
        options: RuleOptions<'_>,
    ) -> Result<(), Diagnostic> {
        self.declare_leaf(name, pattern, true, false, options)
    }

    /// Declares a boundary terminal: it may never become a child of another
    /// node, and it splits the input into independently-searched segments.
    pub fn boundary(&mut self, name: &str, pattern: &str) -> Result<(), Diagnostic> {
        self.declare_leaf(name, pattern, false, true, RuleOptions::default())
    }

    /// Declares a boundary terminal with predicates attached.
    pub fn boundary_with(
        &mut self,
        name: &str,
        pattern: &str,
        options: RuleOptions<'_>,
    ) -> Result<(), Diagnostic> {
        self.declare_leaf(name, pattern, false, true, options)
    }

    fn declare_leaf(
        &mut self,
        name: &str,
        pattern: &str,
        ignorable: bool,
        boundary: bool,
        options: RuleOptions<'_>,
    ) -> Result<(), Diagnostic> {
        self.check_unfrozen()?;
        let predicates =
            PredicateSet::from_names(options.tests, options.preconditions, options.process);
        let symbol = self.names.intern(name);
        if self.leaves.iter().any(|leaf| {
            leaf.name == symbol
                && leaf.source == pattern
                && leaf.ignorable == ignorable
                && leaf.boundary == boundary
                && leaf.predicates.same_names(&predicates)
        }) {
            return Ok(());
        }
        let compiled = Regex::new(pattern)
            .map_err(|error| Diagnostic::BadPattern(name.to_string(), error.to_string()))?;
        let id = self.leaves.len();
        self.leaves.push(Leaf {
            name: symbol,
            source: pattern.to_string(),
            pattern: Some(compiled),
            ignorable,
            boundary,
            predicates,
        });
        self.leaves_by_name.entry(symbol).or_default().push(id);
        Ok(())
    }

    /// Suppresses the automatic ignorable whitespace leaf.
    pub fn keep_whitespace(&mut self) -> Result<(), Diagnostic> {
        self.check_unfrozen()?;
        self.keep_whitespace = true;
        Ok(())
    }

    /// Registers a node test under `name`.
    pub fn node_test(
        &mut self,
        name: &str,
        test: impl Fn(&Node<'_>) -> Outcome + 'static,
    ) -> Result<(), Diagnostic> {
        self.check_unfrozen()?;
        self.registry.add_node_test(name, Box::new(test));
        Ok(())
    }

    /// Registers a structural (ancestor/descendant) test under `name`.
    pub fn ancestor_test(
        &mut self,
        name: &str,
        test: impl Fn(&Node<'_>, &Node<'_>) -> Outcome + 'static,
    ) -> Result<(), Diagnostic> {
        self.check_unfrozen()?;
        self.registry.add_ancestor_test(name, Box::new(test));
        Ok(())
    }

    /// Registers a precondition under `name`.  The arguments are the rule
    /// name, the prospective span, the whole text, and the prospective
    /// children (empty during tokenization).
    pub fn precondition(
        &mut self,
        name: &str,
        precondition: impl Fn(&str, usize, usize, &str, &[Node<'_>]) -> bool + 'static,
    ) -> Result<(), Diagnostic> {
        self.check_unfrozen()?;
        self.registry.add_precondition(name, Box::new(precondition));
        Ok(())
    }

    /// Registers a processor under `name`.
    pub fn processor(
        &mut self,
        name: &str,
        processor: impl Fn(&mut NodeMut<'_>) + 'static,
    ) -> Result<(), Diagnostic> {
        self.check_unfrozen()?;
        self.registry.add_processor(name, Box::new(processor));
        Ok(())
    }

    fn defined(&self, name: &str) -> bool {
        self.names.lookup(name).is_some_and(|symbol| {
            self.rules_by_name.contains_key(&symbol) || self.leaves_by_name.contains_key(&symbol)
        })
    }

    fn fresh_name(&self, base: &str) -> String {
        if !self.defined(base) {
            return base.to_string();
        }
        let mut counter = 1;
        loop {
            let candidate = format!("{base}{counter}");
            if !self.defined(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Validates and freezes the grammar.  Called by the first parse.
    pub(crate) fn commit(&mut self) -> Result<(), Diagnostic> {
        if self.committed {
            return Ok(());
        }
        // literal atoms induce leaves under their own text
        let literal_symbols: Vec<Symbol> = self
            .atoms
            .iter()
            .filter(|atom| atom.literal)
            .map(|atom| atom.seeking)
            .unique()
            .collect();
        for symbol in literal_symbols {
            if !self.leaves_by_name.contains_key(&symbol) {
                let source = regex::escape(self.names.name(symbol));
                let compiled = Regex::new(&source).map_err(|error| {
                    Diagnostic::BadPattern(self.names.name(symbol).to_string(), error.to_string())
                })?;
                let id = self.leaves.len();
                self.leaves.push(Leaf {
                    name: symbol,
                    source,
                    pattern: Some(compiled),
                    ignorable: false,
                    boundary: false,
                    predicates: PredicateSet::default(),
                });
                self.leaves_by_name.entry(symbol).or_default().push(id);
            }
        }
        if self.leaves.is_empty() {
            return Err(Diagnostic::NoLeaves);
        }
        if !self.keep_whitespace {
            let name = self.fresh_name("_ws");
            let symbol = self.names.intern(&name);
            let compiled = Regex::new(r"\s+")
                .map_err(|error| Diagnostic::BadPattern(name.clone(), error.to_string()))?;
            let id = self.leaves.len();
            self.leaves.push(Leaf {
                name: symbol,
                source: r"\s+".to_string(),
                pattern: Some(compiled),
                ignorable: true,
                boundary: false,
                predicates: PredicateSet::default(),
            });
            self.leaves_by_name.entry(symbol).or_default().push(id);
        }
        {
            let name = self.fresh_name("_trash");
            let symbol = self.names.intern(&name);
            self.leaves.push(Leaf {
                name: symbol,
                source: String::new(),
                pattern: None,
                ignorable: false,
                boundary: false,
                predicates: PredicateSet::default(),
            });
            self.trash = Some(symbol);
        }
        let mut missing: Vec<(String, String)> = vec![];
        for rule in &self.rules {
            let RuleBody::Atoms(chain) = &rule.body else {
                continue;
            };
            for &atom in chain {
                let seeking = self.atoms[atom].seeking;
                if !self.rules_by_name.contains_key(&seeking)
                    && !self.leaves_by_name.contains_key(&seeking)
                {
                    let entry = (
                        self.names.name(rule.name).to_string(),
                        self.names.name(seeking).to_string(),
                    );
                    if !missing.contains(&entry) {
                        missing.push(entry);
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(Diagnostic::UndefinedSymbols(missing));
        }
        for rule in &self.rules {
            let RuleBody::Atoms(chain) = &rule.body else {
                continue;
            };
            if chain.iter().all(|&atom| self.atoms[atom].min == 0) {
                return Err(Diagnostic::EmptyConsumption(
                    self.names.name(rule.name).to_string(),
                ));
            }
        }
        {
            let Grammar {
                rules,
                leaves,
                registry,
                names,
                ..
            } = self;
            for rule in rules.iter_mut() {
                rule.predicates.resolve(names.name(rule.name), registry)?;
            }
            for leaf in leaves.iter_mut() {
                leaf.predicates.resolve(names.name(leaf.name), registry)?;
            }
        }
        self.unary_check = loopck::check(self);
        debug!("unary branch check: {}", self.unary_check);
        for rule in &self.rules {
            let RuleBody::Atoms(chain) = &rule.body else {
                continue;
            };
            for &atom in rule::starter_atoms(&self.atoms, chain).iter() {
                self.starters
                    .entry(self.atoms[atom].seeking)
                    .or_default()
                    .push(atom);
            }
        }
        for starters in self.starters.values_mut() {
            starters.sort_by_key(|&atom| Reverse(self.atoms[atom].max_consumption));
        }
        self.shared_names = Some(Arc::new(self.names.clone()));
        self.committed = true;
        debug!(
            "committed grammar: {} rule(s), {} leaves, {} atoms",
            self.rules.len(),
            self.leaves.len(),
            self.atoms.len()
        );
        Ok(())
    }

    /// Parses `text` under the default options, returning every tied-best
    /// parse.
    pub fn parse(&mut self, text: &str) -> Result<Vec<Parse>, Diagnostic> {
        self.parse_with(text, &ParseOptions::default())
    }

    /// Parses `text`.  Returns up to `options.n` tied-best parses under the
    /// dominance filter, possibly more when segment products cross a tie, or
    /// every completed parse when the filter stack is empty.
    pub fn parse_with(
        &mut self,
        text: &str,
        options: &ParseOptions,
    ) -> Result<Vec<Parse>, Diagnostic> {
        self.commit()?;
        let text: Arc<str> = Arc::from(text);
        let variants = lex::tokenize(self, &text)?;
        let mut segmentation = Segmentation::new(&variants, &options.filters, options.n);
        match options.n {
            Some(limit) => {
                while !segmentation.all_done() && segmentation.total_initial_parses() < limit {
                    segmentation.step_min_weight(self)?;
                }
            }
            None => segmentation.run_to_completion(self)?,
        }
        Ok(segmentation.compose(&options.filters, options.n))
    }

    /// Returns the single best parse of `text`.
    pub fn first(&mut self, text: &str) -> Result<Parse, Diagnostic> {
        let parses = self.parse_with(
            text,
            &ParseOptions {
                n: Some(1),
                ..ParseOptions::default()
            },
        )?;
        Ok(parses
            .into_iter()
            .next()
            .expect("the engine returns at least one parse for any input"))
    }

    pub(crate) fn rule_by_id(&self, id: RuleId) -> &Rule {
        &self.rules[id]
    }

    pub(crate) fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn leaf_by_id(&self, id: LeafId) -> &Leaf {
        &self.leaves[id]
    }

    pub(crate) fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub(crate) fn atom(&self, id: AtomId) -> &Atom {
        &self.atoms[id]
    }

    pub(crate) fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub(crate) fn starters(&self, symbol: Symbol) -> Option<&[AtomId]> {
        self.starters.get(&symbol).map(Vec::as_slice)
    }

    pub(crate) fn name_of(&self, symbol: Symbol) -> &str {
        self.names.name(symbol)
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn unary_branch_check(&self) -> bool {
        self.unary_check
    }

    pub(crate) fn trash_symbol(&self) -> Symbol {
        self.trash.expect("grammar is committed")
    }

    pub(crate) fn names_arc(&self) -> Arc<NameTable> {
        self.shared_names
            .clone()
            .expect("grammar is committed")
    }
}
