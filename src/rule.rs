//! Rules, leaves, and atoms, plus the compilation of rule bodies into atom
//! chains and the matcher that drives reductions.
//!
//! A rule body is a whitespace-separated sequence of atoms, or several such
//! sequences joined by ` | `, each of which is compiled as an independent
//! subrule sharing the parent's name and predicates.  An atom is an
//! identifier or a quoted literal, optionally suffixed with one of
//! `? + * {n} {n,} {n,m}`.

use crate::diag::Diagnostic;
use crate::names::{NameTable, Symbol};
use crate::parse::Parse;
use crate::predicate::{PredicateId, PredicateKind, Registry};
use regex::Regex;
use std::sync::OnceLock;

/// Index of a rule in the grammar's rule table.
pub(crate) type RuleId = usize;
/// Index of a leaf in the grammar's leaf table.
pub(crate) type LeafId = usize;
/// Index of an atom in the grammar's atom arena.
pub(crate) type AtomId = usize;

/// When the repetition of an unbounded atom is weighed for greediness, it
/// counts for this many tokens.
const UNBOUNDED_WEIGHT: u32 = 10;

/// A single element of a rule body: the symbol it seeks plus repetition
/// bounds.
#[derive(Clone, Debug)]
pub(crate) struct Atom {
    pub(crate) seeking: Symbol,
    pub(crate) min: u32,
    /// `None` means unbounded.
    pub(crate) max: Option<u32>,
    pub(crate) literal: bool,
    pub(crate) next: Option<AtomId>,
    pub(crate) rule: RuleId,
    /// Greedy-ordering key: how much this atom and its successors could
    /// consume, with unbounded repetitions counted as [`UNBOUNDED_WEIGHT`].
    pub(crate) max_consumption: u32,
}

/// The body of a compiled rule: either a pure disjunction of subrules or a
/// chain of atoms.  Exactly one shape applies to any rule.
#[derive(Clone, Debug)]
pub(crate) enum RuleBody {
    Subrules(Vec<RuleId>),
    Atoms(Vec<AtomId>),
}

/// The predicates attached to a rule or leaf: names as declared, and the
/// resolved ids filled in at commit time.
#[derive(Clone, Debug, Default)]
pub(crate) struct PredicateSet {
    pub(crate) test_names: Vec<String>,
    pub(crate) precondition_names: Vec<String>,
    pub(crate) process_name: Option<String>,
    pub(crate) node_tests: Vec<PredicateId>,
    pub(crate) ancestor_tests: Vec<PredicateId>,
    pub(crate) preconditions: Vec<PredicateId>,
    pub(crate) process: Option<PredicateId>,
}

impl PredicateSet {
    pub(crate) fn from_names(
        tests: &[&str],
        preconditions: &[&str],
        process: Option<&str>,
    ) -> Self {
        PredicateSet {
            test_names: tests.iter().map(ToString::to_string).collect(),
            precondition_names: preconditions.iter().map(ToString::to_string).collect(),
            process_name: process.map(ToString::to_string),
            ..PredicateSet::default()
        }
    }

    /// Two declarations count as duplicates only when their predicate names
    /// agree as well as their bodies.
    pub(crate) fn same_names(&self, other: &PredicateSet) -> bool {
        self.test_names == other.test_names
            && self.precondition_names == other.precondition_names
            && self.process_name == other.process_name
    }

    /// Resolves every referenced name against the registry, partitioning
    /// tests by their shape.
    pub(crate) fn resolve(&mut self, owner: &str, registry: &Registry) -> Result<(), Diagnostic> {
        self.node_tests.clear();
        self.ancestor_tests.clear();
        self.preconditions.clear();
        self.process = None;
        for name in &self.test_names {
            match registry.resolve_test(owner, name)? {
                (PredicateKind::AncestorTest, id) => self.ancestor_tests.push(id),
                (_, id) => self.node_tests.push(id),
            }
        }
        for name in &self.precondition_names {
            self.preconditions
                .push(registry.resolve_precondition(owner, name)?);
        }
        if let Some(name) = &self.process_name {
            self.process = Some(registry.resolve_processor(owner, name)?);
        }
        Ok(())
    }
}

/// A nonterminal production.
#[derive(Clone, Debug)]
pub(crate) struct Rule {
    pub(crate) name: Symbol,
    /// The body as declared, kept for idempotence checks.
    pub(crate) source: String,
    pub(crate) body: RuleBody,
    pub(crate) predicates: PredicateSet,
}

/// A terminal production.  The internal trash rule is the one leaf with no
/// pattern.
#[derive(Clone, Debug)]
pub(crate) struct Leaf {
    pub(crate) name: Symbol,
    /// The pattern as declared, kept for idempotence checks.
    pub(crate) source: String,
    pub(crate) pattern: Option<Regex>,
    pub(crate) ignorable: bool,
    pub(crate) boundary: bool,
    pub(crate) predicates: PredicateSet,
}

/// An atom before it is interned and chained: display text, the sought
/// name, and repetition bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RawAtom {
    pub(crate) text: String,
    pub(crate) seeking: String,
    pub(crate) literal: bool,
    pub(crate) min: u32,
    pub(crate) max: Option<u32>,
}

fn ident_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_](?:\w|\\.)*").unwrap())
}

fn repetition_regex() -> &'static Regex {
    static REPETITION: OnceLock<Regex> = OnceLock::new();
    REPETITION.get_or_init(|| Regex::new(r"^\{(\d+)(?:(,)(\d+)?)?\}$").unwrap())
}

/// Parses a repetition suffix into `(min, max)` bounds; empty means
/// "exactly once".
fn parse_repetition(rule: &str, token: &str, suffix: &str) -> Result<(u32, Option<u32>), Diagnostic> {
    match suffix {
        "" => Ok((1, Some(1))),
        "?" => Ok((0, Some(1))),
        "+" => Ok((1, None)),
        "*" => Ok((0, None)),
        _ => {
            let bad = || Diagnostic::BadRepetitionSuffix(token.to_string(), rule.to_string());
            let captures = repetition_regex().captures(suffix).ok_or_else(bad)?;
            let min: u32 = captures[1].parse().map_err(|_| bad())?;
            let max = match (captures.get(2), captures.get(3)) {
                (None, _) => Some(min),
                (Some(_), None) => None,
                (Some(_), Some(m)) => Some(m.as_str().parse().map_err(|_| bad())?),
            };
            if let Some(max) = max {
                if max < min || max == 0 {
                    return Err(bad());
                }
            }
            Ok((min, max))
        }
    }
}

/// Strips the escapes from an identifier token.
fn unescape(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let mut chars = ident.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a rule body into alternatives of raw atoms.  The scan respects
/// quoting, so a literal may contain spaces or a bare `|`.
pub(crate) fn scan_body(rule: &str, body: &str) -> Result<Vec<Vec<RawAtom>>, Diagnostic> {
    let malformed =
        |token: &str| Diagnostic::MalformedAtom(token.to_string(), rule.to_string());
    let chars: Vec<char> = body.chars().collect();
    let mut alternatives: Vec<Vec<RawAtom>> = vec![vec![]];
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        if chars[i] == '"' || chars[i] == '\'' {
            let quote = chars[i];
            i += 1;
            let mut literal = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(malformed(&format!("{quote}{literal}"))),
                    Some('\\') => {
                        let escaped = *chars.get(i + 1).ok_or_else(|| malformed(&literal))?;
                        literal.push(escaped);
                        i += 2;
                    }
                    Some(&c) if c == quote => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        literal.push(c);
                        i += 1;
                    }
                }
            }
            let mut suffix = String::new();
            while i < chars.len() && !chars[i].is_whitespace() {
                suffix.push(chars[i]);
                i += 1;
            }
            if literal.is_empty() {
                return Err(malformed(&format!("{quote}{quote}")));
            }
            let text = format!("{quote}{literal}{quote}{suffix}");
            if !suffix.is_empty() && !matches!(suffix.as_bytes()[0], b'?' | b'+' | b'*' | b'{') {
                return Err(malformed(&text));
            }
            let (min, max) = parse_repetition(rule, &text, &suffix)?;
            alternatives
                .last_mut()
                .expect("alternative list is never empty")
                .push(RawAtom {
                    text,
                    seeking: literal,
                    literal: true,
                    min,
                    max,
                });
        } else {
            let mut word = String::new();
            while i < chars.len() && !chars[i].is_whitespace() {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    word.push('\\');
                    word.push(chars[i + 1]);
                    i += 2;
                } else {
                    word.push(chars[i]);
                    i += 1;
                }
            }
            if word == "|" {
                if alternatives
                    .last()
                    .expect("alternative list is never empty")
                    .is_empty()
                {
                    return Err(malformed("|"));
                }
                alternatives.push(vec![]);
                continue;
            }
            let Some(found) = ident_regex().find(&word) else {
                return Err(malformed(&word));
            };
            let (ident, suffix) = word.split_at(found.end());
            if !suffix.is_empty() && !matches!(suffix.as_bytes()[0], b'?' | b'+' | b'*' | b'{') {
                return Err(malformed(&word));
            }
            let (min, max) = parse_repetition(rule, &word, suffix)?;
            alternatives
                .last_mut()
                .expect("alternative list is never empty")
                .push(RawAtom {
                    text: word.clone(),
                    seeking: unescape(ident),
                    literal: false,
                    min,
                    max,
                });
        }
    }
    if alternatives
        .last()
        .expect("alternative list is never empty")
        .is_empty()
    {
        return Err(malformed(body.trim()));
    }
    Ok(alternatives)
}

/// Interns one alternative's atoms into the grammar's atom arena, chaining
/// `next` pointers and computing consumption weights back to front.
pub(crate) fn chain_atoms(
    atoms: &mut Vec<Atom>,
    names: &mut NameTable,
    rule: RuleId,
    raw: &[RawAtom],
) -> Vec<AtomId> {
    let first_id = atoms.len();
    for entry in raw {
        atoms.push(Atom {
            seeking: names.intern(&entry.seeking),
            min: entry.min,
            max: entry.max,
            literal: entry.literal,
            next: None,
            rule,
            max_consumption: 0,
        });
    }
    let ids: Vec<AtomId> = (first_id..atoms.len()).collect();
    let mut consumption = 0;
    for &id in ids.iter().rev() {
        consumption += atoms[id].max.unwrap_or(UNBOUNDED_WEIGHT);
        atoms[id].max_consumption = consumption;
    }
    for pair in ids.windows(2) {
        atoms[pair[0]].next = Some(pair[1]);
    }
    ids
}

/// The atoms that can begin a match of this chain: the first atom and every
/// subsequent one up to and including the first that is required.
pub(crate) fn starter_atoms(atoms: &[Atom], chain: &[AtomId]) -> Vec<AtomId> {
    let mut starters = vec![];
    for &id in chain {
        starters.push(id);
        if atoms[id].min > 0 {
            break;
        }
    }
    starters
}

/// Matches an atom chain against a parse's roots starting at `offset`,
/// returning the offset one past the last matched root.
///
/// Ignorable roots are skipped while counting and absorbed into the span
/// when a later match follows them; trailing ignorables are left outside.
/// Roots that are non-traversible or carry a failed test never match.
pub(crate) fn match_from(
    atoms: &[Atom],
    parse: &Parse,
    first: AtomId,
    mut offset: usize,
) -> Option<usize> {
    let mut current = Some(first);
    while let Some(atom_id) = current {
        let atom = &atoms[atom_id];
        let mut count: u32 = 0;
        let mut end = offset;
        let mut probe = offset;
        while probe < parse.roots.len() {
            if atom.max.is_some_and(|max| count >= max) {
                break;
            }
            let data = &parse.tree[parse.roots[probe]];
            if data.name == atom.seeking && data.kind.traversible() && !data.failed_test {
                probe += 1;
                count += 1;
                end = probe;
            } else if data.kind.ignorable() && !data.failed_test {
                probe += 1;
            } else {
                break;
            }
        }
        if count < atom.min {
            return None;
        }
        offset = end;
        current = atom.next;
    }
    Some(offset)
}
