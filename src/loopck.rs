//! Analysis pass which decides whether the grammar can loop through unary
//! reductions.
//!
//! A rule whose atoms require fewer than two tokens in total can reduce a
//! single node to a single new node.  Chasing the `(from symbol, to rule)`
//! edges of all such rules detects whether any chain closes on itself; when
//! one does, `Parse::add` must refuse nodes whose unary spine repeats a
//! name, or the search would grow towers of wrappers forever.

use crate::grammar::Grammar;
use crate::names::Symbol;
use crate::rule::RuleBody;
use crate::util::HashSet;
use log::debug;

/// One chain being chased: the symbols it has passed through and the
/// symbol whose producers extend it.
struct LoopCheck {
    seen: HashSet<Symbol>,
    sought: Symbol,
}

/// Returns true when some cycle of potentially-unary reductions exists.
pub(crate) fn check(grammar: &Grammar) -> bool {
    let mut edges: Vec<(Symbol, Symbol)> = vec![];
    for rule in grammar.rules() {
        let RuleBody::Atoms(chain) = &rule.body else {
            continue;
        };
        let required: u32 = chain.iter().map(|&id| grammar.atom(id).min).sum();
        if required >= 2 {
            continue;
        }
        for &id in chain {
            edges.push((grammar.atom(id).seeking, rule.name));
        }
    }
    let mut worklist: Vec<LoopCheck> = edges
        .iter()
        .map(|&(from, to)| {
            let mut seen = HashSet::default();
            seen.insert(from);
            seen.insert(to);
            LoopCheck { seen, sought: to }
        })
        .collect();
    while let Some(chain) = worklist.pop() {
        for &(from, to) in &edges {
            if from != chain.sought {
                continue;
            }
            if chain.seen.contains(&to) {
                debug!(
                    "unary reduction cycle closes at '{}'",
                    grammar.name_of(to)
                );
                return true;
            }
            let mut seen = chain.seen.clone();
            seen.insert(to);
            worklist.push(LoopCheck { seen, sought: to });
        }
    }
    false
}
