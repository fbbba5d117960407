//! The tokenizer: produces every maximal sequence of leaf spans covering
//! the input, branching wherever leaf patterns overlap, and boxing
//! unmatched character runs into trash nodes.

use crate::diag::Diagnostic;
use crate::grammar::Grammar;
use crate::node::Span;
use crate::parse::Parse;
use crate::util::next_char_boundary;
use log::debug;
use std::collections::VecDeque;
use std::sync::Arc;

/// Tokenizes `text`, breadth-first over offsets.  Each returned parse is a
/// maximally un-reduced forest of leaf, boundary, and trash roots covering
/// the whole input.
pub(crate) fn tokenize(grammar: &Grammar, text: &Arc<str>) -> Result<Vec<Parse>, Diagnostic> {
    let mut complete = vec![];
    let mut work: VecDeque<(usize, Parse)> = VecDeque::new();
    work.push_back((0, Parse::empty(text.clone(), grammar.names_arc())));
    while let Some((offset, parse)) = work.pop_front() {
        if offset >= text.len() {
            complete.push(parse);
            continue;
        }
        let mut advanced = false;
        for (leaf_id, leaf) in grammar.leaves().iter().enumerate() {
            let Some(pattern) = &leaf.pattern else { continue };
            let Some(found) = pattern.find_at(text, offset) else {
                continue;
            };
            if found.start() != offset || found.end() == found.start() {
                continue;
            }
            let name = grammar.name_of(leaf.name);
            let accepted = leaf.predicates.preconditions.iter().all(|&precondition| {
                grammar.registry().run_precondition(
                    precondition,
                    name,
                    found.start(),
                    found.end(),
                    text,
                    &[],
                )
            });
            if !accepted {
                continue;
            }
            advanced = true;
            let mut branch = parse.clone();
            branch.push_leaf(grammar, leaf_id, Span::new(found.start(), found.end()))?;
            if found.end() >= text.len() {
                complete.push(branch);
            } else {
                work.push_back((found.end(), branch));
            }
        }
        if !advanced {
            // box everything up to the next offset where some leaf matches
            let from = next_char_boundary(text, offset);
            let mut next_match = text.len();
            for leaf in grammar.leaves() {
                if let Some(pattern) = &leaf.pattern {
                    if let Some(found) = pattern.find_at(text, from) {
                        next_match = next_match.min(found.start());
                    }
                }
            }
            let mut branch = parse.clone();
            branch.push_trash(grammar, Span::new(offset, next_match));
            if next_match >= text.len() {
                complete.push(branch);
            } else {
                work.push_back((next_match, branch));
            }
        }
    }
    debug!("{} lex variant(s) over {} bytes", complete.len(), text.len());
    Ok(complete)
}
