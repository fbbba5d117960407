//! The reduction search: a `Stepper` walks one parse attempting one
//! reduction at a time, and the `Picker` worklist keeps pending steppers
//! ordered so the least-errored, most-reduced parses are advanced first.

use crate::diag::Diagnostic;
use crate::grammar::Grammar;
use crate::hopper::Hopper;
use crate::parse::Parse;
use crate::rule;
use log::debug;
use std::collections::BTreeMap;

/// Walks one parse, yielding child parses through the hopper's vet.
#[derive(Debug)]
pub(crate) struct Stepper {
    pub(crate) parse: Parse,
    root_index: usize,
    starter_index: usize,
    /// Whether this stepper ever yielded a child.
    pub(crate) produced: bool,
}

impl Stepper {
    pub(crate) fn new(parse: Parse) -> Stepper {
        Stepper {
            parse,
            root_index: 0,
            starter_index: 0,
            produced: false,
        }
    }

    /// Advances the cursors to the next `(root, starter)` pair whose atom
    /// chain matches, and returns the vetted child parse.  Returns `None`
    /// once the cursors are exhausted.
    pub(crate) fn next(
        &mut self,
        grammar: &Grammar,
        hopper: &mut Hopper,
    ) -> Result<Option<Parse>, Diagnostic> {
        while self.root_index < self.parse.roots.len() {
            let name = self.parse.tree[self.parse.roots[self.root_index]].name;
            if let Some(starters) = grammar.starters(name) {
                while self.starter_index < starters.len() {
                    let atom_id = starters[self.starter_index];
                    self.starter_index += 1;
                    let matched =
                        rule::match_from(grammar.atoms(), &self.parse, atom_id, self.root_index);
                    if let Some(end) = matched {
                        if end > self.root_index {
                            let rule_id = grammar.atom(atom_id).rule;
                            if let Some(child) =
                                hopper.vet(grammar, &self.parse, self.root_index, end, rule_id)?
                            {
                                debug!(
                                    "reduced roots {}..{} to {}",
                                    self.root_index,
                                    end,
                                    grammar.name_of(grammar.rule_by_id(rule_id).name)
                                );
                                self.produced = true;
                                return Ok(Some(child));
                            }
                        }
                    }
                }
            }
            self.root_index += 1;
            self.starter_index = 0;
        }
        Ok(None)
    }
}

/// The worklist of pending steppers, popped smallest `(errors, length)`
/// first; a monotone sequence number breaks ties so the order is
/// deterministic and first-in first-out.
#[derive(Debug, Default)]
pub(crate) struct Picker {
    queue: BTreeMap<(usize, usize, u64), Stepper>,
    sequence: u64,
}

impl Picker {
    pub(crate) fn push(&mut self, stepper: Stepper) {
        let key = (
            stepper.parse.incorrectness_count(),
            stepper.parse.length(),
            self.sequence,
        );
        self.sequence += 1;
        self.queue.insert(key, stepper);
    }

    pub(crate) fn pop(&mut self) -> Option<Stepper> {
        self.queue.pop_first().map(|(_, stepper)| stepper)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
