//! The hopper: a bounded bag of completed parses enforcing the dominance
//! filter, plus the vetting step that turns a proposed reduction into a
//! child parse.

use crate::diag::Diagnostic;
use crate::grammar::Grammar;
use crate::node::Node;
use crate::parse::Parse;
use crate::rule::RuleId;
use crate::util::HashSet;
use std::cmp::Ordering;
use std::str::FromStr;

/// One key of the dominance filter.  Every key prefers smaller values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Number of erroneous roots.
    Correctness,
    /// Number of roots: fewer roots means a more complete reduction.
    Completion,
    /// Total node count: smaller trees are preferred.
    Size,
    /// Number of roots with unresolved structural tests.
    Pending,
}

impl Filter {
    pub(crate) fn key(self, parse: &Parse) -> usize {
        match self {
            Filter::Correctness => parse.incorrectness_count(),
            Filter::Completion => parse.length(),
            Filter::Size => parse.size(),
            Filter::Pending => parse.pending_count(),
        }
    }

    /// The default filter stack of `parse`.
    #[must_use]
    pub fn default_filters() -> Vec<Filter> {
        vec![
            Filter::Correctness,
            Filter::Completion,
            Filter::Pending,
            Filter::Size,
        ]
    }
}

impl FromStr for Filter {
    type Err = Diagnostic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correctness" => Ok(Filter::Correctness),
            "completion" => Ok(Filter::Completion),
            "size" => Ok(Filter::Size),
            "pending" => Ok(Filter::Pending),
            _ => Err(Diagnostic::UnknownFilter(s.to_string())),
        }
    }
}

/// Holds up to `limit` best parses under the dominance filter.  The first
/// admission fixes the thresholds; later candidates are compared key by key
/// in filter order, with strictly-better candidates purging the bin and
/// ties accumulating in it.
#[derive(Debug)]
pub(crate) struct Hopper {
    filters: Vec<Filter>,
    limit: Option<usize>,
    thresholds: Option<Vec<usize>>,
    bin: Vec<Parse>,
    seen: HashSet<String>,
}

impl Hopper {
    pub(crate) fn new(filters: &[Filter], limit: Option<usize>) -> Hopper {
        Hopper {
            filters: filters.to_vec(),
            limit,
            thresholds: None,
            bin: vec![],
            seen: HashSet::default(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bin.len()
    }

    pub(crate) fn parses(&self) -> &[Parse] {
        &self.bin
    }

    pub(crate) fn into_parses(self) -> Vec<Parse> {
        self.bin
    }

    fn keys(&self, parse: &Parse) -> Vec<usize> {
        self.filters.iter().map(|filter| filter.key(parse)).collect()
    }

    fn threshold(&self, filter: Filter) -> Option<usize> {
        let thresholds = self.thresholds.as_ref()?;
        self.filters
            .iter()
            .position(|&candidate| candidate == filter)
            .map(|index| thresholds[index])
    }

    /// Offers a completed parse to the bin.
    pub(crate) fn insert(&mut self, parse: Parse) {
        if self.filters.is_empty() {
            self.bin.push(parse);
            return;
        }
        let keys = self.keys(&parse);
        let decision = self.thresholds.as_ref().map(|current| keys.cmp(current));
        match decision {
            None => {
                self.thresholds = Some(keys);
                self.bin.push(parse);
            }
            Some(Ordering::Less) => {
                let filters = self.filters.clone();
                self.bin.retain(|held| {
                    filters
                        .iter()
                        .map(|filter| filter.key(held))
                        .eq(keys.iter().copied())
                });
                self.thresholds = Some(keys);
                self.bin.push(parse);
            }
            Some(Ordering::Greater) => {}
            Some(Ordering::Equal) => self.bin.push(parse),
        }
    }

    /// May this parse still improve enough to match the thresholds?  Its
    /// error count and size only ever grow, so those two keys decide; size
    /// stops mattering once a fully-reduced parse has been admitted, since
    /// completion outranks it.
    pub(crate) fn continuable(&self, parse: &Parse) -> bool {
        if self.thresholds.is_none() {
            return true;
        }
        let complete_seen = self.threshold(Filter::Completion) == Some(1);
        for &filter in &self.filters {
            let Some(threshold) = self.threshold(filter) else {
                continue;
            };
            match filter {
                Filter::Correctness if parse.incorrectness_count() > threshold => return false,
                Filter::Size if !complete_seen && parse.size() > threshold => return false,
                _ => {}
            }
        }
        true
    }

    /// True when the bin holds the requested number of parses and nothing
    /// erroneous or pending remains among the thresholds.
    pub(crate) fn satisfied(&self) -> bool {
        let Some(limit) = self.limit else { return false };
        if self.bin.len() < limit {
            return false;
        }
        let settled = |filter| self.threshold(filter).map_or(true, |value| value == 0);
        settled(Filter::Correctness) && settled(Filter::Pending)
    }

    /// Vets a proposed reduction of `parse.roots[i..j]` by `rule`:
    /// preconditions first, then the structural-duplicate memo, then the
    /// actual extension.
    pub(crate) fn vet(
        &mut self,
        grammar: &Grammar,
        parse: &Parse,
        i: usize,
        j: usize,
        rule: RuleId,
    ) -> Result<Option<Parse>, Diagnostic> {
        let rule_data = grammar.rule_by_id(rule);
        if !rule_data.predicates.preconditions.is_empty() {
            let start = parse.node(parse.roots[i]).start();
            let end = parse.node(parse.roots[j - 1]).end();
            let children: Vec<Node<'_>> =
                parse.roots[i..j].iter().map(|&id| parse.node(id)).collect();
            let name = grammar.name_of(rule_data.name);
            for &precondition in &rule_data.predicates.preconditions {
                if !grammar.registry().run_precondition(
                    precondition,
                    name,
                    start,
                    end,
                    parse.text(),
                    &children,
                ) {
                    return Ok(None);
                }
            }
        }
        let candidate = parse.candidate_summary(grammar, i, j, rule);
        if self.seen.contains(&candidate) {
            return Ok(None);
        }
        match parse.add(i, j, rule, grammar, &candidate)? {
            Some(child) => {
                self.seen.insert(candidate);
                Ok(Some(child))
            }
            None => Ok(None),
        }
    }
}
