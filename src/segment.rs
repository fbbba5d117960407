//! The segment layer: boundary tokens (user-declared boundaries and trash)
//! divide the input into independently-searched regions whose results
//! are composed at the end.
//!
//! Pieces of each lex variant are grouped by interval, so all variants of
//! one region share a single search; continuation links record which
//! segment follows which, and composition takes the cross-product of
//! per-segment results along every chain from the start of the input.

use crate::diag::Diagnostic;
use crate::grammar::Grammar;
use crate::hopper::{Filter, Hopper};
use crate::node::Span;
use crate::parse::Parse;
use crate::search::{Picker, Stepper};
use crate::util::{HashMap, HashSet};
use itertools::Itertools;
use log::debug;
use std::collections::BTreeSet;

/// A closed-interval search over all lex variants of one region.
#[derive(Debug)]
pub(crate) struct Segment {
    pub(crate) span: Span,
    pub(crate) boundary: bool,
    base_summaries: HashSet<String>,
    bases: Vec<Parse>,
    picker: Picker,
    pub(crate) hopper: Hopper,
    pub(crate) continuations: Vec<usize>,
    pub(crate) done: bool,
}

impl Segment {
    fn new(span: Span, boundary: bool, filters: &[Filter], limit: Option<usize>) -> Segment {
        Segment {
            span,
            boundary,
            base_summaries: HashSet::default(),
            bases: vec![],
            picker: Picker::default(),
            hopper: Hopper::new(filters, limit),
            continuations: vec![],
            done: false,
        }
    }

    /// Adds one lex variant's sub-forest, ignoring duplicates.
    fn add_base(&mut self, base: Parse) {
        if self.base_summaries.insert(base.summary().to_string()) {
            self.bases.push(base);
        }
    }

    /// Turns the collected bases into work: boundary segments are complete
    /// as they stand, text segments get a stepper per variant.
    fn finalize(&mut self) {
        let bases = std::mem::take(&mut self.bases);
        if self.boundary {
            for base in bases {
                self.hopper.insert(base);
            }
            self.done = true;
        } else {
            for base in bases {
                self.picker.push(Stepper::new(base));
            }
        }
    }

    /// Scheduling weight: region mass times result count, so light, barely
    /// explored segments are advanced first.
    fn weight(&self) -> usize {
        self.span.len() * self.hopper.len()
    }

    /// Advances this segment's search by one reduction attempt.
    fn step(&mut self, grammar: &Grammar) -> Result<(), Diagnostic> {
        if self.done {
            return Ok(());
        }
        let Some(mut stepper) = self.picker.pop() else {
            self.done = true;
            return Ok(());
        };
        if !self.hopper.continuable(&stepper.parse) {
            self.hopper.insert(stepper.parse);
        } else if let Some(child) = stepper.next(grammar, &mut self.hopper)? {
            self.picker.push(Stepper::new(child));
            self.picker.push(stepper);
        } else if !stepper.produced {
            self.hopper.insert(stepper.parse);
        }
        if self.picker.is_empty() || self.hopper.satisfied() {
            self.done = true;
        }
        Ok(())
    }
}

/// All segments of one parse invocation, with their continuation links.
#[derive(Debug)]
pub(crate) struct Segmentation {
    segments: Vec<Segment>,
    initial: Vec<usize>,
}

/// One piece of a split lex variant, before grouping.
struct Piece {
    span: Span,
    boundary: bool,
    base: Parse,
}

/// Splits one lex variant at its boundary roots.  Maximal boundary-free
/// runs become text pieces; each boundary root becomes a piece of its own;
/// two adjacent boundaries get an empty text piece between them.
fn split_variant(variant: &Parse) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = vec![];
    let count = variant.length();
    if count == 0 {
        pieces.push(Piece {
            span: Span::new(0, 0),
            boundary: false,
            base: variant.clone(),
        });
        return pieces;
    }
    let mut index = 0;
    let mut previous_was_boundary = false;
    while index < count {
        let node = variant.node(variant.roots[index]);
        if node.is_boundary() {
            if previous_was_boundary {
                pieces.push(Piece {
                    span: Span::new(node.start(), node.start()),
                    boundary: false,
                    base: Parse::empty(variant.text.clone(), variant.names.clone()),
                });
            }
            pieces.push(Piece {
                span: node.span(),
                boundary: true,
                base: variant.slice_roots(index..index + 1),
            });
            previous_was_boundary = true;
            index += 1;
        } else {
            let from = index;
            let start = node.start();
            let mut end = node.end();
            while index < count && !variant.node(variant.roots[index]).is_boundary() {
                end = variant.node(variant.roots[index]).end();
                index += 1;
            }
            pieces.push(Piece {
                span: Span::new(start, end),
                boundary: false,
                base: variant.slice_roots(from..index),
            });
            previous_was_boundary = false;
        }
    }
    pieces
}

impl Segmentation {
    /// Groups the pieces of every variant by interval and links observed
    /// consecutive pairs as continuations.
    pub(crate) fn new(variants: &[Parse], filters: &[Filter], limit: Option<usize>) -> Segmentation {
        let mut segments: Vec<Segment> = vec![];
        let mut index: HashMap<(usize, usize, bool), usize> = HashMap::default();
        let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();
        let mut initial: Vec<usize> = vec![];
        for variant in variants {
            let mut previous: Option<usize> = None;
            for piece in split_variant(variant) {
                let key = (piece.span.start, piece.span.end, piece.boundary);
                let ix = *index.entry(key).or_insert_with(|| {
                    segments.push(Segment::new(piece.span, piece.boundary, filters, limit));
                    segments.len() - 1
                });
                segments[ix].add_base(piece.base);
                match previous {
                    Some(from) => {
                        edges.insert((from, ix));
                    }
                    None => {
                        if !initial.contains(&ix) {
                            initial.push(ix);
                        }
                    }
                }
                previous = Some(ix);
            }
        }
        for (from, to) in edges {
            segments[from].continuations.push(to);
        }
        for segment in &mut segments {
            segment.finalize();
        }
        debug!(
            "{} segment(s), {} initial",
            segments.len(),
            initial.len()
        );
        Segmentation { segments, initial }
    }

    pub(crate) fn all_done(&self) -> bool {
        self.segments.iter().all(|segment| segment.done)
    }

    /// Drives every segment's search to exhaustion.
    pub(crate) fn run_to_completion(&mut self, grammar: &Grammar) -> Result<(), Diagnostic> {
        for segment in &mut self.segments {
            while !segment.done {
                segment.step(grammar)?;
            }
        }
        Ok(())
    }

    /// Advances the cheapest unfinished segment by one step.
    pub(crate) fn step_min_weight(&mut self, grammar: &Grammar) -> Result<(), Diagnostic> {
        let chosen = self
            .segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| !segment.done)
            .min_by_key(|(ix, segment)| (segment.weight(), segment.span.start, *ix))
            .map(|(ix, _)| ix);
        match chosen {
            Some(ix) => self.segments[ix].step(grammar),
            None => Ok(()),
        }
    }

    fn total_parses(&self, ix: usize) -> usize {
        let segment = &self.segments[ix];
        if segment.continuations.is_empty() {
            segment.hopper.len()
        } else {
            segment.hopper.len()
                * segment
                    .continuations
                    .iter()
                    .map(|&continuation| self.total_parses(continuation))
                    .sum::<usize>()
        }
    }

    /// How many composed parses the initial segments could deliver right
    /// now.
    pub(crate) fn total_initial_parses(&self) -> usize {
        self.initial.iter().map(|&ix| self.total_parses(ix)).sum()
    }

    fn collect_paths(&self, ix: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        current.push(ix);
        let segment = &self.segments[ix];
        if segment.continuations.is_empty() {
            out.push(current.clone());
        } else {
            for &continuation in &segment.continuations {
                self.collect_paths(continuation, current, out);
            }
        }
        current.pop();
    }

    /// Composes per-segment results along every chain of continuations and
    /// passes the combinations through a final dominance filter.
    pub(crate) fn compose(&self, filters: &[Filter], limit: Option<usize>) -> Vec<Parse> {
        let mut paths: Vec<Vec<usize>> = vec![];
        for &start in &self.initial {
            self.collect_paths(start, &mut vec![], &mut paths);
        }
        let mut hopper = Hopper::new(filters, limit);
        for path in paths {
            let bins: Vec<&[Parse]> = path
                .iter()
                .map(|&ix| self.segments[ix].hopper.parses())
                .collect();
            if bins.iter().any(|bin| bin.is_empty()) {
                continue;
            }
            for combination in bins.iter().map(|bin| bin.iter()).multi_cartesian_product() {
                let mut merged = combination[0].clone();
                for part in &combination[1..] {
                    merged = merged.concat(part);
                }
                hopper.insert(merged);
            }
        }
        hopper.into_parses()
    }
}
