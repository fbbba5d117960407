//! A fault-tolerant bottom-up parser for context-free grammars augmented
//! with predicate-based semantic constraints.
//!
//! A [`Grammar`] is declared as a set of nonterminal rules and regex-matched
//! leaves, then handed a string to parse.  Rather than recognizing a single
//! unambiguous language, the engine enumerates parse forests: it keeps going
//! when the grammar is ambiguous, boxes characters no leaf matched into
//! *trash* nodes and continues past them, and surfaces the specific
//! predicate failures that made a parse imperfect.  Results are ranked by a
//! dominance policy over error count, completeness, size, and unresolved
//! tests, and all tied-best parses are returned.

// rust lints we want
#![warn(
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_docs,
    missing_debug_implementations,
    future_incompatible,
    rust_2018_idioms,
    trivial_numeric_casts,
    variant_size_differences,
    unreachable_pub,
    unused
)]
// all the clippy
#![warn(clippy::all, clippy::pedantic)]
// all the clippy lints we don't want
#![allow(
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::inline_always,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::option_if_let_else,
    clippy::redundant_pub_crate,
    clippy::semicolon_if_nothing_returned,
    clippy::shadow_unrelated,
    clippy::too_many_lines
)]

mod hopper;
mod lex;
mod loopck;
mod names;
mod rule;
mod search;
mod segment;
mod tree;
mod util;

pub mod diag;
pub mod grammar;
pub mod node;
pub mod parse;
pub mod predicate;

#[cfg(test)]
mod lex_tests;
#[cfg(test)]
mod parse_tests;
#[cfg(test)]
mod segment_tests;

pub use diag::Diagnostic;
pub use grammar::{Grammar, ParseOptions, RuleOptions};
pub use hopper::Filter;
pub use names::Symbol;
pub use node::{Node, NodeMut, Position, Span};
pub use parse::Parse;
pub use predicate::{Outcome, PredicateKind, Value};
