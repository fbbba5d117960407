//! Datatypes to represent diagnostics emitted by grammar validation and
//! parsing.
//!
//! This includes an enum-based representation suited for programmatic
//! interpretation and testing, as well as a rendering of *data* errors
//! (trash runs, failed tests, unresolved structural tests) as annotated
//! snippets over the input text for human-readable output.

use crate::node::Span;
use crate::parse::Parse;
use crate::predicate::PredicateKind;
use annotate_snippets::{Level, Message, Renderer, Snippet};
use std::error::Error;
use std::fmt;
use typed_arena::Arena;

/// List of all diagnostic codes raised while declaring or committing a
/// grammar.  These are *configuration* errors: they fail the `parse` call
/// that triggered them and are fatal for the grammar.  Data errors never
/// surface here; they are boxed into the parse itself (see [`annotate`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A predicate name resolved to a predicate of the wrong shape for the
    /// slot referencing it.
    BadArity {
        /// The predicate name.
        name: String,
        /// The kind the referencing slot requires.
        expected: PredicateKind,
        /// The kind the name is actually registered under.
        found: PredicateKind,
    },
    /// A leaf pattern failed to compile; fields are the leaf name and the
    /// regex error text.
    BadPattern(String, String),
    /// An atom carried an unparseable repetition suffix; fields are the
    /// atom token and the rule name.
    BadRepetitionSuffix(String, String),
    /// A rule body can match zero tokens, so reducing by it could never
    /// advance the search; field is the rule name.
    EmptyConsumption(String),
    /// A declaration arrived after the grammar's first parse.
    FrozenAfterParse,
    /// An atom token matched neither the identifier shape nor a quoted
    /// literal; fields are the atom token and the rule name.
    MalformedAtom(String, String),
    /// The grammar defines no terminal rules at all.
    NoLeaves,
    /// A rule or leaf references a precondition name that was never
    /// registered; fields are the owner and the name.
    UndefinedPrecondition(String, String),
    /// A rule or leaf references a processor name that was never
    /// registered; fields are the owner and the name.
    UndefinedProcessor(String, String),
    /// Some atoms seek symbols with no rule or leaf definition; entries are
    /// `(rule, symbol)` pairs.
    UndefinedSymbols(Vec<(String, String)>),
    /// A rule or leaf references a test name that was never registered;
    /// fields are the owner and the name.
    UndefinedTest(String, String),
    /// A test returned a result outside its contract at parse time; fields
    /// are the test name and a description of what came back.
    UnexpectedTestResult(String, String),
    /// A dominance-filter name did not parse; field is the offending name.
    UnknownFilter(String),
}

use self::Diagnostic::*;

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadArity {
                name,
                expected,
                found,
            } => write!(
                f,
                "predicate '{name}' is registered as a {found} but is used as a {expected}"
            ),
            BadPattern(leaf, error) => {
                write!(f, "pattern for leaf '{leaf}' does not compile: {error}")
            }
            BadRepetitionSuffix(token, rule) => write!(
                f,
                "atom '{token}' in rule '{rule}' has a bad repetition suffix"
            ),
            EmptyConsumption(rule) => write!(
                f,
                "rule '{rule}' can match zero tokens and so can never be applied"
            ),
            FrozenAfterParse => {
                f.write_str("grammars may not be modified once they have parsed something")
            }
            MalformedAtom(token, rule) => {
                write!(f, "cannot parse atom '{token}' in rule '{rule}'")
            }
            NoLeaves => f.write_str("the grammar defines no terminal rules"),
            UndefinedPrecondition(owner, name) => {
                write!(f, "'{owner}' references unregistered precondition '{name}'")
            }
            UndefinedProcessor(owner, name) => {
                write!(f, "'{owner}' references unregistered processor '{name}'")
            }
            UndefinedSymbols(missing) => {
                f.write_str("atoms seek symbols that have no definition:")?;
                for (rule, symbol) in missing {
                    write!(f, " {symbol} (in {rule})")?;
                }
                Ok(())
            }
            UndefinedTest(owner, name) => {
                write!(f, "'{owner}' references unregistered test '{name}'")
            }
            UnexpectedTestResult(test, what) => {
                write!(f, "test '{test}' returned an unexpected result: {what}")
            }
            UnknownFilter(name) => write!(f, "unknown dominance filter '{name}'"),
        }
    }
}

impl Error for Diagnostic {}

/// One data error surfaced by a parse, ready for snippet rendering.
struct DataError {
    level: Level,
    span: Span,
    label: String,
}

fn data_errors(parse: &Parse) -> Vec<DataError> {
    let mut errors = vec![];
    for node in parse.nodes() {
        if node.is_trash() {
            errors.push(DataError {
                level: Level::Error,
                span: node.span(),
                label: "no terminal rule matched these characters".to_string(),
            });
        }
        for record in node.attributes().failures() {
            errors.push(DataError {
                level: Level::Warning,
                span: node.span(),
                label: format!("node test '{}' failed here", record.test()),
            });
        }
        for record in node.attributes().failed_ancestor() {
            errors.push(DataError {
                level: Level::Warning,
                span: node.span(),
                label: format!(
                    "structural test '{}' failed against this ancestor",
                    record.test()
                ),
            });
        }
    }
    for root in parse.roots() {
        for pending in root.attributes().pending() {
            errors.push(DataError {
                level: Level::Note,
                span: root.span(),
                label: format!("structural test '{}' is still unresolved", pending.name()),
            });
        }
    }
    errors.sort_by_key(|e| (e.span.start, e.span.end));
    errors
}

/// Bounds of the line run covering `span`: the 1-based number of its first
/// line and the byte range from that line's start to the last line's end.
fn line_bounds(text: &str, span: Span) -> (usize, usize, usize) {
    let start = text[..span.start.min(text.len())]
        .rfind('\n')
        .map_or(0, |i| i + 1);
    let line_number = text[..start].matches('\n').count() + 1;
    let end = text[span.end.min(text.len())..]
        .find('\n')
        .map_or(text.len(), |i| span.end + i);
    (line_number, start, end)
}

/// Converts a parse's data errors to annotated messages over its text, in
/// continuation-passing style so the borrowed snippets never outlive their
/// backing storage.
pub fn annotate<T>(parse: &Parse, f: impl for<'a> FnOnce(Message<'a>) -> T + Copy) -> Vec<T> {
    let text = parse.text();
    data_errors(parse)
        .iter()
        .map(|error| {
            let arena: Arena<String> = Arena::new();
            let (line_number, source_start, source_end) = line_bounds(text, error.span);
            let annotation = error
                .level
                .span(error.span.start - source_start..error.span.end - source_start)
                .label(arena.alloc(error.label.clone()));
            let snippet = Snippet::source(&text[source_start..source_end])
                .line_start(line_number)
                .fold(true)
                .annotation(annotation);
            f(error.level.title("imperfect parse").snippet(snippet))
        })
        .collect()
}

/// Renders every data error of `parse` as plain text, one rendered snippet
/// per error.
#[must_use]
pub fn report(parse: &Parse) -> Vec<String> {
    let renderer = Renderer::plain();
    annotate(parse, |message| renderer.render(message).to_string())
}
