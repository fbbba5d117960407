use crate::lex;
use crate::Grammar;
use std::sync::Arc;

fn tokenize(g: &mut Grammar, text: &str) -> Vec<String> {
    g.commit().unwrap();
    let text: Arc<str> = Arc::from(text);
    lex::tokenize(g, &text)
        .unwrap()
        .iter()
        .map(|parse| parse.summary().to_string())
        .collect()
}

#[test]
fn test_single_variant() {
    let mut g = Grammar::new();
    g.leaf("a", "a").unwrap();
    g.leaf("b", "b").unwrap();
    assert_eq!(tokenize(&mut g, "a b"), vec!["a;_ws;b"]);
}

#[test]
fn test_overlapping_leaves_branch() {
    let mut g = Grammar::new();
    g.leaf("ab", "ab").unwrap();
    g.leaf("a", "a").unwrap();
    g.leaf("b", "b").unwrap();
    let variants = tokenize(&mut g, "ab");
    assert_eq!(variants, vec!["ab", "a;b"]);
}

#[test]
fn test_trash_boxes_unmatched_characters() {
    let mut g = Grammar::new();
    g.leaf("a", "a").unwrap();
    let variants = tokenize(&mut g, "a@#a");
    assert_eq!(variants, vec!["a;_trash;a"]);
}

#[test]
fn test_trash_runs_to_end() {
    let mut g = Grammar::new();
    g.leaf("a", "a").unwrap();
    let variants = tokenize(&mut g, "a@#");
    assert_eq!(variants, vec!["a;_trash"]);
}

#[test]
fn test_all_trash() {
    let mut g = Grammar::new();
    g.leaf("a", "a").unwrap();
    let variants = tokenize(&mut g, "@#!");
    assert_eq!(variants, vec!["_trash"]);
}

#[test]
fn test_empty_input() {
    let mut g = Grammar::new();
    g.leaf("a", "a").unwrap();
    assert_eq!(tokenize(&mut g, ""), vec![""]);
}

#[test]
fn test_leaf_precondition_rejects_match() {
    let mut g = Grammar::new();
    g.precondition("not_at_start", |_, start, _, _, _| start > 0)
        .unwrap();
    g.leaf_with(
        "a",
        "a",
        crate::RuleOptions {
            preconditions: &["not_at_start"],
            ..crate::RuleOptions::default()
        },
    )
    .unwrap();
    let variants = tokenize(&mut g, "aa");
    // the first character is boxed; the second is a leaf
    assert_eq!(variants, vec!["_trash;a"]);
}

#[test]
fn test_leaf_spans_cover_input() {
    let mut g = Grammar::new();
    g.leaf("w", "[a-z]+").unwrap();
    g.leaf("d", r"\d+").unwrap();
    g.commit().unwrap();
    let text: Arc<str> = Arc::from("ab 12 cd");
    for parse in lex::tokenize(&g, &text).unwrap() {
        let roots: Vec<_> = parse.roots().collect();
        assert_eq!(roots.first().unwrap().start(), 0);
        assert_eq!(roots.last().unwrap().end(), text.len());
        for pair in roots.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
    }
}
