use crate::Grammar;

fn sentence_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.rule("S", "W W").unwrap();
    g.leaf("W", "[A-Za-z]+").unwrap();
    g.boundary("stop", r"\.").unwrap();
    g
}

#[test]
fn test_boundaries_split_the_search() {
    let mut g = sentence_grammar();
    let parses = g.parse("One sentence. Another sentence.").unwrap();
    assert_eq!(parses.len(), 1);
    let parse = &parses[0];
    assert_eq!(parse.length(), 5);
    assert_eq!(
        parse.summary(),
        "S[W,_ws,W];stop;_ws;S[W,_ws,W];stop"
    );
    assert_eq!(
        parse.roots().filter(|root| root.is_boundary()).count(),
        2
    );
    assert!(parse.is_success());
}

#[test]
fn test_boundary_never_becomes_a_child() {
    let mut g = sentence_grammar();
    let parses = g.parse("One sentence. Another sentence.").unwrap();
    for node in parses[0].nodes() {
        if node.is_boundary() {
            assert!(node.parent().is_none());
        }
    }
}

#[test]
fn test_adjacent_boundaries() {
    let mut g = Grammar::new();
    g.leaf("w", "[ab]").unwrap();
    g.boundary("stop", r"\.").unwrap();
    let parses = g.parse("a..b").unwrap();
    assert_eq!(parses.len(), 1);
    assert_eq!(parses[0].summary(), "w;stop;stop;w");
    assert_eq!(parses[0].length(), 4);
}

#[test]
fn test_boundary_at_edges() {
    let mut g = Grammar::new();
    g.leaf("w", "[ab]+").unwrap();
    g.boundary("stop", r"\.").unwrap();
    let parses = g.parse(".ab.").unwrap();
    assert_eq!(parses.len(), 1);
    assert_eq!(parses[0].summary(), "stop;w;stop");
}

#[test]
fn test_empty_input_parses() {
    let mut g = Grammar::new();
    g.leaf("w", "[ab]+").unwrap();
    let parses = g.parse("").unwrap();
    assert_eq!(parses.len(), 1);
    assert_eq!(parses[0].length(), 0);
    assert_eq!(parses[0].summary(), "");
    assert!(parses[0].is_success());
}

#[test]
fn test_segments_search_independently() {
    // an error in one segment does not prevent reduction in another
    let mut g = Grammar::new();
    g.rule("S", "w w").unwrap();
    g.leaf("w", "[a-z]+").unwrap();
    g.boundary("stop", r"\.").unwrap();
    let parses = g.parse("ab cd. @@@. ef gh").unwrap();
    assert_eq!(parses.len(), 1);
    let parse = &parses[0];
    assert!(parse.has_errors());
    assert_eq!(
        parse.roots().filter(|root| root.is_trash()).count(),
        1
    );
    assert_eq!(
        parse
            .nodes()
            .filter(|node| node.name() == "S")
            .count(),
        2
    );
}

#[test]
fn test_lex_variants_merge_per_interval() {
    // two tokenizations of the same stretch compete inside one segment
    let mut g = Grammar::new();
    g.rule("S", "ab").unwrap();
    g.leaf("ab", "ab").unwrap();
    g.leaf("a", "a").unwrap();
    g.leaf("b", "b").unwrap();
    let parses = g.parse("ab").unwrap();
    assert_eq!(parses.len(), 1);
    assert_eq!(parses[0].summary(), "S[ab]");
}
