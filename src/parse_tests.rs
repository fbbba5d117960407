use crate::predicate::{Outcome, Value};
use crate::{Grammar, ParseOptions, RuleOptions};

fn sentence_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.rule("S", "NP VP").unwrap();
    g.rule("NP", "D N").unwrap();
    g.rule("VP", "V").unwrap();
    g.leaf("D", "the").unwrap();
    g.leaf("N", "cat").unwrap();
    g.leaf("V", "sat").unwrap();
    g
}

fn catalan_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.rule("a", "a a").unwrap();
    g.leaf("a", r"\S+").unwrap();
    g
}

#[test]
fn test_sentence() {
    let mut g = sentence_grammar();
    let parses = g.parse("the cat sat").unwrap();
    assert_eq!(parses.len(), 1);
    let parse = &parses[0];
    assert_eq!(parse.summary(), "S[NP[D,_ws,N],_ws,VP[V]]");
    assert_eq!(parse.length(), 1);
    assert_eq!(parse.size(), 8);
    assert!(parse.is_success());
    assert!(!parse.has_errors());
}

#[test]
fn test_ambiguous_reductions() {
    let mut g = catalan_grammar();
    let parses = g.parse("a b c").unwrap();
    assert_eq!(parses.len(), 2);
    let mut summaries: Vec<&str> = parses.iter().map(crate::Parse::summary).collect();
    summaries.sort_unstable();
    assert_eq!(
        summaries,
        vec!["a[a,_ws,a[a,_ws,a]]", "a[a[a,_ws,a],_ws,a]"]
    );
    for parse in &parses {
        assert_eq!(parse.length(), 1);
    }
}

#[test]
fn test_catalan_counts() {
    // C(n-1) successful parses over n leaves
    let mut g = catalan_grammar();
    assert_eq!(g.parse("w x").unwrap().len(), 1);
    let mut g = catalan_grammar();
    assert_eq!(g.parse("w x y").unwrap().len(), 2);
    let mut g = catalan_grammar();
    assert_eq!(g.parse("w x y z").unwrap().len(), 5);
}

#[test]
fn test_balanced_precondition() {
    let mut g = Grammar::new();
    g.precondition("balanced", |_, _, _, _, children| {
        let sizes: Vec<usize> = children
            .iter()
            .filter(|child| child.is_significant())
            .map(|child| child.size())
            .collect();
        sizes.len() == 2 && sizes[0] == sizes[1]
    })
    .unwrap();
    g.rule_with(
        "a",
        "a{2}",
        RuleOptions {
            preconditions: &["balanced"],
            ..RuleOptions::default()
        },
    )
    .unwrap();
    g.leaf("a", r"\S+").unwrap();
    let parses = g.parse("foo bar baz plugh").unwrap();
    assert_eq!(parses.len(), 1);
    assert_eq!(parses[0].summary(), "a[a[a,_ws,a],_ws,a[a,_ws,a]]");
    for node in parses[0].nodes().filter(|node| node.is_nonterminal()) {
        let sizes: Vec<usize> = node
            .children()
            .filter(|child| child.is_significant())
            .map(|child| child.size())
            .collect();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0], sizes[1]);
    }
}

#[test]
fn test_failed_node_test_survives() {
    let mut g = Grammar::new();
    g.node_test("not_cat", |node| {
        if node.text() == "cat" {
            Outcome::Fail
        } else {
            Outcome::Pass
        }
    })
    .unwrap();
    g.rule("S", "W").unwrap();
    g.leaf_with(
        "W",
        "[a-z]+",
        RuleOptions {
            tests: &["not_cat"],
            ..RuleOptions::default()
        },
    )
    .unwrap();
    // a failed leaf cannot become the child of S, but the parse survives
    let parses = g.parse("cat").unwrap();
    assert_eq!(parses.len(), 1);
    let parse = &parses[0];
    assert_eq!(parse.summary(), "W");
    assert!(parse.has_errors());
    assert_eq!(parse.incorrectness_count(), 1);
    let root = parse.roots().next().unwrap();
    assert!(root.failed_test());
    assert_eq!(root.attributes().failures().len(), 1);
    assert_eq!(root.attributes().failures()[0].test(), "not_cat");

    // an unoffending word reduces normally and records the pass
    let mut g2 = Grammar::new();
    g2.node_test("not_cat", |node| {
        if node.text() == "cat" {
            Outcome::Fail
        } else {
            Outcome::Pass
        }
    })
    .unwrap();
    g2.rule("S", "W").unwrap();
    g2.leaf_with(
        "W",
        "[a-z]+",
        RuleOptions {
            tests: &["not_cat"],
            ..RuleOptions::default()
        },
    )
    .unwrap();
    let parse = g2.first("dog").unwrap();
    assert_eq!(parse.summary(), "S[W]");
    let leaf = parse.nodes().find(|node| node.name() == "W").unwrap();
    assert_eq!(leaf.attributes().satisfied().len(), 1);
}

#[test]
fn test_structural_test_resolves() {
    let mut g = Grammar::new();
    g.ancestor_test("in_np", |ancestor, _| {
        if ancestor.name() == "NP" {
            Outcome::Pass
        } else {
            Outcome::Pending
        }
    })
    .unwrap();
    g.rule("S", "NP").unwrap();
    g.rule("NP", "D N").unwrap();
    g.leaf_with(
        "D",
        "the",
        RuleOptions {
            tests: &["in_np"],
            ..RuleOptions::default()
        },
    )
    .unwrap();
    g.leaf("N", "cat").unwrap();
    let parse = g.first("the cat").unwrap();
    assert_eq!(parse.summary(), "S[NP[D,_ws,N]]");
    assert_eq!(parse.pending_count(), 0);
    assert!(parse.is_success());
    let np = parse.nodes().find(|node| node.name() == "NP").unwrap();
    assert_eq!(np.attributes().satisfied_ancestor().len(), 1);
    assert_eq!(np.attributes().satisfied_ancestor()[0].test(), "in_np");
    let d = parse.nodes().find(|node| node.name() == "D").unwrap();
    assert_eq!(d.attributes().satisfied_descendant().len(), 1);
    assert_eq!(d.attributes().satisfied_descendant()[0].peer(), np.position());
}

#[test]
fn test_structural_test_stays_pending() {
    let mut g = Grammar::new();
    g.ancestor_test("never_settles", |_, _| Outcome::Pending).unwrap();
    g.rule("NP", "D N").unwrap();
    g.leaf_with(
        "D",
        "the",
        RuleOptions {
            tests: &["never_settles"],
            ..RuleOptions::default()
        },
    )
    .unwrap();
    g.leaf("N", "cat").unwrap();
    let parse = g.first("the cat").unwrap();
    assert_eq!(parse.summary(), "NP[D,_ws,N]");
    assert_eq!(parse.pending_count(), 1);
    assert!(parse.is_failure());
    let root = parse.roots().next().unwrap();
    assert!(root.has_pending_tests());
    assert_eq!(root.attributes().pending()[0].name(), "never_settles");
}

#[test]
fn test_structural_test_failure_marks_both_ends() {
    let mut g = Grammar::new();
    g.ancestor_test("reject", |ancestor, _| {
        if ancestor.name() == "NP" {
            Outcome::Fail
        } else {
            Outcome::Pending
        }
    })
    .unwrap();
    g.rule("NP", "D N").unwrap();
    g.leaf_with(
        "D",
        "the",
        RuleOptions {
            tests: &["reject"],
            ..RuleOptions::default()
        },
    )
    .unwrap();
    g.leaf("N", "cat").unwrap();
    let parses = g.parse("the cat").unwrap();
    assert_eq!(parses.len(), 1);
    let parse = &parses[0];
    assert_eq!(parse.summary(), "NP[D,_ws,N]");
    assert!(parse.has_errors());
    let np = parse.nodes().find(|node| node.name() == "NP").unwrap();
    assert!(np.failed_test());
    assert_eq!(np.attributes().failed_ancestor().len(), 1);
    let d = parse.nodes().find(|node| node.name() == "D").unwrap();
    assert!(d.failed_test());
    assert_eq!(d.attributes().failed_descendant().len(), 1);
    assert_eq!(d.attributes().failed_descendant()[0].test(), "reject");
}

#[test]
fn test_unary_loop_detection() {
    let mut g = Grammar::new();
    g.rule("a", "w | b").unwrap();
    g.rule("b", "a").unwrap();
    g.leaf("w", "x").unwrap();
    let parses = g.parse("x").unwrap();
    assert_eq!(parses.len(), 1);
    assert_eq!(parses[0].summary(), "b[a[w]]");
    // no unary chain repeats a name
    for node in parses[0].nodes() {
        let mut names = vec![];
        let mut current = node;
        loop {
            names.push(current.name().to_string());
            let children: Vec<_> = current.children().collect();
            if children.len() == 1 {
                current = children[0];
            } else {
                break;
            }
        }
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names, deduped);
    }
}

#[test]
fn test_processor_stashes_value() {
    let mut g = Grammar::new();
    g.processor("amount", |node| {
        let digits: i64 = node
            .node()
            .text()
            .trim_start_matches('$')
            .parse()
            .unwrap_or(0);
        node.set("amount", digits);
    })
    .unwrap();
    g.rule_with(
        "money",
        "'$' digits",
        RuleOptions {
            process: Some("amount"),
            ..RuleOptions::default()
        },
    )
    .unwrap();
    g.leaf("digits", r"\d+").unwrap();
    let parse = g.first("$12").unwrap();
    let root = parse.roots().next().unwrap();
    assert_eq!(root.attributes().get("amount"), Some(&Value::Int(12)));
}

#[test]
fn test_processor_skipped_on_failure() {
    let mut g = Grammar::new();
    g.node_test("veto", |_| Outcome::Fail).unwrap();
    g.processor("mark", |node| node.set("ran", true)).unwrap();
    g.leaf_with(
        "a",
        "a",
        RuleOptions {
            tests: &["veto"],
            process: Some("mark"),
            ..RuleOptions::default()
        },
    )
    .unwrap();
    let parse = g.first("a").unwrap();
    let root = parse.roots().next().unwrap();
    assert!(root.failed_test());
    assert_eq!(root.attributes().get("ran"), None);
}

#[test]
fn test_json_like_grammar_builds_value() {
    let mut g = Grammar::new();
    g.ancestor_test("in_object", |ancestor, _| {
        if ancestor.name() == "object" {
            Outcome::Pass
        } else {
            Outcome::Pending
        }
    })
    .unwrap();
    g.processor("pair_value", |node| {
        let view = node.node();
        let key = view
            .children()
            .find(|child| child.name() == "str")
            .map(|child| child.text().trim_matches('"').to_string());
        let value = view
            .children()
            .find(|child| child.name() == "num")
            .and_then(|child| child.text().parse::<i64>().ok());
        if let (Some(key), Some(value)) = (key, value) {
            node.set("key", key);
            node.set("value", value);
        }
    })
    .unwrap();
    g.processor("object_value", |node| {
        let mut map = std::collections::BTreeMap::new();
        for pair in node.node().descendants().filter(|d| d.name() == "pair") {
            if let (Some(Value::Str(key)), Some(value)) =
                (pair.attributes().get("key"), pair.attributes().get("value"))
            {
                map.insert(key.clone(), value.clone());
            }
        }
        node.set("object", Value::Map(map));
    })
    .unwrap();
    g.leaf("str", "\"[a-z]+\"").unwrap();
    g.leaf("num", r"\d+").unwrap();
    g.rule_with(
        "pair",
        "str ':' num",
        RuleOptions {
            tests: &["in_object"],
            process: Some("pair_value"),
            ..RuleOptions::default()
        },
    )
    .unwrap();
    g.rule("more", "',' pair").unwrap();
    g.rule_with(
        "object",
        "'{' pair more* '}'",
        RuleOptions {
            process: Some("object_value"),
            ..RuleOptions::default()
        },
    )
    .unwrap();
    let parse = g.first("{\"a\":1,\"b\":2}").unwrap();
    assert_eq!(parse.pending_count(), 0);
    assert!(parse.is_success());
    let root = parse.roots().next().unwrap();
    assert_eq!(root.name(), "object");
    let Some(Value::Map(map)) = root.attributes().get("object") else {
        panic!("object processor did not run");
    };
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("a"), Some(&Value::Int(1)));
    assert_eq!(map.get("b"), Some(&Value::Int(2)));
}

#[test]
fn test_trash_keeps_parse_alive() {
    let mut g = sentence_grammar();
    let parses = g.parse("the cat zzz").unwrap();
    assert_eq!(parses.len(), 1);
    let parse = &parses[0];
    assert!(parse.has_errors());
    assert_eq!(parse.incorrectness_count(), 1);
    let trash = parse.nodes().find(|node| node.is_trash()).unwrap();
    assert_eq!(trash.text(), "zzz");
    assert!(trash.is_boundary());
    assert!(trash.parent().is_none());
    // the lexable prefix still reduced as far as it could
    assert!(parse.summary().starts_with("NP[D,_ws,N]"));
}

#[test]
fn test_parse_bounded_by_n() {
    let mut g = catalan_grammar();
    let parses = g
        .parse_with(
            "w x y",
            &ParseOptions {
                n: Some(1),
                ..ParseOptions::default()
            },
        )
        .unwrap();
    assert_eq!(parses.len(), 1);
}

#[test]
fn test_empty_filters_disable_dominance() {
    let mut g = sentence_grammar();
    let parses = g
        .parse_with(
            "the cat sat",
            &ParseOptions {
                filters: vec![],
                n: None,
            },
        )
        .unwrap();
    // every maximal-but-unreducible forest is returned, not just the winner
    assert!(parses.iter().any(|parse| parse.summary() == "S[NP[D,_ws,N],_ws,VP[V]]"));
    assert!(!parses.is_empty());
}

#[test]
fn test_idempotent_parsing() {
    let mut g = catalan_grammar();
    let first: Vec<String> = g
        .parse("a b c")
        .unwrap()
        .iter()
        .map(|parse| parse.summary().to_string())
        .collect();
    let second: Vec<String> = g
        .parse("a b c")
        .unwrap()
        .iter()
        .map(|parse| parse.summary().to_string())
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_universal_properties() {
    let mut g = sentence_grammar();
    let text = "the cat sat";
    let parses = g.parse(text).unwrap();
    for parse in &parses {
        let roots: Vec<_> = parse.roots().collect();
        assert_eq!(roots.first().unwrap().start(), 0);
        assert_eq!(roots.last().unwrap().end(), text.len());
        for pair in roots.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start());
        }
        let mut positions = vec![];
        for node in parse.nodes() {
            // sizes and heights agree with the recursive definitions
            let children: Vec<_> = node.children().collect();
            if children.is_empty() {
                assert_eq!(node.size(), 1);
                assert_eq!(node.height(), 0);
            } else {
                let sum: usize = children.iter().map(|child| child.size()).sum();
                assert_eq!(node.size(), sum + 1);
                assert_eq!(node.height(), children[0].height() + 1);
                assert_eq!(node.start(), children.first().unwrap().start());
                assert_eq!(node.end(), children.last().unwrap().end());
            }
            assert!(node.start() < node.end());
            positions.push(node.position());
        }
        let total = positions.len();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions.len(), total, "positions are unique in a parse");
    }
}

#[test]
fn test_node_navigation() {
    let mut g = sentence_grammar();
    let parse = g.first("the cat sat").unwrap();
    assert_eq!(parse.nodes().count(), 8);
    let s = parse.roots().next().unwrap();
    assert_eq!(s.name(), "S");
    assert_eq!(s.height(), 2);
    assert_eq!(s.depth(), 0);
    let child_names: Vec<&str> = s.children().map(|child| child.name()).collect();
    assert_eq!(child_names, vec!["NP", "_ws", "VP"]);

    let d = parse.nodes().find(|node| node.name() == "D").unwrap();
    assert_eq!(d.text(), "the");
    assert_eq!(d.text_before(), "");
    assert_eq!(d.text_after(), " cat sat");
    assert_eq!(d.full_text(), "the cat sat");
    assert_eq!(d.depth(), 2);
    assert_eq!(d.root().name(), "S");
    assert_eq!(d.parent().unwrap().name(), "NP");
    assert!(d.is_first_child());
    assert!(!d.is_last_child());
    assert!(d.contains(1));
    assert!(!d.contains(3));

    let np = parse.nodes().find(|node| node.name() == "NP").unwrap();
    assert_eq!(np.size(), 4);
    assert_eq!(np.descendants().count(), 3);
    assert_eq!(np.leaves().count(), 3);
    assert_eq!(np.siblings().len(), 3);
    assert_eq!(np.sibling_index(), 0);
    assert_eq!(np.later_siblings().len(), 2);
    assert_eq!(np.prior_siblings().len(), 0);

    let vp = parse.nodes().find(|node| node.name() == "VP").unwrap();
    assert_eq!(vp.prior().count(), 5);
    assert_eq!(vp.later().count(), 0);
    assert_eq!(vp.sibling_index(), 2);

    // positions resolve through the parse and through subtrees
    assert_eq!(parse.get(d.position()).unwrap().name(), "D");
    assert_eq!(s.find(np.position()).unwrap().name(), "NP");
    let ancestor_names: Vec<&str> = d.ancestors().map(|node| node.name()).collect();
    assert_eq!(ancestor_names, vec!["NP", "S"]);
}

#[test]
fn test_first_returns_best() {
    let mut g = sentence_grammar();
    let parse = g.first("the cat sat").unwrap();
    assert_eq!(parse.summary(), "S[NP[D,_ws,N],_ws,VP[V]]");
}

#[test]
fn test_report_names_trash() {
    let mut g = sentence_grammar();
    let parses = g.parse("the cat @@@").unwrap();
    let reports = crate::diag::report(&parses[0]);
    assert!(!reports.is_empty());
    assert!(reports
        .iter()
        .any(|report| report.contains("no terminal rule matched")));
}
