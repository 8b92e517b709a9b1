//! Parser integration tests.
//!
//! Each corpus entry is parsed with both strategies; the trees must agree
//! modulo node ids, and the node-id map invariants must hold after every
//! parse, successful or not.

use powerquery_grammar::EntryPoint;
use powerquery_grammar::NodeKind;
use powerquery_grammar::ParseErrorKind;
use powerquery_grammar::ParseFailure;
use powerquery_grammar::ParseState;
use powerquery_grammar::ParserKind;
use powerquery_grammar::parse;
use powerquery_grammar::tokenize;
use pretty_assertions::assert_eq;

/// Parses the given source, returning the final state and the outcome.
fn run(
    source: &str,
    parser: ParserKind,
    entry_point: EntryPoint,
) -> (ParseState, Result<powerquery_grammar::NodeId, ParseFailure>) {
    let tokens = tokenize(source).expect("source should lex");
    let mut state = ParseState::new(tokens);
    let result = parse(&mut state, parser, entry_point);
    (state, result)
}

/// Parses an expression document, asserting success.
fn parse_ok(source: &str, parser: ParserKind) -> ParseState {
    let (state, result) = run(source, parser, EntryPoint::Document);
    if let Err(e) = &result {
        panic!("`{source}` should parse, but failed with: {e}");
    }
    state
}

/// Sources that must parse successfully and identically under both
/// strategies.
const CORPUS: &[&str] = &[
    "1",
    "1 + 2",
    "1 + 2 * 3",
    "1 * 2 + 3",
    "(1 + 2) * 3",
    "1 - 2 - 3",
    "\"a\" & \"b\"",
    "1 < 2 = 3 > 2",
    "true and false or true",
    "not true",
    "- - 1",
    "x ?? y ?? z",
    "1 meta [doc = \"one\"]",
    "x as number",
    "x as nullable number",
    "1 is number",
    "if true then 1 else 2",
    "if x then y else if a then b else c",
    "let a = 1 in a",
    "let a = 1, b = a + 1 in b",
    "let f = @f in f",
    "each _",
    "each [a]",
    "each _[a]",
    "try 1/0",
    "try 1/0 otherwise 0",
    "try f() catch (e) => 0",
    "error \"boom\"",
    "(x) => x",
    "(x, y) => x + y",
    "(optional x) => x",
    "(x as number, optional y as text) => x",
    "(x) as number => x + 1",
    "() => 1",
    "f(1)",
    "f(1)(2)",
    "f(1, 2){0}[a]?",
    "xs{0}",
    "xs{0}?",
    "[a = 1]",
    "[a = 1, b = a + 1]",
    "[]",
    "[a = 1][a]",
    "r[[a], [b]]",
    "r[[a], [b]]?",
    "{}",
    "{1, 2}",
    "{1..2, 3}",
    "#date(2024, 1, 1)",
    "#table({}, {})",
    "Table.AddColumn(t, \"c\", each [a])",
    "...",
    "type number",
    "type nullable text",
    "type {number}",
    "type [a = number, optional b = text]",
    "type [a = number, ...]",
    "type table [a = number]",
    "type function (x as number) as number",
    "0x10 + 1.5e2 + #nan",
];

#[test]
fn strategies_agree_on_the_corpus() {
    for source in CORPUS {
        let descent = parse_ok(source, ParserKind::RecursiveDescent);
        let combinatorial = parse_ok(source, ParserKind::Combinatorial);
        assert_eq!(
            descent.map().canonical_text(),
            combinatorial.map().canonical_text(),
            "strategies disagree on `{source}`"
        );
    }
}

#[test]
fn parsing_is_deterministic() {
    for source in CORPUS {
        for parser in [ParserKind::RecursiveDescent, ParserKind::Combinatorial] {
            let first = parse_ok(source, parser);
            let second = parse_ok(source, parser);
            assert_eq!(
                first.map().canonical_text(),
                second.map().canonical_text(),
                "`{source}` parsed differently on a second run"
            );
        }
    }
}

#[test]
fn invariants_hold_after_every_parse() {
    for source in CORPUS {
        for parser in [ParserKind::RecursiveDescent, ParserKind::Combinatorial] {
            let (state, result) = run(source, parser, EntryPoint::Document);
            assert!(result.is_ok(), "`{source}` should parse");
            state.map().validate().unwrap_or_else(|e| {
                panic!("invariants violated for `{source}`: {e}");
            });
            // A successful parse leaves no in-flight nodes.
            assert_eq!(state.map().context_nodes().count(), 0);
        }
    }
}

/// Sources that must fail, and the invariants that must hold over the
/// partial tree.
const ERROR_CORPUS: &[&str] = &[
    "1 +",
    "if true then",
    "let a = in a",
    "let a = 1 in",
    "[a = 1",
    "[a = ",
    "(x, ",
    "f(1",
    "{1, ",
    "1 as ",
    "[x = 1, y = 2][",
    "x[",
    "try",
    "each",
    "(optional x, y) => 1",
    "1 2",
];

#[test]
fn partial_trees_keep_their_invariants() {
    for source in ERROR_CORPUS {
        for parser in [ParserKind::RecursiveDescent, ParserKind::Combinatorial] {
            let (state, result) = run(source, parser, EntryPoint::Document);
            assert!(result.is_err(), "`{source}` should not parse");
            state.map().validate().unwrap_or_else(|e| {
                panic!("invariants violated for `{source}`: {e}");
            });
        }
    }
}

#[test]
fn precedence_shapes_the_tree() {
    let state = parse_ok("1 + 2 * 3", ParserKind::RecursiveDescent);
    assert_eq!(
        state.map().canonical_text(),
        "ArithmeticExpression\n\
         \x20 LiteralExpression Numeric `1`\n\
         \x20 Constant Plus\n\
         \x20 ArithmeticExpression\n\
         \x20   LiteralExpression Numeric `2`\n\
         \x20   Constant Asterisk\n\
         \x20   LiteralExpression Numeric `3`\n"
    );
}

#[test]
fn chains_associate_left() {
    let state = parse_ok("1 - 2 - 3", ParserKind::Combinatorial);
    assert_eq!(
        state.map().canonical_text(),
        "ArithmeticExpression\n\
         \x20 ArithmeticExpression\n\
         \x20   LiteralExpression Numeric `1`\n\
         \x20   Constant Minus\n\
         \x20   LiteralExpression Numeric `2`\n\
         \x20 Constant Minus\n\
         \x20 LiteralExpression Numeric `3`\n"
    );
}

#[test]
fn field_access_after_record_is_a_selector_context() {
    let (state, result) = run(
        "[x = 1, y = 2][",
        ParserKind::RecursiveDescent,
        EntryPoint::Document,
    );
    let error = match result.expect_err("source should not parse") {
        ParseFailure::Syntax(error) => error,
        other => panic!("expected a syntax error, got {other:?}"),
    };
    assert_eq!(*error.kind(), ParseErrorKind::ExpectedGeneralizedIdentifier);

    let root = state.map().root().expect("a root should exist");
    assert_eq!(root.kind(), NodeKind::RecursivePrimaryExpression);
    assert!(!root.is_ast(), "the root should still be in flight");
    assert!(
        state
            .map()
            .context_nodes()
            .any(|c| c.kind == NodeKind::FieldSelector),
        "a field selector context should be in flight"
    );
}

#[test]
fn unterminated_parameter_list_keeps_the_function_interpretation() {
    let (state, result) = run("(x, ", ParserKind::RecursiveDescent, EntryPoint::Document);
    assert!(result.is_err());
    let root = state.map().root().expect("a root should exist");
    assert_eq!(root.kind(), NodeKind::FunctionExpression);
    assert!(
        state
            .map()
            .context_nodes()
            .any(|c| c.kind == NodeKind::Parameter),
        "a parameter context should be in flight"
    );
}

#[test]
fn losing_disambiguation_branches_leak_no_contexts() {
    // `[a = 1]` speculates a record, which wins; `each [a]` speculates a
    // record, which loses to a field selector.
    for source in ["[a = 1]", "each [a]", "(x) => x", "(1 + 2)"] {
        for parser in [ParserKind::RecursiveDescent, ParserKind::Combinatorial] {
            let (state, result) = run(source, parser, EntryPoint::Document);
            assert!(result.is_ok(), "`{source}` should parse");
            assert_eq!(
                state.map().context_nodes().count(),
                0,
                "`{source}` leaked context nodes"
            );
            state.map().validate().expect("invariants should hold");
        }
    }
}

#[test]
fn each_shorthand_selects_a_field() {
    let state = parse_ok("each [a]", ParserKind::RecursiveDescent);
    let root = state.map().root().expect("a root should exist");
    assert_eq!(root.kind(), NodeKind::EachExpression);
    assert!(
        state
            .map()
            .ast_nodes()
            .any(|n| n.kind == NodeKind::FieldSelector),
        "the bracket should have disambiguated to a field selector"
    );
    assert!(
        !state
            .map()
            .ast_nodes()
            .any(|n| n.kind == NodeKind::RecordExpression),
        "no record should remain from the losing branch"
    );
}

#[test]
fn expression_documents_must_consume_every_token() {
    let (_, result) = run("1 2", ParserKind::RecursiveDescent, EntryPoint::Expression);
    match result.expect_err("source should not parse") {
        ParseFailure::Syntax(error) => {
            assert_eq!(
                *error.kind(),
                ParseErrorKind::UnusedTokensRemain {
                    first_unused_token_index: 1
                }
            );
        }
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn entry_points_change_what_parses() {
    // A section document is not an expression document.
    let (_, result) = run(
        "section Foo; x = 1;",
        ParserKind::RecursiveDescent,
        EntryPoint::Expression,
    );
    assert!(result.is_err());

    let (state, result) = run(
        "section Foo; x = 1; shared y = x + 1;",
        ParserKind::RecursiveDescent,
        EntryPoint::SectionDocument,
    );
    assert!(result.is_ok());
    let root = state.map().root().expect("a root should exist");
    assert_eq!(root.kind(), NodeKind::Section);

    // The default entry accepts both.
    let (_, result) = run(
        "section Foo; x = 1;",
        ParserKind::RecursiveDescent,
        EntryPoint::Document,
    );
    assert!(result.is_ok());
}

#[test]
fn parameter_specification_lists_require_types() {
    let (_, result) = run(
        "(x as number, optional y as text)",
        ParserKind::RecursiveDescent,
        EntryPoint::ParameterSpecificationList,
    );
    assert!(result.is_ok());

    let (_, result) = run(
        "(x)",
        ParserKind::RecursiveDescent,
        EntryPoint::ParameterSpecificationList,
    );
    match result.expect_err("untyped parameters should not parse") {
        ParseFailure::Syntax(error) => assert!(matches!(
            error.kind(),
            ParseErrorKind::ExpectedTokenKind { .. }
        )),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn required_after_optional_is_rejected() {
    let (_, result) = run(
        "(optional x, y) => 1",
        ParserKind::RecursiveDescent,
        EntryPoint::Document,
    );
    match result.expect_err("source should not parse") {
        ParseFailure::Syntax(error) => assert_eq!(
            *error.kind(),
            ParseErrorKind::RequiredParameterAfterOptionalParameter
        ),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}

#[test]
fn section_documents_with_attributes_parse() {
    let (state, result) = run(
        "[Version = \"1.0\"] section S; [Internal = true] shared x = 1;",
        ParserKind::RecursiveDescent,
        EntryPoint::SectionDocument,
    );
    assert!(result.is_ok(), "section should parse: {result:?}");
    assert!(
        state
            .map()
            .ast_nodes()
            .any(|n| n.kind == NodeKind::RecordLiteral),
        "attribute records should be record literals"
    );
}

#[test]
fn errors_snapshot_the_failure_point() {
    let (_, result) = run("if true then", ParserKind::RecursiveDescent, EntryPoint::Document);
    let error = match result.expect_err("source should not parse") {
        ParseFailure::Syntax(error) => error,
        other => panic!("expected a syntax error, got {other:?}"),
    };
    assert_eq!(error.token_index(), 3);
    assert!(error.context_id().is_some());
    assert!(!error.expected().is_empty());
}

#[test]
fn tokens_and_nodes_serialize() {
    let tokens = tokenize("1 + 2").expect("source should lex");
    let value = serde_json::to_value(&tokens).expect("tokens should serialize");
    assert_eq!(value[0]["kind"], "NumericLiteral");
    assert_eq!(value[1]["data"], "+");
    assert_eq!(value[2]["position_start"]["line_code_unit"], 4);

    let state = parse_ok("1 + 2", ParserKind::RecursiveDescent);
    let root = state
        .map()
        .root()
        .and_then(|r| r.as_ast().cloned())
        .expect("root should be completed");
    let value = serde_json::to_value(&root).expect("nodes should serialize");
    assert_eq!(value["kind"], "ArithmeticExpression");
    assert_eq!(value["token_range"]["token_index_end"], 3);
}

#[test]
fn node_ids_are_seedable() {
    let tokens = tokenize("1 + 2").expect("source should lex");
    let mut state = ParseState::new(tokens).with_initial_node_id(100);
    parse(&mut state, ParserKind::RecursiveDescent, EntryPoint::Document)
        .expect("source should parse");
    assert!(state.map().ast_nodes().all(|n| n.id.get() >= 100));
}
