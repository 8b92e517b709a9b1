//! End-to-end inspection tests over the task façade.

use std::sync::Arc;

use powerquery::ActiveNodeLeafKind;
use powerquery::ExternalTypeResolver;
use powerquery::InspectionState;
use powerquery::Keyword;
use powerquery::LanguageConstant;
use powerquery::LexParseTask;
use powerquery::NoResolver;
use powerquery::NodeKind;
use powerquery::ParseErrorKind;
use powerquery::ParserKind;
use powerquery::Position;
use powerquery::PrimitiveTypeKind;
use powerquery::ScopeItem;
use powerquery::Settings;
use powerquery::TaskResultKind;
use powerquery::TaskStage;
use powerquery::Type;
use powerquery::TypeKind;
use powerquery::inspect_xor;
use powerquery::try_lex_parse;
use powerquery_analysis::ExtendedType;
use pretty_assertions::assert_eq;
use strum::VariantArray;

/// A resolver with a fixed table of names, for scenario tests.
#[derive(Debug)]
struct TableResolver(Vec<(&'static str, Type)>);

impl ExternalTypeResolver for TableResolver {
    fn resolve_identifier(&self, identifier: &str) -> Option<Type> {
        self.0
            .iter()
            .find(|(name, _)| *name == identifier)
            .map(|(_, ty)| ty.clone())
    }
}

/// Infers the type of the root node of a task's tree.
fn root_type(task: &LexParseTask) -> Type {
    let map = match task {
        LexParseTask::ParseOk(ok) => &ok.node_id_map,
        LexParseTask::ParseError(failed) => &failed.node_id_map,
        other => panic!("the task carries no tree: {other:?}"),
    };
    let resolver = NoResolver;
    let mut state = InspectionState::new(map, &resolver, None);
    let root = map.root().expect("a root should exist");
    inspect_xor(&mut state, root).expect("inference should succeed")
}

#[test]
fn scenario_arithmetic() {
    let settings = Settings::new();
    let task = try_lex_parse(&settings, "1 + 2");
    assert!(task.is_parse_stage_ok());

    let inspection = task
        .inspect(&settings, Position::new(0, 0))
        .expect("the task carries a tree");
    let active = inspection.active_node.expect("position is in bounds");
    assert_eq!(
        active
            .ancestry
            .iter()
            .map(|n| n.kind())
            .collect::<Vec<_>>(),
        vec![NodeKind::LiteralExpression, NodeKind::ArithmeticExpression]
    );

    let ty = root_type(&task);
    assert_eq!(ty.kind, TypeKind::Number);
    assert!(!ty.is_nullable);
}

#[test]
fn scenario_if_branches_union() {
    let resolver = TableResolver(vec![
        ("x", Type::primitive(TypeKind::Logical)),
        ("y", Type::primitive(TypeKind::Number)),
        ("z", Type::primitive(TypeKind::Text)),
    ]);
    let settings = Settings::new().with_external_type_resolver(Arc::new(resolver));
    let task = try_lex_parse(&settings, "if x then y else z");
    assert!(task.is_parse_stage_ok());

    let map = match &task {
        LexParseTask::ParseOk(ok) => &ok.node_id_map,
        other => panic!("expected a parse: {other:?}"),
    };
    let resolver = TableResolver(vec![
        ("x", Type::primitive(TypeKind::Logical)),
        ("y", Type::primitive(TypeKind::Number)),
        ("z", Type::primitive(TypeKind::Text)),
    ]);
    let mut state = InspectionState::new(map, &resolver, None);
    let ty = inspect_xor(&mut state, map.root().expect("a root should exist"))
        .expect("inference should succeed");

    match ty.extended {
        Some(ExtendedType::AnyUnion(variants)) => {
            assert_eq!(
                variants.iter().map(|v| v.kind).collect::<Vec<_>>(),
                vec![TypeKind::Number, TypeKind::Text]
            );
        }
        other => panic!("expected a union, got {other:?}"),
    }
}

#[test]
fn scenario_let_scope_and_type() {
    let settings = Settings::new();
    let source = "let a = 1, b = a + 1 in b";
    let task = try_lex_parse(&settings, source);
    assert!(task.is_parse_stage_ok());

    let inspection = task
        .inspect(&settings, Position::new(0, source.len() as u32))
        .expect("the task carries a tree");
    let scope = inspection.scope.expect("scope should resolve");
    assert!(matches!(
        scope.get("a"),
        Some(ScopeItem::LetVariable {
            value_id: Some(_),
            is_recursive: false,
            ..
        })
    ));
    assert!(matches!(
        scope.get("b"),
        Some(ScopeItem::LetVariable {
            value_id: Some(_),
            is_recursive: false,
            ..
        })
    ));

    let ty = inspection.ty.expect("inference should succeed");
    assert_eq!(ty.kind, TypeKind::Number);
}

#[test]
fn scenario_field_access_on_error_tree() {
    let settings = Settings::new();
    let source = "[x = 1, y = 2][";
    let task = try_lex_parse(&settings, source);

    let failed = match &task {
        LexParseTask::ParseError(failed) => failed,
        other => panic!("expected a parse error: {other:?}"),
    };
    assert_eq!(
        *failed.error.kind(),
        ParseErrorKind::ExpectedGeneralizedIdentifier
    );
    let root = failed.node_id_map.root().expect("a root should exist");
    assert!(!root.is_ast(), "the root should be an in-flight context");

    let inspection = task
        .inspect(&settings, Position::new(0, source.len() as u32))
        .expect("the task carries a tree");
    let fields = inspection
        .autocomplete
        .field_access
        .expect("field access should resolve");
    assert_eq!(
        fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
        vec!["x", "y"]
    );
    assert!(fields.iter().all(|f| f.ty.kind == TypeKind::Number));
}

#[test]
fn scenario_primitive_types_after_as() {
    let settings = Settings::new();
    let task = try_lex_parse(&settings, "1 as ");
    assert!(task.is_parse_stage_parse_error());

    let inspection = task
        .inspect(&settings, Position::new(0, 5))
        .expect("the task carries a tree");
    let types = inspection
        .autocomplete
        .primitive_types
        .expect("primitive types should resolve");
    assert_eq!(types, PrimitiveTypeKind::VARIANTS.to_vec());
}

#[test]
fn scenario_optional_in_parameter_slot() {
    let settings = Settings::new();
    let task = try_lex_parse(&settings, "(x, ");
    assert!(task.is_parse_stage_parse_error());

    let inspection = task
        .inspect(&settings, Position::new(0, 4))
        .expect("the task carries a tree");

    assert_eq!(
        inspection
            .autocomplete
            .language_constants
            .expect("language constants should resolve"),
        Some(LanguageConstant::Optional)
    );

    // A parameter slot is not an expression slot, so no expression
    // keywords are offered.
    let keywords = inspection
        .autocomplete
        .keywords
        .expect("keywords should resolve");
    for keyword in Keyword::EXPRESSION {
        assert!(
            !keywords.contains(keyword),
            "`{keyword}` should not be offered in a parameter slot"
        );
    }
}

#[test]
fn keywords_between_condition_and_body() {
    let settings = Settings::new();
    let source = "if true ";
    let task = try_lex_parse(&settings, source);
    let inspection = task
        .inspect(&settings, Position::new(0, 8))
        .expect("the task carries a tree");
    let keywords = inspection
        .autocomplete
        .keywords
        .expect("keywords should resolve");
    assert!(
        keywords.contains(&Keyword::Then),
        "`then` should be offered after an if condition, got {keywords:?}"
    );
}

#[test]
fn conjunction_keywords_after_a_completed_expression() {
    let settings = Settings::new();
    let source = "1 + 2  ";
    let task = try_lex_parse(&settings, source);
    let inspection = task
        .inspect(&settings, Position::new(0, 7))
        .expect("the task carries a tree");
    let active = inspection.active_node.expect("position is in bounds");
    assert_eq!(active.leaf_kind, ActiveNodeLeafKind::AfterAstNode);

    let keywords = inspection
        .autocomplete
        .keywords
        .expect("keywords should resolve");
    for keyword in Keyword::CONJUNCTION {
        assert!(
            keywords.contains(keyword),
            "`{keyword}` should be offered after a completed expression"
        );
    }
}

#[test]
fn trailing_token_filters_suggestions() {
    let settings = Settings::new();
    // `nu` is not a primitive type, so the parse fails at it; the cursor
    // sits at its end and the text filters the suggestions.
    let task = try_lex_parse(&settings, "1 as nu");
    assert!(task.is_parse_stage_parse_error());

    let inspection = task
        .inspect(&settings, Position::new(0, 7))
        .expect("the task carries a tree");
    let types = inspection
        .autocomplete
        .primitive_types
        .expect("primitive types should resolve");
    assert_eq!(types, vec![PrimitiveTypeKind::Null, PrimitiveTypeKind::Number]);

    assert_eq!(
        inspection
            .autocomplete
            .language_constants
            .expect("language constants should resolve"),
        Some(LanguageConstant::Nullable)
    );
}

#[test]
fn scope_shadowing_is_lexical() {
    let settings = Settings::new();
    let source = "let x = 1 in let x = \"a\" in x";
    let task = try_lex_parse(&settings, source);
    assert!(task.is_parse_stage_ok());

    let inspection = task
        .inspect(&settings, Position::new(0, source.len() as u32))
        .expect("the task carries a tree");
    // The innermost binding of `x` wins.
    let ty = inspection.ty.expect("inference should succeed");
    assert_eq!(ty.kind, TypeKind::Text);
}

#[test]
fn unresolved_references_are_undefined() {
    let settings = Settings::new();
    let source = "let a = 1 in missing";
    let task = try_lex_parse(&settings, source);
    let inspection = task
        .inspect(&settings, Position::new(0, source.len() as u32))
        .expect("the task carries a tree");
    let scope = inspection.scope.expect("scope should resolve");
    assert!(matches!(
        scope.get("missing"),
        Some(ScopeItem::Undefined { .. })
    ));
    assert_eq!(
        inspection.ty.expect("inference should succeed"),
        Type::UNKNOWN
    );
}

#[test]
fn recursive_references_carry_the_flag() {
    let settings = Settings::new();
    let source = "let f = @f in f";
    let task = try_lex_parse(&settings, source);
    assert!(task.is_parse_stage_ok());

    // Inspect at the `@f` reference inside the binding's own value.
    let inspection = task
        .inspect(&settings, Position::new(0, 10))
        .expect("the task carries a tree");
    let scope = inspection.scope.expect("scope should resolve");
    assert!(matches!(
        scope.get("f"),
        Some(ScopeItem::LetVariable {
            is_recursive: true,
            ..
        })
    ));
}

#[test]
fn each_introduces_the_implicit_parameter() {
    let settings = Settings::new();
    let source = "each _";
    let task = try_lex_parse(&settings, source);
    let inspection = task
        .inspect(&settings, Position::new(0, 6))
        .expect("the task carries a tree");
    let scope = inspection.scope.expect("scope should resolve");
    assert!(matches!(scope.get("_"), Some(ScopeItem::Each { .. })));
}

#[test]
fn parameters_resolve_with_their_declared_types() {
    let settings = Settings::new();
    let source = "(x as number, optional y as nullable text) => x";
    let task = try_lex_parse(&settings, source);
    assert!(task.is_parse_stage_ok());

    let inspection = task
        .inspect(&settings, Position::new(0, source.len() as u32))
        .expect("the task carries a tree");
    let scope = inspection.scope.expect("scope should resolve");
    assert!(matches!(
        scope.get("x"),
        Some(ScopeItem::Parameter {
            is_optional: false,
            is_nullable: false,
            type_kind: Some(PrimitiveTypeKind::Number),
            ..
        })
    ));
    assert!(matches!(
        scope.get("y"),
        Some(ScopeItem::Parameter {
            is_optional: true,
            is_nullable: true,
            type_kind: Some(PrimitiveTypeKind::Text),
            ..
        })
    ));

    assert_eq!(
        inspection.ty.expect("inference should succeed").kind,
        TypeKind::Number
    );
}

#[test]
fn function_types_carry_their_signature() {
    let settings = Settings::new();
    let task = try_lex_parse(&settings, "(x as number) => x + 1");
    let ty = root_type(&task);
    assert_eq!(ty.kind, TypeKind::Function);
    match ty.extended {
        Some(ExtendedType::DefinedFunction {
            parameters,
            return_type,
        }) => {
            assert_eq!(parameters.len(), 1);
            assert_eq!(parameters[0].name, "x");
            assert_eq!(return_type.kind, TypeKind::Number);
        }
        other => panic!("expected a defined function, got {other:?}"),
    }
}

#[test]
fn type_inference_is_idempotent() {
    let settings = Settings::new();
    for source in [
        "1 + 2",
        "if true then 1 else \"a\"",
        "[a = 1, b = \"x\"]",
        "try 1/0 otherwise 0",
        "(x as number) => x",
        "let a = 1, b = a + 1 in b",
    ] {
        let task = try_lex_parse(&settings, source);
        let first = root_type(&task);
        let second = root_type(&task);
        assert_eq!(first, second, "re-inferring `{source}` changed the type");
    }
}

#[test]
fn strategies_agree_through_the_facade() {
    for source in ["let a = 1 in a + 2", "1 + 2 * 3", "[a = 1][a]"] {
        let descent = try_lex_parse(
            &Settings::new().with_parser(ParserKind::RecursiveDescent),
            source,
        );
        let combinatorial = try_lex_parse(
            &Settings::new().with_parser(ParserKind::Combinatorial),
            source,
        );
        match (descent, combinatorial) {
            (LexParseTask::ParseOk(a), LexParseTask::ParseOk(b)) => {
                assert_eq!(
                    a.node_id_map.canonical_text(),
                    b.node_id_map.canonical_text(),
                    "strategies disagree on `{source}`"
                );
            }
            other => panic!("both strategies should parse `{source}`: {other:?}"),
        }
    }
}

#[test]
fn stage_tags_are_reported() {
    let settings = Settings::new();

    let task = try_lex_parse(&settings, "1 + 2");
    assert_eq!(task.stage(), TaskStage::Parse);
    assert_eq!(task.result_kind(), TaskResultKind::Ok);

    let task = try_lex_parse(&settings, "1 + ");
    assert_eq!(task.stage(), TaskStage::Parse);
    assert_eq!(task.result_kind(), TaskResultKind::ParseError);
    assert!(task.is_parse_stage_parse_error());

    let task = try_lex_parse(&settings, "\"unterminated");
    assert_eq!(task.stage(), TaskStage::Lex);
    assert_eq!(task.result_kind(), TaskResultKind::LexError);
    assert!(task.is_lex_stage_error());
}

#[test]
fn cancellation_surfaces_as_a_common_error() {
    use powerquery_grammar::cancellation::CountdownToken;

    let settings = Settings::new()
        .with_cancellation_token(Arc::new(CountdownToken::new(0)));
    let task = try_lex_parse(&settings, "let a = 1 in a");
    assert_eq!(task.result_kind(), TaskResultKind::CommonError);
}

#[test]
fn field_selection_types() {
    let settings = Settings::new();

    let ty = root_type(&try_lex_parse(&settings, "[a = 1, b = \"x\"][b]"));
    assert_eq!(ty.kind, TypeKind::Text);

    // A missing field is none, unless the access is optional.
    let ty = root_type(&try_lex_parse(&settings, "[a = 1][c]"));
    assert_eq!(ty.kind, TypeKind::None);

    let ty = root_type(&try_lex_parse(&settings, "[a = 1][c]?"));
    assert_eq!(ty.kind, TypeKind::Null);
}

#[test]
fn concatenation_merges_known_records() {
    let settings = Settings::new();
    let ty = root_type(&try_lex_parse(&settings, "[a = 1] & [a = \"x\", b = 2]"));
    assert_eq!(ty.kind, TypeKind::Record);
    match ty.extended {
        Some(ExtendedType::DefinedRecord { fields, is_open }) => {
            assert!(!is_open);
            // The left side wins ties.
            assert_eq!(fields.get("a").map(|t| t.kind), Some(TypeKind::Number));
            assert_eq!(fields.get("b").map(|t| t.kind), Some(TypeKind::Number));
        }
        other => panic!("expected a defined record, got {other:?}"),
    }
}

#[test]
fn incomplete_binops_use_the_partial_lattice() {
    let settings = Settings::new();
    // `1 +` with no right operand: addition from a number can only
    // produce a number.
    let task = try_lex_parse(&settings, "1 + ");
    let ty = root_type(&task);
    assert_eq!(ty.kind, TypeKind::Number);
}

#[test]
fn error_raising_and_try_types() {
    let settings = Settings::new();

    let ty = root_type(&try_lex_parse(&settings, "try \"a\""));
    // The protected text unions with the error record.
    assert!(ty.all_variants_of(&[TypeKind::Text, TypeKind::Record]));

    let ty = root_type(&try_lex_parse(&settings, "try \"a\" otherwise 1"));
    assert!(ty.all_variants_of(&[TypeKind::Text, TypeKind::Number]));
}
