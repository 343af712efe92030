// tests/syntax_tests.rs

mod common;

use std::collections::HashSet;

use annotweave::{
    syntax::{parse_expression, parse_module, Expr, Field, Member, ToSource, TokenKind},
    ErrorKind,
};
use common::CALCULATOR;

// ---
// Round-trip
// ---

#[test]
fn test_module_round_trips_byte_for_byte() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    assert_eq!(tree.text(), CALCULATOR);
}

#[test]
fn test_crlf_module_round_trips() {
    let crlf = CALCULATOR.replace('\n', "\r\n");
    let tree = parse_module("calc.bal", &crlf).unwrap();
    assert_eq!(tree.text(), crlf);
}

#[test]
fn test_module_without_trailing_newline_round_trips() {
    let text = "@ai:Tool function f() {}";
    assert_eq!(parse_module("f.bal", text).unwrap().text(), text);
}

// ---
// Structure
// ---

#[test]
fn test_members_are_classified() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    let functions: Vec<_> = tree
        .root()
        .functions()
        .map(|f| f.name.text().to_string())
        .collect();
    assert_eq!(functions, vec!["sum", "mult", "ping"]);

    let others = tree
        .root()
        .members()
        .iter()
        .filter(|m| matches!(m, Member::Other(_)))
        .count();
    assert_eq!(others, 4);
}

#[test]
fn test_function_parts_are_kept_verbatim() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    let mult = tree.root().functions().nth(1).unwrap();
    let qualifiers: Vec<_> = mult.qualifiers.iter().map(|q| q.text()).collect();
    assert_eq!(qualifiers, vec!["public", "isolated"]);
    assert_eq!(mult.signature.text(), "(int a, int b) returns int");
    assert_eq!(mult.body.text(), "=> a * b;");
}

#[test]
fn test_annotations_on_other_declarations_are_parsed() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    let display = tree
        .root()
        .members()
        .iter()
        .find_map(|m| match m {
            Member::Other(decl) => decl.metadata.clone(),
            Member::Function(_) => None,
        })
        .unwrap();
    assert_eq!(display.annotations[0].reference.name(), "display");
    assert!(!display.annotations[0].reference.is_qualified());
}

#[test]
fn test_annotation_ids_are_unique() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    let ids: HashSet<_> = tree
        .root()
        .function_annotations()
        .map(|(_, a)| a.id)
        .collect();
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_annotation_span_covers_annotation_text() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    let (_, annotation) = tree.root().function_annotations().nth(1).unwrap();
    let span = annotation.span.unwrap();
    assert_eq!(&CALCULATOR[span.start..span.end], "@ai:Tool {\n    name: \"mult\"\n}");
}

// ---
// Trivia
// ---

#[test]
fn test_doc_comments_lead_the_annotation() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    let (_, annotation) = tree.root().function_annotations().next().unwrap();
    assert_eq!(
        annotation.at.leading_trivia(),
        "\n# Adds two numbers.\n# + a - first operand\n"
    );
    assert_eq!(annotation.reference.last_token().trailing_trivia(), "\n");
}

#[test]
fn test_line_break_trails_previous_token() {
    let expr = parse_expression("{\n    a: 1, // one\n    b: 2\n}").unwrap();
    let mapping = expr.as_mapping().unwrap();
    assert_eq!(mapping.open_brace.trailing_trivia(), "\n");
    assert_eq!(mapping.fields.separator_before(1).unwrap().trailing_trivia(), " // one\n");
    let b = mapping.fields.iter().nth(1).unwrap();
    assert_eq!(b.first_token().leading_trivia(), "    ");
    assert_eq!(b.last_token().trailing_trivia(), "\n");
}

// ---
// Expressions
// ---

#[test]
fn test_expression_forms() {
    let text = r#"{'type: "object", "required": ["a", 'b], fn: pkg:make(1, -2.5e3), ok: true, none: (), ...rest, [k]: null, short}"#;
    let expr = parse_expression(text).unwrap();
    assert_eq!(expr.source_text(), text);

    let mapping = expr.as_mapping().unwrap();
    let kinds: Vec<_> = mapping.fields.iter().map(Field::kind_name).collect();
    assert_eq!(
        kinds,
        vec![
            "key-value field",
            "key-value field",
            "key-value field",
            "key-value field",
            "key-value field",
            "spread field",
            "computed field",
            "key-value field",
        ]
    );
    let keys: Vec<_> = mapping.fields.iter().filter_map(Field::key).collect();
    assert_eq!(keys, vec!["type", "required", "fn", "ok", "none", "short"]);
}

#[test]
fn test_unstructured_values_are_kept_verbatim() {
    let text = r#"{timeout: 1.5d, label: "a" + "b", call: f(x).y, [k + 1]: 2, n: 1}"#;
    let expr = parse_expression(text).unwrap();
    assert_eq!(expr.source_text(), text);

    let mapping = expr.as_mapping().unwrap();
    let values: Vec<_> = mapping
        .fields
        .iter()
        .filter_map(|field| match field {
            Field::Specific(field) => field.value.as_ref(),
            _ => None,
        })
        .map(|value| (matches!(value, Expr::Text(_)), value.source_text()))
        .collect();
    assert_eq!(
        values,
        vec![
            (true, "1.5d".to_string()),
            (true, "\"a\" + \"b\"".to_string()),
            (true, "f(x).y".to_string()),
            (false, "1".to_string()),
        ]
    );

    let computed = mapping
        .fields
        .iter()
        .find_map(|field| match field {
            Field::Computed(field) => Some(field),
            _ => None,
        })
        .unwrap();
    assert!(matches!(&computed.key, Expr::Text(token) if token.text() == "k + 1"));
}

#[test]
fn test_record_return_type_stays_in_signature() {
    let text = "\
function a() returns record {| int x; |} {
    return {x: 1};
}

@http:ServiceConfig {timeout: 1.5d}
service / on ep {}
";
    let tree = parse_module("a.bal", text).unwrap();
    assert_eq!(tree.text(), text);

    let function = tree.root().functions().next().unwrap();
    assert_eq!(function.signature.text(), "() returns record {| int x; |}");
    assert_eq!(function.body.text(), "{\n    return {x: 1};\n}");
    assert_eq!(tree.root().members().len(), 2);
}

#[test]
fn test_literal_token_kinds() {
    for (text, kind) in [
        ("\"s\"", TokenKind::StringLiteral),
        ("42", TokenKind::NumericLiteral),
        ("false", TokenKind::BooleanLiteral),
        ("null", TokenKind::NilLiteral),
    ] {
        let Expr::Literal(token) = parse_expression(text).unwrap() else {
            panic!("expected a literal for {text}");
        };
        assert_eq!(token.kind(), kind);
    }
}

// ---
// Errors
// ---

#[test]
fn test_syntax_error_points_at_problem() {
    let text = "@ai:Tool {name: }\nfunction f() {}\n";
    let err = parse_module("bad.bal", text).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    let span = err.context().span.unwrap();
    assert!(span.start <= text.len());
}

#[test]
fn test_unterminated_body_is_rejected() {
    let err = parse_module("bad.bal", "function f() {\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn test_modify_with_renders_new_root() {
    let tree = parse_module("calc.bal", CALCULATOR).unwrap();
    let emptied = tree.root().with_members(im::Vector::new());
    let modified = tree.modify_with(emptied);
    assert_eq!(modified.text(), "");
    assert_eq!(modified.name(), "calc.bal");
    assert_eq!(tree.text(), CALCULATOR);
}
