use crate::errors::CompileErrorList;
use crate::expression::{unescape_string_literal, CLikeExpressionCompiler};
use crate::symbols::SymbolReplacer;
use crate::test::positioned;

fn eval_i32(text: &str) -> i32 {
    let mut errors = CompileErrorList::new();
    let value = CLikeExpressionCompiler::<i32>::new().compile(
        &positioned(text),
        &SymbolReplacer::empty(),
        &mut errors,
    );
    assert!(!errors.has_errors(), "'{}' failed: {:?}", text, errors.errors());
    value
}

fn eval_u8(text: &str) -> u8 {
    let mut errors = CompileErrorList::new();
    let value = CLikeExpressionCompiler::<u8>::new().compile(
        &positioned(text),
        &SymbolReplacer::empty(),
        &mut errors,
    );
    assert!(!errors.has_errors(), "'{}' failed: {:?}", text, errors.errors());
    value
}

fn fails(text: &str) -> String {
    let mut errors = CompileErrorList::new();
    CLikeExpressionCompiler::<i32>::new().compile(
        &positioned(text),
        &SymbolReplacer::empty(),
        &mut errors,
    );
    assert!(errors.has_errors(), "'{}' should fail", text);
    errors.errors()[0].message.to_string()
}

#[test]
fn literals() {
    assert_eq!(eval_i32("42"), 42);
    assert_eq!(eval_i32("0x2a"), 42);
    assert_eq!(eval_i32("0b101010"), 42);
    assert_eq!(eval_i32("'a'"), 97);
    assert_eq!(eval_i32(r"'\n'"), 10);
    assert_eq!(eval_i32(r"'\x41'"), 0x41);
    assert_eq!(eval_i32(r"'A'"), 0x41);
    assert_eq!(eval_i32(r"'\101'"), 0o101);
}

#[test]
fn evaluation_matches_native_arithmetic() {
    assert_eq!(eval_i32("1 + 2 * 3"), 1 + 2 * 3);
    assert_eq!(eval_i32("(1 + 2) * 3"), (1 + 2) * 3);
    assert_eq!(eval_i32("100 / 7"), 100 / 7);
    assert_eq!(eval_i32("100 % 7"), 100 % 7);
    assert_eq!(eval_i32("6 - 10"), -4);
    assert_eq!(eval_i32("1 << 10"), 1 << 10);
    assert_eq!(eval_i32("-64 >> 2"), -64 >> 2);
    assert_eq!(eval_i32("0xf0 | 0x0f"), 0xff);
    assert_eq!(eval_i32("0xff & 0x0f"), 0x0f);
    assert_eq!(eval_i32("0xff ^ 0x0f"), 0xf0);
}

#[test]
fn comparisons_and_logic() {
    assert_eq!(eval_i32("3 < 4"), 1);
    assert_eq!(eval_i32("4 <= 4"), 1);
    assert_eq!(eval_i32("3 > 4"), 0);
    assert_eq!(eval_i32("3 == 3"), 1);
    assert_eq!(eval_i32("3 != 3"), 0);
    assert_eq!(eval_i32("1 && 0"), 0);
    assert_eq!(eval_i32("1 || 0"), 1);
    assert_eq!(eval_i32("!5"), 0);
    assert_eq!(eval_i32("!0"), 1);
}

#[test]
fn unary_operators_bind_tighter_than_binary() {
    assert_eq!(eval_i32("-2 + 3"), 1);
    assert_eq!(eval_i32("2 * -3"), -6);
    assert_eq!(eval_i32("~0 & 0xff"), 0xff);
    assert_eq!(eval_i32("- -5"), 5);
}

#[test]
fn precedence_chain() {
    // Mirrors the operator table: || is the loosest, * the tightest.
    assert_eq!(eval_i32("0 || 1 && 1"), 1);
    assert_eq!(eval_i32("1 | 0 ^ 1 & 0"), 1);
    assert_eq!(eval_i32("1 + 2 << 1"), 6);
    assert_eq!(eval_i32("1 < 1 + 1"), 1);
}

#[test]
fn wrapping_matches_the_chosen_width() {
    assert_eq!(eval_u8("255 + 1"), 0);
    assert_eq!(eval_u8("-1"), 255);
    assert_eq!(eval_u8("300"), 44);
    assert_eq!(eval_i32("0x7fffffff + 1"), i32::min_value());
}

#[test]
fn division_by_zero_is_reported() {
    assert!(fails("1 / 0").contains("Division by zero"));
    assert!(fails("1 % 0").contains("Division by zero"));
}

#[test]
fn unresolved_identifiers_are_reported() {
    assert!(fails("undefined_name + 1").contains("Unrecognized constant/label: undefined_name"));
}

#[test]
fn bracket_mismatches_are_reported() {
    fails("(1 + 2");
    fails("1 + 2)");
}

#[test]
fn malformed_expressions_are_reported() {
    fails("1 +");
    fails("* 2");
    fails("1 2");
    fails("");
}

#[test]
fn string_literals_unescape() {
    assert_eq!(unescape_string_literal(r#""abc""#).unwrap(), "abc");
    assert_eq!(unescape_string_literal(r#""a\nb""#).unwrap(), "a\nb");
    assert_eq!(unescape_string_literal(r#""a\x41""#).unwrap(), "aA");
    assert!(unescape_string_literal("abc").is_err());
}
