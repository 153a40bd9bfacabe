//! The C-like compile-time expression evaluator.
//!
//! Pipeline: multi-regex tokenizer → iterative shunting-yard parse →
//! evaluation on a value stack. Arithmetic wraps modulo the width of the
//! integer type chosen at the call site; signedness of comparisons and
//! shifts follows that type.

use std::fmt;
use std::marker::PhantomData;

use lazy_static::lazy_static;
use num_traits::{
    CheckedDiv, CheckedRem, FromPrimitive, PrimInt, ToPrimitive, WrappingAdd, WrappingMul,
    WrappingNeg, WrappingShl, WrappingShr, WrappingSub,
};
use util::Multiregex;

use crate::errors::CompileErrorList;
use crate::position::PositionedString;
use crate::symbols::SymbolReplacer;

/// Integer types an expression can be evaluated in.
pub trait ExpressionValue:
    PrimInt
    + WrappingAdd
    + WrappingSub
    + WrappingMul
    + WrappingNeg
    + WrappingShl
    + WrappingShr
    + CheckedDiv
    + CheckedRem
    + FromPrimitive
    + ToPrimitive
    + fmt::Display
{
}

impl<T> ExpressionValue for T where
    T: PrimInt
        + WrappingAdd
        + WrappingSub
        + WrappingMul
        + WrappingNeg
        + WrappingShl
        + WrappingShr
        + CheckedDiv
        + CheckedRem
        + FromPrimitive
        + ToPrimitive
        + fmt::Display
{
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExpressionTokenKind {
    HexLiteral,
    BinLiteral,
    DecLiteral,
    CharLiteral,
    Identifier,
    Operator,
    OpenBracket,
    CloseBracket,
}

const EXPRESSION_PATTERNS: &[&str] = &[
    r"0[xX][0-9A-Fa-f]+",
    r"0[bB][01]+",
    r"[0-9]+",
    r"'(?:\\.|[^'\\])+'",
    r"[A-Za-z_][A-Za-z0-9_]*",
    r"<<|>>|<=|>=|==|!=|&&|\|\||[-+*/%&|^~!<>]",
    r"\(",
    r"\)",
];

lazy_static! {
    static ref EXPRESSION_MULTIREGEX: Multiregex = Multiregex::new(EXPRESSION_PATTERNS);
}

#[derive(Clone, Debug)]
struct ExpressionToken {
    kind: ExpressionTokenKind,
    text: String,
}

/// Binary operator precedence; a smaller value binds tighter. All binary
/// operators are left-associative.
fn binary_precedence(operator: &str) -> Option<u32> {
    let precedence = match operator {
        "||" => 120,
        "&&" => 110,
        "|" => 100,
        "^" => 90,
        "&" => 80,
        "==" | "!=" => 70,
        "<" | "<=" | ">" | ">=" => 60,
        "<<" | ">>" => 50,
        "+" | "-" => 40,
        "*" | "/" | "%" => 30,
        _ => return None,
    };
    Some(precedence)
}

/// Unary operators bind tighter than any binary operator.
const UNARY_PRECEDENCE: u32 = 10;

fn is_unary(operator: &str) -> bool {
    matches!(operator, "+" | "-" | "!" | "~")
}

enum StackedOperator {
    Binary(String, u32),
    Unary(String),
    OpenBracket,
}

impl StackedOperator {
    fn precedence(&self) -> Option<u32> {
        match self {
            StackedOperator::Binary(_, precedence) => Some(*precedence),
            StackedOperator::Unary(_) => Some(UNARY_PRECEDENCE),
            StackedOperator::OpenBracket => None,
        }
    }
}

/// An expression compiler for one integer width, e.g.
/// `CLikeExpressionCompiler::<i32>::new()`.
pub struct CLikeExpressionCompiler<T: ExpressionValue> {
    _marker: PhantomData<T>,
}

impl<T: ExpressionValue> CLikeExpressionCompiler<T> {
    pub fn new() -> CLikeExpressionCompiler<T> {
        CLikeExpressionCompiler {
            _marker: PhantomData,
        }
    }

    /// Replaces symbols in `text`, then tokenizes, parses and evaluates
    /// it. On failure an error is recorded and zero returned, so one bad
    /// operand never stops the surrounding pass.
    pub fn compile(
        &self,
        text: &PositionedString,
        replacer: &SymbolReplacer,
        errors: &mut CompileErrorList,
    ) -> T {
        let replaced = replacer.replace(text, errors);
        let positioned = PositionedString::new(replaced, text.interval);
        match self.evaluate(&positioned) {
            Ok(value) => value,
            Err(message) => {
                errors.push_error(text.interval, message);
                T::zero()
            }
        }
    }

    fn evaluate(&self, text: &PositionedString) -> Result<T, String> {
        let tokens = tokenize(&text.string)?;
        if tokens.is_empty() {
            return Err("Expected an expression, found nothing.".to_owned());
        }
        let mut values: Vec<T> = Vec::new();
        let mut operators: Vec<StackedOperator> = Vec::new();
        // Arity of an operator is decided from its left context: binary
        // after a value or closing bracket, unary otherwise.
        let mut after_value = false;

        for token in &tokens {
            match token.kind {
                ExpressionTokenKind::HexLiteral => {
                    values.push(parse_with_radix::<T>(&token.text[2..], 16));
                    after_value = true;
                }
                ExpressionTokenKind::BinLiteral => {
                    values.push(parse_with_radix::<T>(&token.text[2..], 2));
                    after_value = true;
                }
                ExpressionTokenKind::DecLiteral => {
                    values.push(parse_with_radix::<T>(&token.text, 10));
                    after_value = true;
                }
                ExpressionTokenKind::CharLiteral => {
                    values.push(parse_character_literal::<T>(&token.text)?);
                    after_value = true;
                }
                ExpressionTokenKind::Identifier => {
                    return Err(format!("Unrecognized constant/label: {}", token.text));
                }
                ExpressionTokenKind::OpenBracket => {
                    if after_value {
                        return Err("Expected an operator before '('.".to_owned());
                    }
                    operators.push(StackedOperator::OpenBracket);
                }
                ExpressionTokenKind::CloseBracket => {
                    drain_to_bracket(&mut values, &mut operators)?;
                    after_value = true;
                }
                ExpressionTokenKind::Operator => {
                    if after_value {
                        let precedence = binary_precedence(&token.text).ok_or_else(|| {
                            format!("'{}' is not a binary operator.", token.text)
                        })?;
                        // Left-associative: drain every tighter or equally
                        // tight operator first.
                        while let Some(top) = operators.last() {
                            match top.precedence() {
                                Some(other) if other <= precedence => {
                                    let top = operators.pop().expect("peeked");
                                    apply(&mut values, top)?;
                                }
                                _ => break,
                            }
                        }
                        operators.push(StackedOperator::Binary(token.text.clone(), precedence));
                        after_value = false;
                    } else {
                        if !is_unary(&token.text) {
                            return Err(format!(
                                "'{}' is not a unary operator.",
                                token.text
                            ));
                        }
                        // Unary operators stack right-associatively; never
                        // drain on push.
                        operators.push(StackedOperator::Unary(token.text.clone()));
                    }
                }
            }
        }

        while let Some(top) = operators.pop() {
            if let StackedOperator::OpenBracket = top {
                return Err("Missing a closing bracket.".to_owned());
            }
            apply(&mut values, top)?;
        }
        match values.len() {
            1 => Ok(values[0]),
            _ => Err("Malformed expression.".to_owned()),
        }
    }
}

impl<T: ExpressionValue> Default for CLikeExpressionCompiler<T> {
    fn default() -> CLikeExpressionCompiler<T> {
        CLikeExpressionCompiler::new()
    }
}

fn tokenize(text: &str) -> Result<Vec<ExpressionToken>, String> {
    let mut tokens = Vec::new();
    let mut position = 0;
    while position < text.len() {
        let rest = &text[position..];
        let leading = rest.len() - rest.trim_start().len();
        position += leading;
        if position >= text.len() {
            break;
        }
        match EXPRESSION_MULTIREGEX.search_at(text, position) {
            Some(found) if found.position == position => {
                let kind = match found.choice {
                    0 => ExpressionTokenKind::HexLiteral,
                    1 => ExpressionTokenKind::BinLiteral,
                    2 => ExpressionTokenKind::DecLiteral,
                    3 => ExpressionTokenKind::CharLiteral,
                    4 => ExpressionTokenKind::Identifier,
                    5 => ExpressionTokenKind::Operator,
                    6 => ExpressionTokenKind::OpenBracket,
                    7 => ExpressionTokenKind::CloseBracket,
                    _ => unreachable!("pattern list and kinds are in sync"),
                };
                tokens.push(ExpressionToken {
                    kind,
                    text: found.text(text).to_owned(),
                });
                position = found.end();
            }
            _ => {
                return Err(format!(
                    "Unexpected characters in expression: '{}'",
                    rest.trim()
                ))
            }
        }
    }
    Ok(tokens)
}

/// Digit-by-digit parse with wrap-around in the target type; literals too
/// wide for the type keep their low bits.
fn parse_with_radix<T: ExpressionValue>(digits: &str, radix: u8) -> T {
    let base = T::from_u8(radix).expect("radix fits every integer type");
    let mut value = T::zero();
    for c in digits.chars() {
        if let Some(digit) = c.to_digit(u32::from(radix)) {
            let digit = T::from_u32(digit).expect("digit fits every integer type");
            value = value.wrapping_mul(&base).wrapping_add(&digit);
        }
    }
    value
}

/// Decodes a single-quoted C-style character literal to its code point.
fn parse_character_literal<T: ExpressionValue>(text: &str) -> Result<T, String> {
    let inner = &text[1..text.len() - 1];
    let mut chars = inner.chars();
    let first = chars
        .next()
        .ok_or_else(|| "Empty character literal.".to_owned())?;
    let code = if first == '\\' {
        decode_escape(&mut chars)?
    } else {
        if chars.next().is_some() {
            return Err(format!("Character literal {} holds more than one character.", text));
        }
        first as u32
    };
    if chars.next().is_some() {
        return Err(format!("Character literal {} holds more than one character.", text));
    }
    Ok(wrap_u64::<T>(u64::from(code)))
}

/// Folds a raw code point into the target type, wrapping like every other
/// literal.
fn wrap_u64<T: ExpressionValue>(raw: u64) -> T {
    let two = T::one().wrapping_add(&T::one());
    let mut value = T::zero();
    for i in (0..64).rev() {
        value = value.wrapping_mul(&two);
        if raw & (1u64 << i) != 0 {
            value = value.wrapping_add(&T::one());
        }
    }
    value
}

/// Decodes the escape sequence after a backslash; supports
/// `\n \t \r \0 \\ \' \" \xNN \NNN \uXXXX \UXXXXXXXX`.
fn decode_escape(chars: &mut std::str::Chars) -> Result<u32, String> {
    let marker = chars
        .next()
        .ok_or_else(|| "Dangling escape in character literal.".to_owned())?;
    let code = match marker {
        'n' => u32::from('\n'),
        't' => u32::from('\t'),
        'r' => u32::from('\r'),
        '0' => 0,
        '\\' => u32::from('\\'),
        '\'' => u32::from('\''),
        '"' => u32::from('"'),
        'x' => take_radix(chars, 2, 16)?,
        'u' => take_radix(chars, 4, 16)?,
        'U' => take_radix(chars, 8, 16)?,
        digit @ '1'..='7' => {
            let mut value = digit.to_digit(8).expect("checked octal digit");
            for _ in 0..2 {
                match chars.clone().next().and_then(|c| c.to_digit(8)) {
                    Some(d) => {
                        chars.next();
                        value = value * 8 + d;
                    }
                    None => break,
                }
            }
            value
        }
        other => return Err(format!("Unknown escape sequence '\\{}'.", other)),
    };
    Ok(code)
}

/// Decodes a double-quoted string literal, resolving the same escape
/// sequences character literals support.
pub fn unescape_string_literal(text: &str) -> Result<String, String> {
    let trimmed = text.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('"') || !trimmed.ends_with('"') {
        return Err(format!("'{}' is not a string literal.", text));
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    let mut decoded = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let code = decode_escape(&mut chars)?;
            let decoded_char = std::char::from_u32(code)
                .ok_or_else(|| format!("Escape value {:#x} is not a character.", code))?;
            decoded.push(decoded_char);
        } else {
            decoded.push(c);
        }
    }
    Ok(decoded)
}

fn take_radix(chars: &mut std::str::Chars, count: usize, radix: u32) -> Result<u32, String> {
    let mut value = 0u32;
    for _ in 0..count {
        let c = chars
            .next()
            .ok_or_else(|| "Escape sequence ended early.".to_owned())?;
        let digit = c
            .to_digit(radix)
            .ok_or_else(|| format!("'{}' is not a digit of the escape sequence.", c))?;
        value = value.wrapping_mul(radix).wrapping_add(digit);
    }
    Ok(value)
}

fn drain_to_bracket<T: ExpressionValue>(
    values: &mut Vec<T>,
    operators: &mut Vec<StackedOperator>,
) -> Result<(), String> {
    loop {
        match operators.pop() {
            Some(StackedOperator::OpenBracket) => return Ok(()),
            Some(operator) => apply(values, operator)?,
            None => return Err("Missing an opening bracket.".to_owned()),
        }
    }
}

fn apply<T: ExpressionValue>(
    values: &mut Vec<T>,
    operator: StackedOperator,
) -> Result<(), String> {
    match operator {
        StackedOperator::Unary(token) => {
            let value = values
                .pop()
                .ok_or_else(|| "An operand is missing.".to_owned())?;
            values.push(apply_unary(&token, value));
            Ok(())
        }
        StackedOperator::Binary(token, _) => {
            let second = values
                .pop()
                .ok_or_else(|| "An operand is missing.".to_owned())?;
            let first = values
                .pop()
                .ok_or_else(|| "An operand is missing.".to_owned())?;
            values.push(apply_binary(&token, first, second)?);
            Ok(())
        }
        StackedOperator::OpenBracket => unreachable!("brackets are drained explicitly"),
    }
}

fn bool_value<T: ExpressionValue>(condition: bool) -> T {
    if condition {
        T::one()
    } else {
        T::zero()
    }
}

fn shift_amount<T: ExpressionValue>(value: T) -> u32 {
    value
        .to_i64()
        .map(|v| v as u32)
        .or_else(|| value.to_u64().map(|v| v as u32))
        .unwrap_or(0)
}

fn apply_unary<T: ExpressionValue>(operator: &str, value: T) -> T {
    match operator {
        "+" => value,
        "-" => value.wrapping_neg(),
        "!" => bool_value(value == T::zero()),
        "~" => !value,
        _ => unreachable!("unary operators are filtered on push"),
    }
}

fn apply_binary<T: ExpressionValue>(operator: &str, first: T, second: T) -> Result<T, String> {
    let result = match operator {
        "||" => bool_value(first != T::zero() || second != T::zero()),
        "&&" => bool_value(first != T::zero() && second != T::zero()),
        "|" => first | second,
        "^" => first ^ second,
        "&" => first & second,
        "==" => bool_value(first == second),
        "!=" => bool_value(first != second),
        "<" => bool_value(first < second),
        "<=" => bool_value(first <= second),
        ">" => bool_value(first > second),
        ">=" => bool_value(first >= second),
        "<<" => first.wrapping_shl(shift_amount(second)),
        ">>" => first.wrapping_shr(shift_amount(second)),
        "+" => first.wrapping_add(&second),
        "-" => first.wrapping_sub(&second),
        "*" => first.wrapping_mul(&second),
        "/" => {
            if second == T::zero() {
                return Err("Division by zero".to_owned());
            }
            first.checked_div(&second).unwrap_or_else(T::min_value)
        }
        "%" => {
            if second == T::zero() {
                return Err("Division by zero".to_owned());
            }
            first.checked_rem(&second).unwrap_or_else(T::zero)
        }
        _ => unreachable!("binary operators are filtered on push"),
    };
    Ok(result)
}
