//! The assembly-line tokenizer.
//!
//! One multi-regex alternation consumes the longest leading match at every
//! step and emits `(position, length, kind)` triples. The register and
//! mnemonic alternatives are built from the brewed architecture, so the
//! same patterns double as the syntax-highlighting rules exposed to the
//! editor.

use num_traits::FromPrimitive;
use rvcore::arch::Architecture;
use util::Multiregex;

use crate::errors::CompileErrorList;
use crate::position::{CodePosition, CodePositionInterval};

#[derive(Clone, Copy, Debug, PartialEq, Eq, num_derive::FromPrimitive, num_derive::ToPrimitive)]
pub enum TokenKind {
    Comment,
    StringLiteral,
    CharLiteral,
    Directive,
    NumericLiteral,
    Register,
    Mnemonic,
    MacroParameter,
    Identifier,
    Comma,
    Colon,
    LeftParen,
    RightParen,
    Operator,
}

/// A positioned token within one source line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub position: usize,
    pub length: usize,
    pub kind: TokenKind,
}

impl Token {
    pub fn end(&self) -> usize {
        self.position + self.length
    }

    pub fn text<'t>(&self, line: &'t str) -> &'t str {
        &line[self.position..self.end()]
    }
}

pub struct RiscvTokenizer {
    patterns: Vec<String>,
    multiregex: Multiregex,
}

impl RiscvTokenizer {
    pub fn new(architecture: &Architecture) -> RiscvTokenizer {
        let mut registers: Vec<String> = architecture
            .units()
            .iter()
            .flat_map(|unit| unit.registers().iter().map(|r| r.name.clone()))
            .collect();
        // Longest first, so `x1` never shadows `x10` inside the
        // alternation.
        registers.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut mnemonics: Vec<String> = architecture
            .instructions()
            .mnemonics_sorted()
            .iter()
            .map(|m| (*m).to_owned())
            .collect();
        mnemonics.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let patterns = vec![
            r"[;#].*".to_owned(),
            r#""(?:\\.|[^"\\])*""#.to_owned(),
            r"'(?:\\.|[^'\\])+'".to_owned(),
            r"\.[A-Za-z_][A-Za-z0-9_]*".to_owned(),
            r"\b(?:0[xX][0-9A-Fa-f]+|0[bB][01]+|[0-9]+)\b".to_owned(),
            format!(r"(?i)\b(?:{})\b", registers.join("|")),
            format!(r"(?i)\b(?:{})\b", mnemonics.join("|")),
            r"\\[A-Za-z_][A-Za-z0-9_]*".to_owned(),
            r"[A-Za-z_][A-Za-z0-9_]*".to_owned(),
            r",".to_owned(),
            r":".to_owned(),
            r"\(".to_owned(),
            r"\)".to_owned(),
            r"<<|>>|<=|>=|==|!=|&&|\|\||[-+*/%&|^~!<>=]".to_owned(),
        ];
        let multiregex = Multiregex::new(&patterns);
        RiscvTokenizer {
            patterns,
            multiregex,
        }
    }

    /// The highlighting pattern for one token kind.
    pub fn syntax_regex(&self, kind: TokenKind) -> &str {
        &self.patterns[kind as usize]
    }

    /// Splits one line into tokens, skipping whitespace. Characters no
    /// alternative accepts are reported once per gap.
    pub fn tokenize(
        &self,
        line: &str,
        line_number: usize,
        errors: &mut CompileErrorList,
    ) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = skip_whitespace(line, 0);
        while position < line.len() {
            match self.multiregex.search_at(line, position) {
                Some(found) => {
                    if found.position != position {
                        report_gap(line, line_number, position, found.position, errors);
                    }
                    let kind = TokenKind::from_usize(found.choice)
                        .expect("pattern list and token kinds are in sync");
                    tokens.push(Token {
                        position: found.position,
                        length: found.length,
                        kind,
                    });
                    position = skip_whitespace(line, found.end());
                }
                None => {
                    report_gap(line, line_number, position, line.len(), errors);
                    break;
                }
            }
        }
        tokens
    }
}

fn skip_whitespace(line: &str, mut position: usize) -> usize {
    let bytes = line.as_bytes();
    while position < bytes.len() && (bytes[position] as char).is_whitespace() {
        position += 1;
    }
    position
}

fn report_gap(
    line: &str,
    line_number: usize,
    from: usize,
    to: usize,
    errors: &mut CompileErrorList,
) {
    let gap = line[from..to].trim();
    if !gap.is_empty() {
        errors.push_error_args(
            CodePositionInterval::new(
                CodePosition::new(line_number, from),
                CodePosition::new(line_number, to),
            ),
            "Unexpected characters '%1'.",
            vec![gap.to_owned()],
        );
    }
}
