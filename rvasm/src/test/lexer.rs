use crate::errors::CompileErrorList;
use crate::lexer::{RiscvTokenizer, TokenKind};
use crate::test::test_project;

fn kinds_of(line: &str) -> Vec<TokenKind> {
    let project = test_project();
    let tokenizer = RiscvTokenizer::new(project.architecture());
    let mut errors = CompileErrorList::new();
    let tokens = tokenizer.tokenize(line, 0, &mut errors);
    assert!(!errors.has_errors(), "{:?}", errors.errors());
    tokens.iter().map(|token| token.kind).collect()
}

#[test]
fn instruction_line() {
    assert_eq!(
        kinds_of("addi x1, x0, 42"),
        vec![
            TokenKind::Mnemonic,
            TokenKind::Register,
            TokenKind::Comma,
            TokenKind::Register,
            TokenKind::Comma,
            TokenKind::NumericLiteral,
        ]
    );
}

#[test]
fn labeled_branch_line() {
    assert_eq!(
        kinds_of("loop: beq x1, x2, loop"),
        vec![
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::Mnemonic,
            TokenKind::Register,
            TokenKind::Comma,
            TokenKind::Register,
            TokenKind::Comma,
            TokenKind::Identifier,
        ]
    );
}

#[test]
fn longest_register_name_wins() {
    let project = test_project();
    let tokenizer = RiscvTokenizer::new(project.architecture());
    let mut errors = CompileErrorList::new();
    let tokens = tokenizer.tokenize("x10", 0, &mut errors);
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Register);
    assert_eq!(tokens[0].length, 3);
}

#[test]
fn mnemonics_are_case_insensitive() {
    assert_eq!(kinds_of("ADDI x1, x1, 1")[0], TokenKind::Mnemonic);
}

#[test]
fn comments_reach_end_of_line() {
    assert_eq!(
        kinds_of("nop ; trailing words, even commas"),
        vec![TokenKind::Mnemonic, TokenKind::Comment]
    );
    assert_eq!(
        kinds_of("# full line comment"),
        vec![TokenKind::Comment]
    );
}

#[test]
fn directives_strings_and_memory_operands() {
    assert_eq!(
        kinds_of(r#".word 1, "ab", label"#),
        vec![
            TokenKind::Directive,
            TokenKind::NumericLiteral,
            TokenKind::Comma,
            TokenKind::StringLiteral,
            TokenKind::Comma,
            TokenKind::Identifier,
        ]
    );
    assert_eq!(
        kinds_of("lw x1, 4(x2)"),
        vec![
            TokenKind::Mnemonic,
            TokenKind::Register,
            TokenKind::Comma,
            TokenKind::NumericLiteral,
            TokenKind::LeftParen,
            TokenKind::Register,
            TokenKind::RightParen,
        ]
    );
}

#[test]
fn macro_parameters() {
    assert_eq!(
        kinds_of(r".macro addten, \reg"),
        vec![
            TokenKind::Directive,
            TokenKind::Identifier,
            TokenKind::Comma,
            TokenKind::MacroParameter,
        ]
    );
}

#[test]
fn token_positions_index_the_source_line() {
    let project = test_project();
    let tokenizer = RiscvTokenizer::new(project.architecture());
    let mut errors = CompileErrorList::new();
    let line = "  addi  x1, x0, 7";
    let tokens = tokenizer.tokenize(line, 0, &mut errors);
    assert_eq!(tokens[0].text(line), "addi");
    assert_eq!(tokens[0].position, 2);
    assert_eq!(tokens[1].text(line), "x1");
}

#[test]
fn unknown_characters_are_reported() {
    let project = test_project();
    let tokenizer = RiscvTokenizer::new(project.architecture());
    let mut errors = CompileErrorList::new();
    tokenizer.tokenize("addi x1, x0, `", 0, &mut errors);
    assert!(errors.has_errors());
}

#[test]
fn syntax_regexes_are_exposed_per_kind() {
    let project = test_project();
    let tokenizer = RiscvTokenizer::new(project.architecture());
    let mnemonic = tokenizer.syntax_regex(TokenKind::Mnemonic);
    assert!(mnemonic.contains("addi"));
    assert!(mnemonic.contains("simusleep"));
    let register = tokenizer.syntax_regex(TokenKind::Register);
    assert!(register.contains("x31"));
    assert!(register.contains("pc"));
}
