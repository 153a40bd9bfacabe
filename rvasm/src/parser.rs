//! The line-oriented RISC-V assembly parser: tokens in, intermediate
//! operations out, final representation after the compile phases.

use log::debug;
use rvcore::arch::Architecture;
use rvcore::ast::MemoryAccess;
use rvcore::riscv::InstructionNodeFactory;

use crate::directives::{
    ConstantDirective, MemoryDefinitionDirective, MemoryReservationDirective, SectionDirective,
};
use crate::errors::CompileErrorList;
use crate::final_rep::FinalRepresentation;
use crate::ir::{
    IntermediateInstruction, IntermediateOperation, IntermediateRepresentator, OperationMeta,
};
use crate::lexer::{RiscvTokenizer, Token, TokenKind};
use crate::macros::{MacroDirective, MacroEndDirective};
use crate::position::{CodePosition, CodePositionInterval, PositionedString};

pub struct RiscvParser {
    architecture: Architecture,
    factory: InstructionNodeFactory,
    tokenizer: RiscvTokenizer,
}

impl RiscvParser {
    pub fn new(architecture: Architecture) -> RiscvParser {
        let factory = InstructionNodeFactory::new(&architecture);
        let tokenizer = RiscvTokenizer::new(&architecture);
        RiscvParser {
            architecture,
            factory,
            tokenizer,
        }
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    /// The highlighting pattern for one token kind, for the editor.
    pub fn syntax_regex(&self, kind: TokenKind) -> String {
        self.tokenizer.syntax_regex(kind).to_owned()
    }

    /// Runs the full pipeline over `source`. Data directives write their
    /// cells through `memory_access`; the returned representation carries
    /// all diagnostics.
    pub fn parse(
        &self,
        source: &str,
        memory_access: &mut dyn MemoryAccess,
    ) -> FinalRepresentation {
        debug!("parsing {} source bytes", source.len());
        let mut errors = CompileErrorList::new();
        let mut representator = IntermediateRepresentator::new();
        let mut pending_labels: Vec<PositionedString> = Vec::new();

        for (line_number, line) in source.lines().enumerate() {
            let mut tokens = self.tokenizer.tokenize(line, line_number, &mut errors);
            tokens.retain(|token| token.kind != TokenKind::Comment);

            let mut index = 0;
            while index + 1 < tokens.len()
                && is_label_name(tokens[index].kind)
                && tokens[index + 1].kind == TokenKind::Colon
            {
                pending_labels.push(positioned(line, line_number, &[tokens[index]]));
                index += 2;
            }
            if index >= tokens.len() {
                continue;
            }

            let labels = std::mem::replace(&mut pending_labels, Vec::new());
            let meta = OperationMeta::new(labels, CodePositionInterval::line(line_number));
            let head = tokens[index];
            let operands = split_operands(&tokens[index + 1..], line, line_number);

            match head.kind {
                TokenKind::Directive => {
                    let name = head.text(line)[1..].to_lowercase();
                    if let Some(operation) =
                        self.create_directive(&name, head, meta, operands, line, line_number, &mut errors)
                    {
                        representator.insert(operation, &mut errors);
                    }
                }
                TokenKind::Mnemonic | TokenKind::Identifier => {
                    representator.insert(
                        IntermediateOperation::Instruction(IntermediateInstruction {
                            meta,
                            mnemonic: positioned(line, line_number, &[head]),
                            operands,
                        }),
                        &mut errors,
                    );
                }
                _ => errors.push_error_args(
                    CodePositionInterval::line(line_number),
                    "Expected an instruction or a directive, found '%1'.",
                    vec![head.text(line).to_owned()],
                ),
            }
        }

        for label in pending_labels {
            errors.push_error_args(
                label.interval,
                "Label '%1' is not attached to any operation.",
                vec![label.string.clone()],
            );
        }

        representator.transform(&self.architecture, &self.factory, memory_access, errors)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_directive(
        &self,
        name: &str,
        head: Token,
        meta: OperationMeta,
        operands: Vec<PositionedString>,
        line: &str,
        line_number: usize,
        errors: &mut CompileErrorList,
    ) -> Option<IntermediateOperation> {
        let operation = match name {
            "section" => {
                if operands.len() != 1 {
                    errors.push_error(meta.interval, "'section' expects exactly one name.");
                    return None;
                }
                IntermediateOperation::Section(SectionDirective {
                    meta,
                    name: operands.into_iter().next().expect("length checked"),
                })
            }
            "equ" => IntermediateOperation::Constant(ConstantDirective {
                meta,
                arguments: operands,
            }),
            "macro" => {
                if operands.is_empty() {
                    errors.push_error(meta.interval, "'macro' expects a name.");
                    return None;
                }
                let directive_name = operands[0].string.trim().to_owned();
                let mut parameters = Vec::new();
                for parameter in &operands[1..] {
                    let text = parameter.string.trim();
                    if let Some(stripped) = text.strip_prefix('\\') {
                        parameters.push(stripped.to_owned());
                    } else {
                        errors.push_error_args(
                            parameter.interval,
                            "Macro parameter '%1' must start with a backslash.",
                            vec![text.to_owned()],
                        );
                    }
                }
                IntermediateOperation::Macro(MacroDirective {
                    meta,
                    name: directive_name,
                    parameters,
                    body: Vec::new(),
                })
            }
            "endm" => IntermediateOperation::MacroEnd(MacroEndDirective { meta }),
            "byte" => definition(meta, 1, operands),
            "half" => definition(meta, 2, operands),
            "word" => definition(meta, 4, operands),
            "dword" => definition(meta, 8, operands),
            "resb" => reservation(meta, 1, operands),
            "resh" => reservation(meta, 2, operands),
            "resw" => reservation(meta, 4, operands),
            "resd" => reservation(meta, 8, operands),
            _ => {
                errors.push_error_args(
                    interval_of(line_number, head),
                    "Unknown directive '%1'.",
                    vec![head.text(line).to_owned()],
                );
                return None;
            }
        };
        Some(operation)
    }
}

fn definition(
    meta: OperationMeta,
    cell_size: usize,
    values: Vec<PositionedString>,
) -> IntermediateOperation {
    IntermediateOperation::MemoryDefinition(MemoryDefinitionDirective::new(meta, cell_size, values))
}

fn reservation(
    meta: OperationMeta,
    cell_size: usize,
    values: Vec<PositionedString>,
) -> IntermediateOperation {
    IntermediateOperation::MemoryReservation(MemoryReservationDirective::new(
        meta, cell_size, values,
    ))
}

fn is_label_name(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Identifier | TokenKind::Mnemonic | TokenKind::Register
    )
}

fn interval_of(line_number: usize, token: Token) -> CodePositionInterval {
    CodePositionInterval::new(
        CodePosition::new(line_number, token.position),
        CodePosition::new(line_number, token.end()),
    )
}

fn positioned(line: &str, line_number: usize, tokens: &[Token]) -> PositionedString {
    let first = tokens.first().expect("at least one token");
    let last = tokens.last().expect("at least one token");
    PositionedString::new(
        line[first.position..last.end()].trim().to_owned(),
        CodePositionInterval::new(
            CodePosition::new(line_number, first.position),
            CodePosition::new(line_number, last.end()),
        ),
    )
}

/// Groups the operand tokens between top-level commas; parenthesized
/// groups keep their commas. Each operand keeps its raw source text for
/// symbol replacement and expression compilation.
fn split_operands(tokens: &[Token], line: &str, line_number: usize) -> Vec<PositionedString> {
    let mut operands = Vec::new();
    let mut group: Vec<Token> = Vec::new();
    let mut depth = 0usize;
    for token in tokens {
        match token.kind {
            TokenKind::LeftParen => {
                depth += 1;
                group.push(*token);
            }
            TokenKind::RightParen => {
                depth = depth.saturating_sub(1);
                group.push(*token);
            }
            TokenKind::Comma if depth == 0 => {
                operands.push(operand_from(&group, line, line_number));
                group.clear();
            }
            _ => group.push(*token),
        }
    }
    if !group.is_empty() || !operands.is_empty() {
        operands.push(operand_from(&group, line, line_number));
    }
    operands
}

fn operand_from(group: &[Token], line: &str, line_number: usize) -> PositionedString {
    if group.is_empty() {
        return PositionedString::new("", CodePositionInterval::line(line_number));
    }
    positioned(line, line_number, group)
}
