//! Per-mnemonic construction of instruction nodes.
//!
//! The factory owns the mapping from mnemonic to operation semantics and
//! expands the assembler aliases (`nop`, `mv`, `li`, `j`, `beqz`, `bnez`,
//! single-operand `jal`) into their base shapes before the node is built.

use std::collections::HashMap;
use std::sync::Arc;

use crate::arch::{Architecture, ArchitectureProperties, InstructionSet};
use crate::ast::{InstructionNode, SyntaxTreeNode, Translateable};
use crate::conversions;
use crate::riscv::operations::{ArithmeticOp, BranchCondition, MulDivOp, Operation};

pub struct InstructionNodeFactory {
    instructions: InstructionSet,
    properties: Arc<ArchitectureProperties>,
    register_ids: HashMap<String, usize>,
}

impl InstructionNodeFactory {
    pub fn new(architecture: &Architecture) -> InstructionNodeFactory {
        let mut register_ids = HashMap::new();
        for unit in architecture.units() {
            for register in unit.registers() {
                register_ids.insert(register.name.clone(), register.id);
            }
        }
        InstructionNodeFactory {
            instructions: architecture.instructions().clone(),
            properties: architecture.properties(),
            register_ids,
        }
    }

    pub fn supports(&self, mnemonic: &str) -> bool {
        self.instructions.contains(mnemonic)
    }

    pub fn instruction_set(&self) -> &InstructionSet {
        &self.instructions
    }

    pub fn properties(&self) -> Arc<ArchitectureProperties> {
        Arc::clone(&self.properties)
    }

    /// Builds the node for `mnemonic` with the given operand children.
    /// Aliases are reshaped here; all remaining validation is left to the
    /// node's `validate`.
    pub fn create(
        &self,
        mnemonic: &str,
        operands: Vec<SyntaxTreeNode>,
    ) -> Result<SyntaxTreeNode, Translateable> {
        let mnemonic = mnemonic.to_lowercase();
        let info = self.instructions.get(&mnemonic).ok_or_else(|| {
            Translateable::with_args("Unknown instruction '%1'.", vec![mnemonic.clone()])
        })?;

        let (operation, children) = self.reshape(&mnemonic, operands)?;
        Ok(SyntaxTreeNode::Instruction(InstructionNode {
            info: info.clone(),
            operation,
            properties: Arc::clone(&self.properties),
            children,
        }))
    }

    fn zero_register(&self) -> SyntaxTreeNode {
        SyntaxTreeNode::register("x0", self.register_ids["x0"])
    }

    fn link_register(&self) -> SyntaxTreeNode {
        let name = self.properties.link_register.clone();
        SyntaxTreeNode::register(&name, self.register_ids[&name])
    }

    fn zero_immediate(&self) -> SyntaxTreeNode {
        SyntaxTreeNode::immediate(conversions::from_signed(
            0,
            self.properties.word_size,
            &self.properties.format,
        ))
    }

    fn wrong_operand_count(
        &self,
        mnemonic: &str,
        expected: usize,
        got: usize,
    ) -> Translateable {
        Translateable::with_args(
            "Instruction '%1' expects %2 operands, got %3.",
            vec![mnemonic.to_owned(), expected.to_string(), got.to_string()],
        )
    }

    fn reshape(
        &self,
        mnemonic: &str,
        mut operands: Vec<SyntaxTreeNode>,
    ) -> Result<(Operation, Vec<SyntaxTreeNode>), Translateable> {
        let operation = match mnemonic {
            "nop" => {
                if !operands.is_empty() {
                    return Err(self.wrong_operand_count(mnemonic, 0, operands.len()));
                }
                operands = vec![self.zero_register(), self.zero_register(), self.zero_immediate()];
                arithmetic(ArithmeticOp::Add, true, false)
            }
            "mv" => {
                if operands.len() != 2 {
                    return Err(self.wrong_operand_count(mnemonic, 2, operands.len()));
                }
                operands.push(self.zero_immediate());
                arithmetic(ArithmeticOp::Add, true, false)
            }
            "li" => {
                if operands.len() != 2 {
                    return Err(self.wrong_operand_count(mnemonic, 2, operands.len()));
                }
                operands.insert(1, self.zero_register());
                arithmetic(ArithmeticOp::Add, true, false)
            }
            "j" => {
                if operands.len() != 1 {
                    return Err(self.wrong_operand_count(mnemonic, 1, operands.len()));
                }
                operands.insert(0, self.zero_register());
                Operation::Jal
            }
            "jal" => {
                // A single operand means "link into the link register".
                if operands.len() == 1 {
                    operands.insert(0, self.link_register());
                }
                Operation::Jal
            }
            "beqz" => {
                if operands.len() != 2 {
                    return Err(self.wrong_operand_count(mnemonic, 2, operands.len()));
                }
                operands.insert(1, self.zero_register());
                Operation::Branch {
                    condition: BranchCondition::Equal,
                }
            }
            "bnez" => {
                if operands.len() != 2 {
                    return Err(self.wrong_operand_count(mnemonic, 2, operands.len()));
                }
                operands.insert(1, self.zero_register());
                Operation::Branch {
                    condition: BranchCondition::NotEqual,
                }
            }
            base => base_operation(base).ok_or_else(|| {
                Translateable::with_args("Unknown instruction '%1'.", vec![base.to_owned()])
            })?,
        };
        Ok((operation, operands))
    }
}

fn arithmetic(op: ArithmeticOp, immediate: bool, word: bool) -> Operation {
    Operation::Arithmetic {
        op,
        immediate,
        word,
    }
}

fn mul_div(op: MulDivOp, word: bool) -> Operation {
    Operation::MulDiv { op, word }
}

fn branch(condition: BranchCondition) -> Operation {
    Operation::Branch { condition }
}

fn base_operation(mnemonic: &str) -> Option<Operation> {
    let operation = match mnemonic {
        "add" => arithmetic(ArithmeticOp::Add, false, false),
        "sub" => arithmetic(ArithmeticOp::Sub, false, false),
        "and" => arithmetic(ArithmeticOp::And, false, false),
        "or" => arithmetic(ArithmeticOp::Or, false, false),
        "xor" => arithmetic(ArithmeticOp::Xor, false, false),
        "sll" => arithmetic(ArithmeticOp::ShiftLeft, false, false),
        "srl" => arithmetic(ArithmeticOp::ShiftRightLogical, false, false),
        "sra" => arithmetic(ArithmeticOp::ShiftRightArithmetic, false, false),
        "slt" => arithmetic(ArithmeticOp::SetLessThan, false, false),
        "sltu" => arithmetic(ArithmeticOp::SetLessThanUnsigned, false, false),
        "addi" => arithmetic(ArithmeticOp::Add, true, false),
        "andi" => arithmetic(ArithmeticOp::And, true, false),
        "ori" => arithmetic(ArithmeticOp::Or, true, false),
        "xori" => arithmetic(ArithmeticOp::Xor, true, false),
        "slli" => arithmetic(ArithmeticOp::ShiftLeft, true, false),
        "srli" => arithmetic(ArithmeticOp::ShiftRightLogical, true, false),
        "srai" => arithmetic(ArithmeticOp::ShiftRightArithmetic, true, false),
        "slti" => arithmetic(ArithmeticOp::SetLessThan, true, false),
        "sltiu" => arithmetic(ArithmeticOp::SetLessThanUnsigned, true, false),
        "addw" => arithmetic(ArithmeticOp::Add, false, true),
        "subw" => arithmetic(ArithmeticOp::Sub, false, true),
        "sllw" => arithmetic(ArithmeticOp::ShiftLeft, false, true),
        "srlw" => arithmetic(ArithmeticOp::ShiftRightLogical, false, true),
        "sraw" => arithmetic(ArithmeticOp::ShiftRightArithmetic, false, true),
        "addiw" => arithmetic(ArithmeticOp::Add, true, true),
        "slliw" => arithmetic(ArithmeticOp::ShiftLeft, true, true),
        "srliw" => arithmetic(ArithmeticOp::ShiftRightLogical, true, true),
        "sraiw" => arithmetic(ArithmeticOp::ShiftRightArithmetic, true, true),
        "mul" => mul_div(MulDivOp::Mul, false),
        "mulh" => mul_div(MulDivOp::Mulh, false),
        "mulhu" => mul_div(MulDivOp::Mulhu, false),
        "mulhsu" => mul_div(MulDivOp::Mulhsu, false),
        "div" => mul_div(MulDivOp::Div, false),
        "divu" => mul_div(MulDivOp::Divu, false),
        "rem" => mul_div(MulDivOp::Rem, false),
        "remu" => mul_div(MulDivOp::Remu, false),
        "mulw" => mul_div(MulDivOp::Mul, true),
        "divw" => mul_div(MulDivOp::Div, true),
        "divuw" => mul_div(MulDivOp::Divu, true),
        "remw" => mul_div(MulDivOp::Rem, true),
        "remuw" => mul_div(MulDivOp::Remu, true),
        "lb" => Operation::Load { bytes: 1, signed: true },
        "lh" => Operation::Load { bytes: 2, signed: true },
        "lw" => Operation::Load { bytes: 4, signed: true },
        "ld" => Operation::Load { bytes: 8, signed: true },
        "lbu" => Operation::Load { bytes: 1, signed: false },
        "lhu" => Operation::Load { bytes: 2, signed: false },
        "lwu" => Operation::Load { bytes: 4, signed: false },
        "sb" => Operation::Store { bytes: 1 },
        "sh" => Operation::Store { bytes: 2 },
        "sw" => Operation::Store { bytes: 4 },
        "sd" => Operation::Store { bytes: 8 },
        "beq" => branch(BranchCondition::Equal),
        "bne" => branch(BranchCondition::NotEqual),
        "blt" => branch(BranchCondition::LessThan),
        "bge" => branch(BranchCondition::GreaterEqual),
        "bltu" => branch(BranchCondition::LessThanUnsigned),
        "bgeu" => branch(BranchCondition::GreaterEqualUnsigned),
        "lui" => Operation::Lui,
        "auipc" => Operation::Auipc,
        "jalr" => Operation::Jalr,
        "simusleep" => Operation::Sleep,
        "simucrash" => Operation::Crash,
        _ => return None,
    };
    Some(operation)
}
