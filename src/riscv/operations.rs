//! Execution and validation semantics of the RISC-V instruction nodes.

use log::trace;

use crate::arch::{ArchitectureProperties, InstructionFormat};
use crate::ast::{
    InstructionNode, MemoryAccess, NodeType, SyntaxTreeNode, Translateable, ValidationResult,
};
use crate::conversions::{self, DataFormat};
use crate::value::MemoryValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRightLogical,
    ShiftRightArithmetic,
    SetLessThan,
    SetLessThanUnsigned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MulDivOp {
    Mul,
    Mulh,
    Mulhu,
    Mulhsu,
    Div,
    Divu,
    Rem,
    Remu,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchCondition {
    Equal,
    NotEqual,
    LessThan,
    GreaterEqual,
    LessThanUnsigned,
    GreaterEqualUnsigned,
}

/// What an instruction node does when stepped. `word` marks the rv64
/// `…w` variants that operate on the lower 32 bits and sign-extend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Arithmetic {
        op: ArithmeticOp,
        immediate: bool,
        word: bool,
    },
    MulDiv {
        op: MulDivOp,
        word: bool,
    },
    Load {
        bytes: usize,
        signed: bool,
    },
    Store {
        bytes: usize,
    },
    Branch {
        condition: BranchCondition,
    },
    Lui,
    Auipc,
    Jal,
    Jalr,
    Sleep,
    Crash,
}

fn word_mask(word_size: usize) -> u64 {
    if word_size == 64 {
        u64::max_value()
    } else {
        (1u64 << word_size) - 1
    }
}

fn read_register(access: &mut dyn MemoryAccess, name: &str, format: &DataFormat) -> u64 {
    conversions::to_unsigned(&access.get_register_value(name), format)
}

fn write_register(
    access: &mut dyn MemoryAccess,
    name: &str,
    raw: u64,
    properties: &ArchitectureProperties,
) {
    let value = conversions::from_unsigned(raw, properties.word_size, &properties.format);
    access.put_register_value(name, &value);
}

fn register_name(node: &SyntaxTreeNode) -> &str {
    match node {
        SyntaxTreeNode::Register(register) => &register.name,
        _ => panic!("operand is not a register; validation must run first"),
    }
}

fn immediate_signed(node: &SyntaxTreeNode, format: &DataFormat) -> i64 {
    match node {
        SyntaxTreeNode::Immediate(immediate) => conversions::to_signed(&immediate.value, format),
        _ => panic!("operand is not an immediate; validation must run first"),
    }
}

fn immediate_unsigned(node: &SyntaxTreeNode, format: &DataFormat) -> u64 {
    match node {
        SyntaxTreeNode::Immediate(immediate) => conversions::to_unsigned(&immediate.value, format),
        _ => panic!("operand is not an immediate; validation must run first"),
    }
}

/// Sign-extends the low `from` bits of `raw` to the full word.
fn sign_extend(raw: u64, from: usize, word_size: usize) -> u64 {
    let shift = 64 - from;
    (((raw << shift) as i64 >> shift) as u64) & word_mask(word_size)
}

fn to_signed_word(raw: u64, word_size: usize) -> i64 {
    let shift = 64 - word_size;
    ((raw << shift) as i64) >> shift
}

fn program_counter(access: &mut dyn MemoryAccess, properties: &ArchitectureProperties) -> u64 {
    read_register(access, &properties.program_counter, &properties.format)
}

fn pc_value(raw: u64, properties: &ArchitectureProperties) -> MemoryValue {
    conversions::from_unsigned(raw, properties.word_size, &properties.format)
}

// --- static validation -----------------------------------------------------

struct OperandShape {
    kinds: &'static [NodeType],
    /// Bit width of the immediate operand, if any.
    immediate_bits: Option<usize>,
    immediate_signed: bool,
}

const REG: NodeType = NodeType::Register;
const IMM: NodeType = NodeType::Immediate;
const DATA: NodeType = NodeType::Data;

fn operand_shape(operation: &Operation) -> OperandShape {
    match operation {
        Operation::Arithmetic {
            op,
            immediate: true,
            ..
        } => {
            let shift = matches!(
                op,
                ArithmeticOp::ShiftLeft
                    | ArithmeticOp::ShiftRightLogical
                    | ArithmeticOp::ShiftRightArithmetic
            );
            OperandShape {
                kinds: &[REG, REG, IMM],
                immediate_bits: Some(if shift { 5 } else { 12 }),
                immediate_signed: !shift,
            }
        }
        Operation::Arithmetic {
            immediate: false, ..
        }
        | Operation::MulDiv { .. } => OperandShape {
            kinds: &[REG, REG, REG],
            immediate_bits: None,
            immediate_signed: false,
        },
        Operation::Load { .. } | Operation::Store { .. } => OperandShape {
            kinds: &[REG, REG, IMM],
            immediate_bits: Some(12),
            immediate_signed: true,
        },
        Operation::Branch { .. } => OperandShape {
            kinds: &[REG, REG, IMM],
            immediate_bits: Some(12),
            immediate_signed: true,
        },
        Operation::Lui | Operation::Auipc => OperandShape {
            kinds: &[REG, IMM],
            immediate_bits: Some(20),
            immediate_signed: false,
        },
        Operation::Jal => OperandShape {
            kinds: &[REG, IMM],
            immediate_bits: Some(20),
            immediate_signed: true,
        },
        Operation::Jalr => OperandShape {
            kinds: &[REG, REG, IMM],
            immediate_bits: Some(12),
            immediate_signed: true,
        },
        Operation::Sleep => OperandShape {
            kinds: &[IMM],
            immediate_bits: Some(32),
            immediate_signed: false,
        },
        Operation::Crash => OperandShape {
            kinds: &[DATA],
            immediate_bits: None,
            immediate_signed: false,
        },
    }
}

pub fn validate(node: &InstructionNode, _access: &mut dyn MemoryAccess) -> ValidationResult {
    let shape = operand_shape(&node.operation);
    if node.children.len() != shape.kinds.len() {
        return ValidationResult::Failure(Translateable::with_args(
            "Instruction '%1' expects %2 operands, got %3.",
            vec![
                node.info.mnemonic.clone(),
                shape.kinds.len().to_string(),
                node.children.len().to_string(),
            ],
        ));
    }
    for (child, expected) in node.children.iter().zip(shape.kinds) {
        if child.node_type() != *expected {
            return ValidationResult::Failure(Translateable::with_args(
                "Operand '%1' of instruction '%2' has the wrong kind.",
                vec![child.identifier(), node.info.mnemonic.clone()],
            ));
        }
    }
    if let Some(bits) = shape.immediate_bits {
        let immediate = node
            .children
            .iter()
            .find(|child| child.node_type() == NodeType::Immediate)
            .expect("shape guarantees an immediate operand");
        if let SyntaxTreeNode::Immediate(operand) = immediate {
            if conversions::occupies_more_bits_than(&operand.value, bits, shape.immediate_signed) {
                return ValidationResult::Failure(Translateable::with_args(
                    "Immediate value of instruction '%1' does not fit into %2 bits.",
                    vec![node.info.mnemonic.clone(), bits.to_string()],
                ));
            }
        }
    }
    ValidationResult::Success
}

// --- runtime validation ----------------------------------------------------

pub fn validate_runtime(node: &InstructionNode, access: &mut dyn MemoryAccess) -> ValidationResult {
    let properties = &node.properties;
    match node.operation {
        Operation::Load { bytes, .. } | Operation::Store { bytes } => {
            let base = read_register(access, register_name(&node.children[1]), &properties.format);
            let offset = immediate_signed(&node.children[2], &properties.format);
            let address = to_signed_word(base, properties.word_size).wrapping_add(offset);
            let size = access.get_memory_size() as i64;
            if address < 0 || address + bytes as i64 > size {
                return ValidationResult::Failure(Translateable::with_args(
                    "Memory access at address %1 is outside the memory of %2 cells.",
                    vec![address.to_string(), size.to_string()],
                ));
            }
            ValidationResult::Success
        }
        Operation::Sleep => {
            let operand = &node.children[0];
            if let SyntaxTreeNode::Immediate(immediate) = operand {
                if conversions::to_signed(&immediate.value, &properties.format) < 0 {
                    return ValidationResult::Failure(Translateable::new(
                        "The sleep duration must not be negative.",
                    ));
                }
            }
            ValidationResult::Success
        }
        Operation::Crash => {
            let text = match &node.children[0] {
                SyntaxTreeNode::Data(data) => data.data.clone(),
                other => other.identifier(),
            };
            ValidationResult::Failure(Translateable::with_args(
                "Simulator crash: %1",
                vec![text],
            ))
        }
        _ => ValidationResult::Success,
    }
}

// --- execution -------------------------------------------------------------

/// Steps the instruction: performs its effect and returns the next
/// program-counter value.
pub fn execute(node: &InstructionNode, access: &mut dyn MemoryAccess) -> MemoryValue {
    let properties = &node.properties;
    let format = &properties.format;
    let word_size = properties.word_size;
    let mask = word_mask(word_size);
    let pc = program_counter(access, properties);
    trace!("executing {} at pc {}", node.info.mnemonic, pc);
    let next_pc = pc.wrapping_add(4) & mask;

    match node.operation {
        Operation::Arithmetic {
            op,
            immediate,
            word,
        } => {
            let destination = register_name(&node.children[0]);
            let first = read_register(access, register_name(&node.children[1]), format);
            let second = if immediate {
                (immediate_signed(&node.children[2], format) as u64) & mask
            } else {
                read_register(access, register_name(&node.children[2]), format)
            };
            let result = if word {
                let value = arithmetic(op, first & 0xffff_ffff, second & 0xffff_ffff, 32);
                sign_extend(value, 32, word_size)
            } else {
                arithmetic(op, first, second, word_size)
            };
            write_register(access, destination, result & mask, properties);
        }
        Operation::MulDiv { op, word } => {
            let destination = register_name(&node.children[0]);
            let first = read_register(access, register_name(&node.children[1]), format);
            let second = read_register(access, register_name(&node.children[2]), format);
            let result = if word {
                let value = mul_div(op, first & 0xffff_ffff, second & 0xffff_ffff, 32);
                sign_extend(value, 32, word_size)
            } else {
                mul_div(op, first, second, word_size)
            };
            write_register(access, destination, result & mask, properties);
        }
        Operation::Load { bytes, signed } => {
            let destination = register_name(&node.children[0]);
            let base = read_register(access, register_name(&node.children[1]), format);
            let offset = immediate_signed(&node.children[2], format);
            let address = to_signed_word(base, word_size).wrapping_add(offset) as usize;
            let cell = access.get_memory_value_at(address, bytes);
            let raw = conversions::to_unsigned(&cell, format);
            let value = if signed {
                sign_extend(raw, bytes * properties.byte_size, word_size)
            } else {
                raw
            };
            write_register(access, destination, value & mask, properties);
        }
        Operation::Store { bytes } => {
            let source = read_register(access, register_name(&node.children[0]), format);
            let base = read_register(access, register_name(&node.children[1]), format);
            let offset = immediate_signed(&node.children[2], format);
            let address = to_signed_word(base, word_size).wrapping_add(offset) as usize;
            let value = conversions::from_unsigned(source, bytes * properties.byte_size, format);
            access.put_memory_value_at(address, &value);
        }
        Operation::Branch { condition } => {
            let first = read_register(access, register_name(&node.children[0]), format);
            let second = read_register(access, register_name(&node.children[1]), format);
            let offset = immediate_signed(&node.children[2], format);
            let taken = match condition {
                BranchCondition::Equal => first == second,
                BranchCondition::NotEqual => first != second,
                BranchCondition::LessThan => {
                    to_signed_word(first, word_size) < to_signed_word(second, word_size)
                }
                BranchCondition::GreaterEqual => {
                    to_signed_word(first, word_size) >= to_signed_word(second, word_size)
                }
                BranchCondition::LessThanUnsigned => first < second,
                BranchCondition::GreaterEqualUnsigned => first >= second,
            };
            if taken {
                let target = (pc as i64).wrapping_add(2 * offset) as u64 & mask;
                return pc_value(target, properties);
            }
        }
        Operation::Lui => {
            let destination = register_name(&node.children[0]);
            let immediate = immediate_unsigned(&node.children[1], format);
            let result = sign_extend((immediate << 12) & 0xffff_ffff, 32, word_size);
            write_register(access, destination, result & mask, properties);
        }
        Operation::Auipc => {
            let destination = register_name(&node.children[0]);
            let immediate = immediate_unsigned(&node.children[1], format);
            let offset = sign_extend((immediate << 12) & 0xffff_ffff, 32, word_size);
            write_register(access, destination, pc.wrapping_add(offset) & mask, properties);
        }
        Operation::Jal => {
            let destination = register_name(&node.children[0]);
            let offset = immediate_signed(&node.children[1], format);
            write_register(access, destination, next_pc, properties);
            let target = (pc as i64).wrapping_add(2 * offset) as u64 & mask;
            return pc_value(target, properties);
        }
        Operation::Jalr => {
            let destination = register_name(&node.children[0]);
            let base = read_register(access, register_name(&node.children[1]), format);
            let offset = immediate_signed(&node.children[2], format);
            write_register(access, destination, next_pc, properties);
            let target = (to_signed_word(base, word_size).wrapping_add(offset) as u64) & mask;
            return pc_value(target, properties);
        }
        Operation::Sleep => {
            let milliseconds = immediate_unsigned(&node.children[0], format);
            access.sleep(milliseconds);
        }
        Operation::Crash => {
            panic!("crash instructions fail runtime validation and are never executed")
        }
    }
    pc_value(next_pc, properties)
}

fn arithmetic(op: ArithmeticOp, first: u64, second: u64, word_size: usize) -> u64 {
    let mask = word_mask(word_size);
    // Shift amounts take the lower five bits of the second operand.
    let shamt = (second & 0x1f) as u32;
    match op {
        ArithmeticOp::Add => first.wrapping_add(second) & mask,
        ArithmeticOp::Sub => first.wrapping_sub(second) & mask,
        ArithmeticOp::And => first & second,
        ArithmeticOp::Or => first | second,
        ArithmeticOp::Xor => first ^ second,
        ArithmeticOp::ShiftLeft => first.wrapping_shl(shamt) & mask,
        ArithmeticOp::ShiftRightLogical => (first & mask).wrapping_shr(shamt),
        ArithmeticOp::ShiftRightArithmetic => {
            (to_signed_word(first, word_size) >> shamt) as u64 & mask
        }
        ArithmeticOp::SetLessThan => {
            (to_signed_word(first, word_size) < to_signed_word(second, word_size)) as u64
        }
        ArithmeticOp::SetLessThanUnsigned => ((first & mask) < (second & mask)) as u64,
    }
}

fn mul_div(op: MulDivOp, first: u64, second: u64, word_size: usize) -> u64 {
    let mask = word_mask(word_size);
    let first_signed = to_signed_word(first, word_size);
    let second_signed = to_signed_word(second, word_size);
    match op {
        MulDivOp::Mul => first.wrapping_mul(second) & mask,
        MulDivOp::Mulh => {
            let product = i128::from(first_signed) * i128::from(second_signed);
            ((product >> word_size) as u64) & mask
        }
        MulDivOp::Mulhu => {
            let product = u128::from(first & mask) * u128::from(second & mask);
            ((product >> word_size) as u64) & mask
        }
        MulDivOp::Mulhsu => {
            let product = i128::from(first_signed) * i128::from(second & mask);
            ((product >> word_size) as u64) & mask
        }
        // Division edge cases follow the RISC-V convention: no traps.
        MulDivOp::Div => {
            if second_signed == 0 {
                mask
            } else if first_signed == min_signed(word_size) && second_signed == -1 {
                first & mask
            } else {
                (first_signed / second_signed) as u64 & mask
            }
        }
        MulDivOp::Divu => {
            if second & mask == 0 {
                mask
            } else {
                ((first & mask) / (second & mask)) & mask
            }
        }
        MulDivOp::Rem => {
            if second_signed == 0 {
                first & mask
            } else if first_signed == min_signed(word_size) && second_signed == -1 {
                0
            } else {
                (first_signed % second_signed) as u64 & mask
            }
        }
        MulDivOp::Remu => {
            if second & mask == 0 {
                first & mask
            } else {
                ((first & mask) % (second & mask)) & mask
            }
        }
    }
}

fn min_signed(word_size: usize) -> i64 {
    i64::min_value() >> (64 - word_size)
}

/// True for the formats whose immediate is a jump distance, i.e. whose
/// label operands are written PC-relative.
pub fn is_relative_format(format: InstructionFormat) -> bool {
    matches!(format, InstructionFormat::SB | InstructionFormat::UJ)
}
