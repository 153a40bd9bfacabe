//! Bit-exact encoders for the six RISC-V instruction formats.
//!
//! Each encoder takes the instruction key and the already-resolved operand
//! nodes and concatenates the fields in the standard layout; the branch and
//! jump formats scatter their immediates across the word as the
//! specification tables prescribe.

use byteorder::{ByteOrder, LittleEndian};

use crate::arch::{InstructionFormat, InstructionKey};
use crate::ast::{InstructionNode, SyntaxTreeNode};
use crate::conversions;
use crate::value::MemoryValue;

fn register_id(node: &SyntaxTreeNode) -> u32 {
    match node {
        SyntaxTreeNode::Register(register) => register.id as u32,
        _ => panic!("operand is not a register; validation must run first"),
    }
}

fn immediate_bits(node: &InstructionNode, index: usize) -> u32 {
    match &node.children[index] {
        SyntaxTreeNode::Immediate(immediate) => {
            conversions::to_signed(&immediate.value, &node.properties.format) as u32
        }
        _ => panic!("operand is not an immediate; validation must run first"),
    }
}

fn funct3(key: &InstructionKey) -> u32 {
    key.get("funct3").unwrap_or(0) & 0x7
}

fn funct7(key: &InstructionKey) -> u32 {
    key.get("funct7").unwrap_or(0) & 0x7f
}

fn r_format(key: &InstructionKey, rd: u32, rs1: u32, rs2: u32) -> u32 {
    key.opcode()
        | (rd & 0x1f) << 7
        | funct3(key) << 12
        | (rs1 & 0x1f) << 15
        | (rs2 & 0x1f) << 20
        | funct7(key) << 25
}

fn i_format(key: &InstructionKey, rd: u32, rs1: u32, immediate: u32) -> u32 {
    // Shift-immediate instructions carry their funct7 in the upper bits of
    // the immediate field.
    let immediate = if key.get("funct7").is_some() {
        funct7(key) << 5 | (immediate & 0x1f)
    } else {
        immediate & 0xfff
    };
    key.opcode() | (rd & 0x1f) << 7 | funct3(key) << 12 | (rs1 & 0x1f) << 15 | immediate << 20
}

fn s_format(key: &InstructionKey, rs2: u32, rs1: u32, immediate: u32) -> u32 {
    key.opcode()
        | (immediate & 0x1f) << 7
        | funct3(key) << 12
        | (rs1 & 0x1f) << 15
        | (rs2 & 0x1f) << 20
        | ((immediate >> 5) & 0x7f) << 25
}

fn sb_format(key: &InstructionKey, rs1: u32, rs2: u32, offset: u32) -> u32 {
    // The stored operand counts halfwords; the encoded immediate is the
    // byte distance with bit 0 implicit.
    let immediate = offset << 1;
    key.opcode()
        | ((immediate >> 11) & 0x1) << 7
        | ((immediate >> 1) & 0xf) << 8
        | funct3(key) << 12
        | (rs1 & 0x1f) << 15
        | (rs2 & 0x1f) << 20
        | ((immediate >> 5) & 0x3f) << 25
        | ((immediate >> 12) & 0x1) << 31
}

fn u_format(key: &InstructionKey, rd: u32, immediate: u32) -> u32 {
    key.opcode() | (rd & 0x1f) << 7 | (immediate & 0xfffff) << 12
}

fn uj_format(key: &InstructionKey, rd: u32, offset: u32) -> u32 {
    let immediate = offset << 1;
    key.opcode()
        | (rd & 0x1f) << 7
        | ((immediate >> 12) & 0xff) << 12
        | ((immediate >> 11) & 0x1) << 20
        | ((immediate >> 1) & 0x3ff) << 21
        | ((immediate >> 20) & 0x1) << 31
}

/// Encodes an instruction node, dispatching on its format tag.
pub fn assemble_instruction(node: &InstructionNode) -> MemoryValue {
    let key = &node.info.key;
    let word = match node.info.format {
        InstructionFormat::R => r_format(
            key,
            register_id(&node.children[0]),
            register_id(&node.children[1]),
            register_id(&node.children[2]),
        ),
        InstructionFormat::I => i_format(
            key,
            register_id(&node.children[0]),
            register_id(&node.children[1]),
            immediate_bits(node, 2),
        ),
        InstructionFormat::S => s_format(
            key,
            register_id(&node.children[0]),
            register_id(&node.children[1]),
            immediate_bits(node, 2),
        ),
        InstructionFormat::SB => sb_format(
            key,
            register_id(&node.children[0]),
            register_id(&node.children[1]),
            immediate_bits(node, 2),
        ),
        InstructionFormat::U => u_format(key, register_id(&node.children[0]), immediate_bits(node, 1)),
        InstructionFormat::UJ => {
            uj_format(key, register_id(&node.children[0]), immediate_bits(node, 1))
        }
        // The simulator pseudo instructions encode to their fixed magic
        // word, stored as the key's opcode.
        InstructionFormat::Simulator => key.opcode(),
    };
    let mut bytes = [0u8; 4];
    LittleEndian::write_u32(&mut bytes, word);
    MemoryValue::from_bytes(&bytes, node.info.length)
}
