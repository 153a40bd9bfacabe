//! The composable RISC-V ISA modules.
//!
//! `brew` walks the module list of an architecture formula and unions the
//! declarations; `rv32i` is the base every formula must start with, the
//! other modules extend it. The simulator pseudo instructions are always
//! added last.

use crate::arch::{
    Architecture, ArchitectureError, InstructionFormat, InstructionInformation, InstructionKey,
    InstructionSet, RegisterInformation, RegisterType, UnitInformation,
};
use crate::conversions::{AlignmentBehavior, Endianness, SignRepresentation};
use crate::riscv::{CRASH_MAGIC, SLEEP_MAGIC};

const OP: u32 = 0x33;
const OP_IMM: u32 = 0x13;
const OP_32: u32 = 0x3b;
const OP_IMM_32: u32 = 0x1b;
const LOAD: u32 = 0x03;
const STORE: u32 = 0x23;
const BRANCH: u32 = 0x63;
const LUI: u32 = 0x37;
const AUIPC: u32 = 0x17;
const JAL: u32 = 0x6f;
const JALR: u32 = 0x67;

const INSTRUCTION_LENGTH: usize = 32;

struct Brewing {
    word_size: usize,
    unit: UnitInformation,
    instructions: InstructionSet,
}

/// Brews a RISC-V architecture from its module list.
pub fn brew(modules: &[String]) -> Result<Architecture, ArchitectureError> {
    if modules[0] != "rv32i" {
        return Err(ArchitectureError::MissingBaseModule(modules[0].clone()));
    }
    let mut brewing = Brewing {
        word_size: 32,
        unit: UnitInformation::new("cpu"),
        instructions: InstructionSet::new(),
    };
    let mut seen_rv64i = false;
    for module in modules {
        match module.as_str() {
            "rv32i" => apply_rv32i(&mut brewing)?,
            "rv32m" => apply_m(&mut brewing, false)?,
            "rv64i" => {
                apply_rv64i(&mut brewing)?;
                seen_rv64i = true;
            }
            "rv64m" => {
                if !seen_rv64i {
                    return Err(ArchitectureError::ConflictingDefinition(
                        "'rv64m' needs 'rv64i' before it".to_owned(),
                    ));
                }
                apply_m(&mut brewing, true)?;
            }
            other => return Err(ArchitectureError::UnknownModule(other.to_owned())),
        }
    }
    apply_simulator_instructions(&mut brewing)?;

    let name = format!("riscv ({})", modules.join("+"));
    Ok(Architecture::assemble(
        name,
        brewing.word_size,
        8,
        Endianness::Little,
        SignRepresentation::TwosComplement,
        AlignmentBehavior::Relaxed,
        vec![brewing.unit],
        brewing.instructions,
        "pc".to_owned(),
        "x1".to_owned(),
        INSTRUCTION_LENGTH,
    ))
}

fn insert(
    instructions: &mut InstructionSet,
    mnemonic: &str,
    format: InstructionFormat,
    key: &[(&str, u32)],
) -> Result<(), ArchitectureError> {
    instructions.insert(InstructionInformation::new(
        mnemonic,
        format,
        INSTRUCTION_LENGTH,
        InstructionKey::new(key),
    ))
}

fn apply_rv32i(brewing: &mut Brewing) -> Result<(), ArchitectureError> {
    let unit = &mut brewing.unit;
    // A repeated base module only re-unions its instructions.
    if unit.register_by_name("x0").is_none() {
        add_base_registers(unit);
    }

    let set = &mut brewing.instructions;
    // Register-register arithmetic.
    insert(set, "add", InstructionFormat::R, &[("opcode", OP), ("funct3", 0), ("funct7", 0)])?;
    insert(set, "sub", InstructionFormat::R, &[("opcode", OP), ("funct3", 0), ("funct7", 0x20)])?;
    insert(set, "sll", InstructionFormat::R, &[("opcode", OP), ("funct3", 1), ("funct7", 0)])?;
    insert(set, "slt", InstructionFormat::R, &[("opcode", OP), ("funct3", 2), ("funct7", 0)])?;
    insert(set, "sltu", InstructionFormat::R, &[("opcode", OP), ("funct3", 3), ("funct7", 0)])?;
    insert(set, "xor", InstructionFormat::R, &[("opcode", OP), ("funct3", 4), ("funct7", 0)])?;
    insert(set, "srl", InstructionFormat::R, &[("opcode", OP), ("funct3", 5), ("funct7", 0)])?;
    insert(set, "sra", InstructionFormat::R, &[("opcode", OP), ("funct3", 5), ("funct7", 0x20)])?;
    insert(set, "or", InstructionFormat::R, &[("opcode", OP), ("funct3", 6), ("funct7", 0)])?;
    insert(set, "and", InstructionFormat::R, &[("opcode", OP), ("funct3", 7), ("funct7", 0)])?;
    // Immediate arithmetic.
    insert(set, "addi", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 0)])?;
    insert(set, "slti", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 2)])?;
    insert(set, "sltiu", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 3)])?;
    insert(set, "xori", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 4)])?;
    insert(set, "ori", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 6)])?;
    insert(set, "andi", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 7)])?;
    insert(set, "slli", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 1), ("funct7", 0)])?;
    insert(set, "srli", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 5), ("funct7", 0)])?;
    insert(set, "srai", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 5), ("funct7", 0x20)])?;
    // Upper immediates.
    insert(set, "lui", InstructionFormat::U, &[("opcode", LUI)])?;
    insert(set, "auipc", InstructionFormat::U, &[("opcode", AUIPC)])?;
    // Loads and stores.
    insert(set, "lb", InstructionFormat::I, &[("opcode", LOAD), ("funct3", 0)])?;
    insert(set, "lh", InstructionFormat::I, &[("opcode", LOAD), ("funct3", 1)])?;
    insert(set, "lw", InstructionFormat::I, &[("opcode", LOAD), ("funct3", 2)])?;
    insert(set, "lbu", InstructionFormat::I, &[("opcode", LOAD), ("funct3", 4)])?;
    insert(set, "lhu", InstructionFormat::I, &[("opcode", LOAD), ("funct3", 5)])?;
    insert(set, "sb", InstructionFormat::S, &[("opcode", STORE), ("funct3", 0)])?;
    insert(set, "sh", InstructionFormat::S, &[("opcode", STORE), ("funct3", 1)])?;
    insert(set, "sw", InstructionFormat::S, &[("opcode", STORE), ("funct3", 2)])?;
    // Branches and jumps.
    insert(set, "beq", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 0)])?;
    insert(set, "bne", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 1)])?;
    insert(set, "blt", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 4)])?;
    insert(set, "bge", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 5)])?;
    insert(set, "bltu", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 6)])?;
    insert(set, "bgeu", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 7)])?;
    insert(set, "jal", InstructionFormat::UJ, &[("opcode", JAL)])?;
    insert(set, "jalr", InstructionFormat::I, &[("opcode", JALR), ("funct3", 0)])?;
    // Assembler aliases; they encode as their target instruction.
    insert(set, "nop", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 0)])?;
    insert(set, "mv", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 0)])?;
    insert(set, "li", InstructionFormat::I, &[("opcode", OP_IMM), ("funct3", 0)])?;
    insert(set, "j", InstructionFormat::UJ, &[("opcode", JAL)])?;
    insert(set, "beqz", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 0)])?;
    insert(set, "bnez", InstructionFormat::SB, &[("opcode", BRANCH), ("funct3", 1)])?;
    Ok(())
}

fn add_base_registers(unit: &mut UnitInformation) {
    for id in 0..32 {
        let name = format!("x{}", id);
        let register_type = if id == 1 {
            RegisterType::Link
        } else {
            RegisterType::Integer
        };
        let mut register = RegisterInformation::new(id, &name, 32, register_type);
        if id == 0 {
            register = register.constant();
        }
        unit.add_register(register);
    }
    unit.add_register(RegisterInformation::new(
        32,
        "pc",
        32,
        RegisterType::ProgramCounter,
    ));
}

fn apply_m(brewing: &mut Brewing, word: bool) -> Result<(), ArchitectureError> {
    let set = &mut brewing.instructions;
    if word {
        insert(set, "mulw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 0), ("funct7", 1)])?;
        insert(set, "divw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 4), ("funct7", 1)])?;
        insert(set, "divuw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 5), ("funct7", 1)])?;
        insert(set, "remw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 6), ("funct7", 1)])?;
        insert(set, "remuw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 7), ("funct7", 1)])?;
    } else {
        insert(set, "mul", InstructionFormat::R, &[("opcode", OP), ("funct3", 0), ("funct7", 1)])?;
        insert(set, "mulh", InstructionFormat::R, &[("opcode", OP), ("funct3", 1), ("funct7", 1)])?;
        insert(set, "mulhsu", InstructionFormat::R, &[("opcode", OP), ("funct3", 2), ("funct7", 1)])?;
        insert(set, "mulhu", InstructionFormat::R, &[("opcode", OP), ("funct3", 3), ("funct7", 1)])?;
        insert(set, "div", InstructionFormat::R, &[("opcode", OP), ("funct3", 4), ("funct7", 1)])?;
        insert(set, "divu", InstructionFormat::R, &[("opcode", OP), ("funct3", 5), ("funct7", 1)])?;
        insert(set, "rem", InstructionFormat::R, &[("opcode", OP), ("funct3", 6), ("funct7", 1)])?;
        insert(set, "remu", InstructionFormat::R, &[("opcode", OP), ("funct3", 7), ("funct7", 1)])?;
    }
    Ok(())
}

fn apply_rv64i(brewing: &mut Brewing) -> Result<(), ArchitectureError> {
    brewing.word_size = 64;
    brewing.unit.resize_registers(64);

    let set = &mut brewing.instructions;
    insert(set, "ld", InstructionFormat::I, &[("opcode", LOAD), ("funct3", 3)])?;
    insert(set, "lwu", InstructionFormat::I, &[("opcode", LOAD), ("funct3", 6)])?;
    insert(set, "sd", InstructionFormat::S, &[("opcode", STORE), ("funct3", 3)])?;
    // Word-only operations: 32-bit arithmetic with sign extension.
    insert(set, "addiw", InstructionFormat::I, &[("opcode", OP_IMM_32), ("funct3", 0)])?;
    insert(set, "slliw", InstructionFormat::I, &[("opcode", OP_IMM_32), ("funct3", 1), ("funct7", 0)])?;
    insert(set, "srliw", InstructionFormat::I, &[("opcode", OP_IMM_32), ("funct3", 5), ("funct7", 0)])?;
    insert(set, "sraiw", InstructionFormat::I, &[("opcode", OP_IMM_32), ("funct3", 5), ("funct7", 0x20)])?;
    insert(set, "addw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 0), ("funct7", 0)])?;
    insert(set, "subw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 0), ("funct7", 0x20)])?;
    insert(set, "sllw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 1), ("funct7", 0)])?;
    insert(set, "srlw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 5), ("funct7", 0)])?;
    insert(set, "sraw", InstructionFormat::R, &[("opcode", OP_32), ("funct3", 5), ("funct7", 0x20)])?;
    Ok(())
}

fn apply_simulator_instructions(brewing: &mut Brewing) -> Result<(), ArchitectureError> {
    let set = &mut brewing.instructions;
    insert(set, "simusleep", InstructionFormat::Simulator, &[("opcode", SLEEP_MAGIC)])?;
    insert(set, "simucrash", InstructionFormat::Simulator, &[("opcode", CRASH_MAGIC)])?;
    Ok(())
}
