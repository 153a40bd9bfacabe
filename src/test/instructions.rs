use crate::ast::{MemoryAccess, SyntaxTreeNode};
use crate::conversions::{from_signed, from_unsigned, to_signed, to_unsigned, DataFormat};
use crate::project::ProjectCore;
use crate::riscv::{InstructionNodeFactory, CRASH_MAGIC, SLEEP_MAGIC};
use crate::test::{test_project, test_project_64};
use crate::value::MemoryValue;

fn fmt() -> DataFormat {
    DataFormat::default()
}

fn factory(project: &ProjectCore) -> InstructionNodeFactory {
    InstructionNodeFactory::new(project.architecture())
}

fn reg(name: &str) -> SyntaxTreeNode {
    let id: usize = name[1..].parse().unwrap();
    SyntaxTreeNode::register(name, id)
}

fn imm(value: i64) -> SyntaxTreeNode {
    // Immediate operands compose with registers of either word size; a
    // 32-bit two's-complement value sign-extends on conversion.
    SyntaxTreeNode::immediate(from_signed(value, 32, &fmt()))
}

fn write(project: &mut ProjectCore, name: &str, value: u64) {
    let size = project.architecture().word_size();
    project.put_register_value(name, &from_unsigned(value, size, &fmt()));
}

fn read(project: &mut ProjectCore, name: &str) -> u64 {
    to_unsigned(&project.get_register_value(name), &fmt())
}

fn read_signed(project: &mut ProjectCore, name: &str) -> i64 {
    to_signed(&project.get_register_value(name), &fmt())
}

/// Builds the node, checks static validation and steps it once.
fn step(project: &mut ProjectCore, mnemonic: &str, operands: Vec<SyntaxTreeNode>) -> u64 {
    let node = factory(project).create(mnemonic, operands).unwrap();
    let validation = node.validate(project);
    assert!(validation.is_success(), "{:?}", validation.message());
    let runtime = node.validate_runtime(project);
    assert!(runtime.is_success(), "{:?}", runtime.message());
    let new_pc = node.get_value(project);
    project.put_register_value("pc", &new_pc);
    to_unsigned(&new_pc, &fmt())
}

#[test]
fn addi_writes_the_sum_and_advances_pc() {
    let mut project = test_project();
    let operands = vec![reg("x1"), reg("x0"), imm(42)];
    let pc = step(&mut project, "addi", operands);
    assert_eq!(pc, 4);
    assert_eq!(read(&mut project, "x1"), 42);
}

#[test]
fn register_register_arithmetic() {
    let mut project = test_project();
    write(&mut project, "x2", 100);
    write(&mut project, "x3", 58);
    step(&mut project, "add", vec![reg("x1"), reg("x2"), reg("x3")]);
    assert_eq!(read(&mut project, "x1"), 158);

    step(&mut project, "sub", vec![reg("x4"), reg("x3"), reg("x2")]);
    assert_eq!(read_signed(&mut project, "x4"), -42);

    step(&mut project, "sltu", vec![reg("x5"), reg("x3"), reg("x2")]);
    assert_eq!(read(&mut project, "x5"), 1);
}

#[test]
fn arithmetic_wraps_at_the_word_size() {
    let mut project = test_project();
    write(&mut project, "x2", 0xffff_ffff);
    step(&mut project, "addi", vec![reg("x1"), reg("x2"), imm(1)]);
    assert_eq!(read(&mut project, "x1"), 0);
}

#[test]
fn shifts_use_the_lower_five_bits() {
    let mut project = test_project();
    write(&mut project, "x2", 1);
    write(&mut project, "x3", 33);
    step(&mut project, "sll", vec![reg("x1"), reg("x2"), reg("x3")]);
    assert_eq!(read(&mut project, "x1"), 2);

    write(&mut project, "x4", 0x8000_0000);
    step(&mut project, "srai", vec![reg("x5"), reg("x4"), imm(4)]);
    assert_eq!(read(&mut project, "x5"), 0xf800_0000);
}

#[test]
fn the_zero_register_swallows_writes() {
    let mut project = test_project();
    step(&mut project, "addi", vec![reg("x0"), reg("x0"), imm(5)]);
    assert_eq!(read(&mut project, "x0"), 0);
}

#[test]
fn multiplication_and_division() {
    let mut project = test_project();
    write(&mut project, "x2", 479_001_600 / 12);
    write(&mut project, "x3", 12);
    step(&mut project, "mul", vec![reg("x1"), reg("x2"), reg("x3")]);
    assert_eq!(read(&mut project, "x1"), 479_001_600);

    step(&mut project, "div", vec![reg("x4"), reg("x1"), reg("x3")]);
    assert_eq!(read(&mut project, "x4"), 479_001_600 / 12);

    write(&mut project, "x5", 0);
    step(&mut project, "div", vec![reg("x6"), reg("x1"), reg("x5")]);
    assert_eq!(read(&mut project, "x6"), 0xffff_ffff);
    step(&mut project, "rem", vec![reg("x7"), reg("x1"), reg("x5")]);
    assert_eq!(read(&mut project, "x7"), 479_001_600);
}

#[test]
fn mulh_returns_the_high_word() {
    let mut project = test_project();
    write(&mut project, "x2", 0x8000_0000);
    write(&mut project, "x3", 2);
    step(&mut project, "mulhu", vec![reg("x1"), reg("x2"), reg("x3")]);
    assert_eq!(read(&mut project, "x1"), 1);
}

#[test]
fn branch_zero_jumps_by_twice_the_offset() {
    let mut project = test_project();
    // x1 is zero: the branch is taken and lands at 2 * 22.
    let pc = step(&mut project, "beqz", vec![reg("x1"), imm(22)]);
    assert_eq!(pc, 44);

    let mut project = test_project();
    write(&mut project, "x1", 1);
    let pc = step(&mut project, "beqz", vec![reg("x1"), imm(22)]);
    assert_eq!(pc, 4);
}

#[test]
fn conditional_branches_compare_signed() {
    let mut project = test_project();
    write(&mut project, "x1", (-1i64 as u64) & 0xffff_ffff);
    write(&mut project, "x2", 1);
    let pc = step(&mut project, "blt", vec![reg("x1"), reg("x2"), imm(8)]);
    assert_eq!(pc, 16);

    // Unsigned comparison sees 0xffffffff as large.
    write(&mut project, "pc", 0);
    let pc = step(&mut project, "bltu", vec![reg("x1"), reg("x2"), imm(8)]);
    assert_eq!(pc, 4);
}

#[test]
fn jal_links_and_jumps() {
    let mut project = test_project();
    write(&mut project, "pc", 8);
    let pc = step(&mut project, "jal", vec![imm(18)]);
    assert_eq!(pc, 44);
    assert_eq!(read(&mut project, "x1"), 12);
}

#[test]
fn jalr_jumps_to_base_plus_offset() {
    let mut project = test_project();
    write(&mut project, "x2", 100);
    write(&mut project, "pc", 20);
    let pc = step(
        &mut project,
        "jalr",
        vec![reg("x5"), reg("x2"), imm(-4)],
    );
    assert_eq!(pc, 96);
    assert_eq!(read(&mut project, "x5"), 24);
}

#[test]
fn store_then_load_round_trips_through_memory() {
    let mut project = test_project();
    write(&mut project, "x1", 0x489);
    step(&mut project, "sw", vec![reg("x1"), reg("x0"), imm(0)]);

    // Little-endian byte image.
    let bytes = project.get_memory_value_at(0, 4);
    assert_eq!(bytes.byte_at(0), 0x89);
    assert_eq!(bytes.byte_at(8), 0x04);
    assert_eq!(bytes.byte_at(16), 0x00);

    step(&mut project, "lw", vec![reg("x2"), reg("x0"), imm(0)]);
    assert_eq!(read(&mut project, "x2"), 0x489);
}

#[test]
fn signed_loads_sign_extend() {
    let mut project = test_project();
    write(&mut project, "x1", 0x80);
    step(&mut project, "sb", vec![reg("x1"), reg("x0"), imm(3)]);
    step(&mut project, "lb", vec![reg("x2"), reg("x0"), imm(3)]);
    assert_eq!(read_signed(&mut project, "x2"), -128);
    step(&mut project, "lbu", vec![reg("x3"), reg("x0"), imm(3)]);
    assert_eq!(read(&mut project, "x3"), 0x80);
}

#[test]
fn loads_outside_the_memory_fail_runtime_validation() {
    let mut project = test_project();
    let node = factory(&project)
        .create("lw", vec![reg("x1"), reg("x0"), imm(4000)])
        .unwrap();
    assert!(node.validate(&mut project).is_success());
    assert!(!node.validate_runtime(&mut project).is_success());
}

#[test]
fn too_wide_immediates_fail_static_validation() {
    let mut project = test_project();
    let node = factory(&project)
        .create("addi", vec![reg("x1"), reg("x0"), imm(5000)])
        .unwrap();
    assert!(!node.validate(&mut project).is_success());
}

#[test]
fn wrong_operand_kinds_fail_static_validation() {
    let mut project = test_project();
    let node = factory(&project)
        .create("add", vec![reg("x1"), reg("x2"), imm(1)])
        .unwrap();
    assert!(!node.validate(&mut project).is_success());
}

#[test]
fn simucrash_always_fails_runtime_validation() {
    let mut project = test_project();
    let node = factory(&project)
        .create("simucrash", vec![SyntaxTreeNode::data("boom")])
        .unwrap();
    assert!(node.validate(&mut project).is_success());
    let result = node.validate_runtime(&mut project);
    let message = result.message().expect("crash must fail");
    assert!(message.to_string().contains("boom"));
}

#[test]
fn simusleep_rejects_negative_durations() {
    let mut project = test_project();
    let node = factory(&project)
        .create("simusleep", vec![imm(-5)])
        .unwrap();
    assert!(!node.validate_runtime(&mut project).is_success());

    let node = factory(&project)
        .create("simusleep", vec![imm(0)])
        .unwrap();
    assert!(node.validate_runtime(&mut project).is_success());
    let pc = to_unsigned(&node.get_value(&mut project), &fmt());
    assert_eq!(pc, 4);
}

#[test]
fn word_operations_sign_extend_on_rv64() {
    let mut project = test_project_64();
    write(&mut project, "x2", 0x7fff_ffff);
    step(&mut project, "addiw", vec![reg("x1"), reg("x2"), imm(1)]);
    assert_eq!(read(&mut project, "x1"), 0xffff_ffff_8000_0000);

    write(&mut project, "x3", 0xffff_ffff_ffff_ffff);
    step(&mut project, "sd", vec![reg("x3"), reg("x0"), imm(8)]);
    step(&mut project, "ld", vec![reg("x4"), reg("x0"), imm(8)]);
    assert_eq!(read(&mut project, "x4"), 0xffff_ffff_ffff_ffff);
}

// --- encodings -------------------------------------------------------------

fn assemble_word(project: &ProjectCore, mnemonic: &str, operands: Vec<SyntaxTreeNode>) -> u32 {
    let node = factory(project).create(mnemonic, operands).unwrap();
    let encoded = node.assemble();
    assert_eq!(
        encoded.size(),
        project.architecture().properties().instruction_length
    );
    to_unsigned(&encoded, &fmt()) as u32
}

#[test]
fn encodes_the_reference_words() {
    let project = test_project();
    assert_eq!(
        assemble_word(&project, "addi", vec![reg("x1"), reg("x0"), imm(1)]),
        0x0010_0093
    );
    assert_eq!(
        assemble_word(&project, "add", vec![reg("x3"), reg("x1"), reg("x2")]),
        0x0020_81b3
    );
    assert_eq!(
        assemble_word(&project, "sw", vec![reg("x1"), reg("x2"), imm(4)]),
        0x0011_2223
    );
    assert_eq!(
        assemble_word(&project, "beq", vec![reg("x1"), reg("x2"), imm(4)]),
        0x0020_8463
    );
    assert_eq!(
        assemble_word(&project, "jal", vec![reg("x1"), imm(8)]),
        0x0100_00ef
    );
    assert_eq!(
        assemble_word(&project, "lui", vec![reg("x5"), imm(0x12345)]),
        0x1234_52b7
    );
    assert_eq!(
        assemble_word(&project, "srai", vec![reg("x5"), reg("x6"), imm(4)]),
        0x4043_5293
    );
}

#[test]
fn instruction_key_fields_survive_encoding() {
    let project = test_project();
    let word = assemble_word(&project, "mul", vec![reg("x1"), reg("x2"), reg("x3")]);
    assert_eq!(word & 0x7f, 0x33);
    assert_eq!((word >> 12) & 0x7, 0);
    assert_eq!((word >> 25) & 0x7f, 1);
}

#[test]
fn simulator_instructions_encode_to_their_magic_words() {
    let project = test_project();
    assert_eq!(
        assemble_word(&project, "simusleep", vec![imm(1)]),
        SLEEP_MAGIC
    );
    assert_eq!(
        assemble_word(&project, "simucrash", vec![SyntaxTreeNode::data("x")]),
        CRASH_MAGIC
    );
}
