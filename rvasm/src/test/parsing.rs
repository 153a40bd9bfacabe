use rvcore::ast::MemoryAccess;
use rvcore::conversions::{to_unsigned, DataFormat};
use rvcore::project::ProjectCore;

use crate::final_rep::FinalRepresentation;
use crate::parser::RiscvParser;
use crate::test::test_project;

fn fmt() -> DataFormat {
    DataFormat::default()
}

fn parse(source: &str) -> (FinalRepresentation, ProjectCore) {
    let mut project = test_project();
    let parser = RiscvParser::new(project.architecture().clone());
    let representation = parser.parse(source, &mut project);
    (representation, project)
}

fn parse_clean(source: &str) -> (FinalRepresentation, ProjectCore) {
    let (representation, project) = parse(source);
    assert!(
        !representation.error_list.has_errors(),
        "unexpected errors: {:?}",
        representation.error_list.errors()
    );
    (representation, project)
}

/// Steps every command in address order, following the program counter.
fn run(representation: &FinalRepresentation, project: &mut ProjectCore) {
    let mut steps = 0;
    loop {
        let pc = to_unsigned(&project.get_register_value("pc"), &fmt()) as usize;
        let index = match representation.command_at_address(pc) {
            Some(index) => index,
            None => break,
        };
        let node = representation.commands[index].node.clone();
        assert!(node.validate_runtime(project).is_success());
        let new_pc = node.get_value(project);
        project.put_register_value("pc", &new_pc);
        steps += 1;
        assert!(steps < 10_000, "runaway program");
    }
}

#[test]
fn instructions_get_consecutive_text_addresses() {
    let (representation, _) = parse_clean(
        "addi x1, x0, 1\n\
         addi x2, x0, 2\n\
         add x3, x1, x2\n",
    );
    let addresses: Vec<usize> = representation
        .commands
        .iter()
        .map(|command| command.address)
        .collect();
    assert_eq!(addresses, vec![0, 4, 8]);
}

#[test]
fn line_intervals_map_back_to_the_source() {
    let (representation, _) = parse_clean("nop\n\nnop\n");
    assert_eq!(representation.commands.len(), 2);
    assert_eq!(representation.commands[1].interval.start_line(), 2);
    assert_eq!(representation.command_on_line(2), Some(1));
    assert_eq!(representation.command_at_address(4), Some(1));
}

#[test]
fn branch_labels_become_pc_relative_immediates() {
    let (representation, _) = parse_clean(
        "addi x1, x0, 0\n\
         loop: addi x1, x1, 1\n\
         beq x1, x2, loop\n",
    );
    // The branch sits at address 8, the label at 4: offset (4-8)/2 = -2,
    // which encodes as a -4 byte displacement.
    let encoded = representation.commands[2].node.assemble();
    assert_eq!(to_unsigned(&encoded, &fmt()) as u32, 0xfe20_8ee3);
}

#[test]
fn jump_labels_are_relative_too() {
    let (representation, mut project) = parse_clean(
        "j end\n\
         addi x1, x0, 99\n\
         end: nop\n",
    );
    run(&representation, &mut project);
    // The addi is skipped.
    assert_eq!(to_unsigned(&project.get_register_value("x1"), &fmt()), 0);
}

#[test]
fn equ_constants_substitute_into_operands() {
    let (representation, mut project) = parse_clean(
        ".equ limit, 13\n\
         addi x1, x0, limit\n\
         addi x2, x0, limit * 2\n",
    );
    run(&representation, &mut project);
    assert_eq!(to_unsigned(&project.get_register_value("x1"), &fmt()), 13);
    assert_eq!(to_unsigned(&project.get_register_value("x2"), &fmt()), 26);
}

#[test]
fn data_directives_write_into_memory_after_the_text() {
    let (representation, mut project) = parse_clean(
        ".section data\n\
         value: .word 0x12345678\n\
         .section text\n\
         lw x1, value(x0)\n\
         nop\n",
    );
    // Two instructions occupy [0, 8); the data section lands behind the
    // text section.
    let data = project.get_memory_value_at(8, 4);
    assert_eq!(to_unsigned(&data, &fmt()), 0x1234_5678);

    run(&representation, &mut project);
    assert_eq!(
        to_unsigned(&project.get_register_value("x1"), &fmt()),
        0x1234_5678
    );
}

#[test]
fn string_data_is_nul_terminated() {
    let (_, mut project) = parse_clean(".byte \"AB\"\n");
    let data = project.get_memory_value_at(0, 3);
    assert_eq!(data.byte_at(0), 0x41);
    assert_eq!(data.byte_at(8), 0x42);
    assert_eq!(data.byte_at(16), 0x00);
}

#[test]
fn reservations_only_take_space() {
    let (_, mut project) = parse_clean(
        ".resw 2\n\
         tail: .byte 0xff\n",
    );
    // Eight reserved zero bytes, then the byte.
    assert!(project.get_memory_value_at(0, 8).is_zero());
    assert_eq!(project.get_memory_value_at(8, 1).byte_at(0), 0xff);
}

#[test]
fn macros_expand_per_invocation() {
    let (representation, mut project) = parse_clean(
        ".macro inc2, \\r\n\
         addi \\r, \\r, 1\n\
         addi \\r, \\r, 1\n\
         .endm\n\
         inc2 x5\n\
         inc2 x6\n",
    );
    assert_eq!(representation.commands.len(), 4);
    assert_eq!(representation.macros.len(), 1);
    assert_eq!(representation.macros[0].name, "inc2");
    assert_eq!(representation.macros[0].parameter_count, 1);

    run(&representation, &mut project);
    assert_eq!(to_unsigned(&project.get_register_value("x5"), &fmt()), 2);
    assert_eq!(to_unsigned(&project.get_register_value("x6"), &fmt()), 2);
}

#[test]
fn cyclic_macros_are_reported() {
    let (representation, _) = parse(
        ".macro first, \\r\n\
         second \\r\n\
         .endm\n\
         .macro second, \\r\n\
         first \\r\n\
         .endm\n\
         first x1\n",
    );
    assert!(representation.error_list.has_errors());
    let rendered: Vec<String> = representation
        .error_list
        .errors()
        .iter()
        .map(|error| error.message.to_string())
        .collect();
    assert!(rendered.iter().any(|text| text.contains("Cyclic macro call")));
}

#[test]
fn unknown_names_are_reported_but_do_not_stop_the_parse() {
    let (representation, _) = parse(
        "addi x1, x0, 1\n\
         frobnicate x1\n\
         .unknowndir 3\n\
         addi x2, x0, 2\n",
    );
    assert!(representation.error_list.has_errors());
    // Both well-formed instructions still made it through.
    assert_eq!(representation.commands.len(), 2);
}

#[test]
fn too_wide_immediates_are_compile_errors() {
    let (representation, _) = parse("addi x1, x0, 5000\n");
    assert!(representation.error_list.has_errors());
    assert!(representation.commands.is_empty());
}

#[test]
fn programs_larger_than_memory_are_rejected() {
    let (representation, _) = parse(".resb 5000\n");
    assert!(representation.error_list.has_errors());
}

#[test]
fn simucrash_takes_a_string_operand() {
    let (representation, mut project) = parse_clean("simucrash \"it broke\"\n");
    let node = &representation.commands[0].node;
    let result = node.validate_runtime(&mut project);
    assert!(result.message().unwrap().to_string().contains("it broke"));
}

#[test]
fn offset_base_and_three_operand_loads_agree() {
    let (representation, _) = parse_clean(
        "lw x1, 8(x2)\n\
         lw x3, x2, 8\n",
    );
    let first = representation.commands[0].node.assemble();
    let second = representation.commands[1].node.assemble();
    // Same base and offset fields, different destination.
    let first = to_unsigned(&first, &fmt()) as u32;
    let second = to_unsigned(&second, &fmt()) as u32;
    assert_eq!(first >> 12, second >> 12);
    assert_eq!(first & 0x7f, second & 0x7f);
}
