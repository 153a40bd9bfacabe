//! The parsing-and-execution servant: it owns the parser, the current
//! final representation and the breakpoint set, and walks the command
//! list one syntax-tree node per step.

use std::collections::HashSet;

use log::{debug, trace};
use rvasm::final_rep::FinalRepresentation;
use rvasm::lexer::TokenKind;
use rvasm::parser::RiscvParser;
use rvasm::MacroInformation;
use rvcore::arch::Architecture;
use rvcore::ast::{MemoryAccess, Translateable};
use rvcore::conversions::{self, DataFormat};
use rvcore::scheduler::{StopCondition, SyncCondition};

use crate::MemoryAccessProxy;

pub type FinalRepresentationCallback = Box<dyn Fn(&FinalRepresentation) + Send>;
pub type ErrorCallback = Box<dyn Fn(&Translateable) + Send>;
pub type LineCallback = Box<dyn Fn(usize) + Send>;
pub type MacroListCallback = Box<dyn Fn(&[MacroInformation]) + Send>;
pub type StoppedCallback = Box<dyn Fn() + Send>;
pub type SyncCallback = Box<dyn Fn() + Send>;

enum StepOutcome {
    Advanced,
    EndOfProgram,
    RuntimeHalt,
}

pub struct ParsingAndExecutionUnit {
    parser: RiscvParser,
    memory_access: MemoryAccessProxy,
    stop: StopCondition,
    sync: SyncCondition,
    final_representation: FinalRepresentation,
    breakpoints: HashSet<usize>,
    program_counter: String,
    word_size: usize,
    instruction_cells: usize,
    format: DataFormat,
    on_final_representation: Option<FinalRepresentationCallback>,
    on_error: Option<ErrorCallback>,
    on_current_line: Option<LineCallback>,
    on_macro_list: Option<MacroListCallback>,
    on_execution_stopped: Option<StoppedCallback>,
    on_sync: Option<SyncCallback>,
}

impl ParsingAndExecutionUnit {
    pub fn new(
        architecture: Architecture,
        memory_access: MemoryAccessProxy,
        stop: StopCondition,
        sync: SyncCondition,
    ) -> ParsingAndExecutionUnit {
        let properties = architecture.properties();
        let program_counter = properties.program_counter.clone();
        let word_size = properties.word_size;
        let instruction_cells = properties.instruction_length / properties.byte_size;
        let format = properties.format;
        ParsingAndExecutionUnit {
            parser: RiscvParser::new(architecture),
            memory_access,
            stop,
            sync,
            final_representation: FinalRepresentation::default(),
            breakpoints: HashSet::new(),
            program_counter,
            word_size,
            format,
            instruction_cells,
            on_final_representation: None,
            on_error: None,
            on_current_line: None,
            on_macro_list: None,
            on_execution_stopped: None,
            on_sync: None,
        }
    }

    pub fn set_final_representation_callback(&mut self, callback: FinalRepresentationCallback) {
        self.on_final_representation = Some(callback);
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    pub fn set_current_line_callback(&mut self, callback: LineCallback) {
        self.on_current_line = Some(callback);
    }

    pub fn set_macro_list_callback(&mut self, callback: MacroListCallback) {
        self.on_macro_list = Some(callback);
    }

    pub fn set_execution_stopped_callback(&mut self, callback: StoppedCallback) {
        self.on_execution_stopped = Some(callback);
    }

    /// Enables observer back-pressure: after every instruction the given
    /// callback fires and execution parks until `gui_ready` acknowledges.
    pub fn set_sync_callback(&mut self, callback: SyncCallback) {
        self.on_sync = Some(callback);
    }

    pub fn syntax_regex(&self, kind: TokenKind) -> String {
        self.parser.syntax_regex(kind)
    }

    pub fn final_representation(&self) -> &FinalRepresentation {
        &self.final_representation
    }

    /// Runs the full assembly pipeline and publishes the outcome. The
    /// program counter is reset onto the first command.
    pub fn parse(&mut self, source: &str) {
        debug!("parse requested");
        self.final_representation = self.parser.parse(source, &mut self.memory_access);
        if let Some(callback) = &self.on_macro_list {
            callback(&self.final_representation.macros);
        }
        if let Some(callback) = &self.on_final_representation {
            callback(&self.final_representation);
        }
        if let Some(first) = self.final_representation.commands.first() {
            let address = first.address;
            let line = first.interval.start_line();
            self.write_program_counter(address);
            self.notify_line(line);
        }
    }

    fn read_program_counter(&mut self) -> usize {
        let value = self.memory_access.get_register_value(&self.program_counter);
        conversions::to_unsigned(&value, &self.format) as usize
    }

    fn write_program_counter(&mut self, address: usize) {
        let value = conversions::from_unsigned(address as u64, self.word_size, &self.format);
        self.memory_access
            .put_register_value(&self.program_counter, &value);
    }

    fn notify_line(&self, line: usize) {
        if let Some(callback) = &self.on_current_line {
            callback(line);
        }
    }

    fn notify_stopped(&self) {
        if let Some(callback) = &self.on_execution_stopped {
            callback();
        }
    }

    fn report(&self, message: &Translateable) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }

    /// One interpreter step: look the program counter up in the command
    /// list, validate, execute, write the new program counter back.
    fn step(&mut self) -> StepOutcome {
        let pc = self.read_program_counter();
        let index = match self.final_representation.command_at_address(pc) {
            Some(index) => index,
            None => {
                // Past the last command is a clean end; anywhere else the
                // program jumped into nowhere.
                let end = self
                    .final_representation
                    .commands
                    .last()
                    .map(|command| command.address + self.instruction_cells);
                if end != Some(pc) && !self.final_representation.commands.is_empty() {
                    self.report(&Translateable::with_args(
                        "Unknown execution address %1.",
                        vec![pc.to_string()],
                    ));
                }
                return StepOutcome::EndOfProgram;
            }
        };
        let command = self.final_representation.commands[index].clone();
        trace!("step at pc {} (line {})", pc, command.interval.start_line());

        let validation = command.node.validate_runtime(&mut self.memory_access);
        if let Some(message) = validation.message() {
            self.report(message);
            return StepOutcome::RuntimeHalt;
        }
        let new_pc = command.node.get_value(&mut self.memory_access);
        self.memory_access
            .put_register_value(&self.program_counter, &new_pc);
        self.notify_line(command.interval.start_line());
        self.synchronize();
        StepOutcome::Advanced
    }

    /// Parks until the observer acknowledges, when back-pressure is on.
    fn synchronize(&mut self) {
        if let Some(callback) = &self.on_sync {
            callback();
            self.sync.wait(&self.stop);
        }
    }

    /// The line of the command the program counter points at, if any.
    fn current_line(&mut self) -> Option<usize> {
        let pc = self.read_program_counter();
        self.final_representation
            .command_at_address(pc)
            .map(|index| self.final_representation.commands[index].interval.start_line())
    }

    /// Runs until the stop condition is raised or the program ends.
    pub fn execute(&mut self) {
        self.stop.reset();
        if self.final_representation.error_list.has_errors() {
            self.notify_stopped();
            return;
        }
        while !self.stop.is_raised() {
            match self.step() {
                StepOutcome::Advanced => {}
                _ => break,
            }
        }
        self.notify_stopped();
    }

    /// Executes a single command; returns whether the program advanced.
    pub fn execute_next_line(&mut self) -> bool {
        self.stop.reset();
        if self.final_representation.error_list.has_errors() {
            self.notify_stopped();
            return false;
        }
        let advanced = matches!(self.step(), StepOutcome::Advanced);
        self.notify_stopped();
        advanced
    }

    /// Runs until the next breakpoint line, the stop condition or the end
    /// of the program. The first step is unconditional so execution can
    /// leave the breakpoint it is parked on.
    pub fn execute_to_breakpoint(&mut self) {
        self.stop.reset();
        if self.final_representation.error_list.has_errors() {
            self.notify_stopped();
            return;
        }
        let mut first = true;
        while !self.stop.is_raised() {
            if !first {
                if let Some(line) = self.current_line() {
                    if self.breakpoints.contains(&line) {
                        break;
                    }
                }
            }
            first = false;
            match self.step() {
                StepOutcome::Advanced => {}
                _ => break,
            }
        }
        self.notify_stopped();
    }

    /// Moves the program counter onto the command at `line`.
    pub fn set_execution_point(&mut self, line: usize) {
        if let Some(index) = self.final_representation.command_on_line(line) {
            let address = self.final_representation.commands[index].address;
            self.write_program_counter(address);
            self.notify_line(line);
        }
    }

    /// Accepts the breakpoint iff some command lies on `line`.
    pub fn set_breakpoint(&mut self, line: usize) -> bool {
        if self.final_representation.command_on_line(line).is_some() {
            self.breakpoints.insert(line);
            true
        } else {
            false
        }
    }

    pub fn delete_breakpoint(&mut self, line: usize) {
        self.breakpoints.remove(&line);
    }
}
