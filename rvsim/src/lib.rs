//! The project façade: one [`ProjectModule`] per open project, binding
//! the engine stores, the assembler and the execution unit together and
//! exposing them through per-concern interfaces.
//!
//! Two schedulers carry the whole system: the project scheduler serializes
//! every access to memory, registers and architecture, the execution
//! scheduler runs parsing and the interpreter loop. All interfaces are
//! thin proxies posting onto one of the two.

pub mod execution;


use std::sync::Arc;
use std::time::Duration;

use log::debug;
use serde_json::Value as Json;

use rvasm::lexer::TokenKind;
use rvcore::arch::{Architecture, ArchitectureFormula, InstructionSet, UnitInformation};
use rvcore::ast::MemoryAccess;
use rvcore::conversions::{self, DataFormat};
use rvcore::project::{ProjectCore, ProjectError};
use rvcore::scheduler::{Future, Scheduler, Servant, StopCondition, SyncCondition};
use rvcore::value::MemoryValue;

use crate::execution::{
    ErrorCallback, FinalRepresentationCallback, LineCallback, MacroListCallback,
    ParsingAndExecutionUnit, StoppedCallback, SyncCallback,
};

/// Proxy implementation of the engine's `MemoryAccess`: every store
/// access becomes a blocking post onto the project servant, so the stores
/// are only ever touched on the project scheduler's thread. The sleep
/// hook waits on the shared stop condition instead of blocking the
/// project thread.
#[derive(Clone)]
pub struct MemoryAccessProxy {
    project: Servant<ProjectCore>,
    stop: StopCondition,
}

impl MemoryAccessProxy {
    fn new(project: Servant<ProjectCore>, stop: StopCondition) -> MemoryAccessProxy {
        MemoryAccessProxy { project, stop }
    }
}

impl MemoryAccess for MemoryAccessProxy {
    fn get_register_value(&mut self, name: &str) -> MemoryValue {
        let name = name.to_owned();
        self.project
            .post_future(move |core| core.get_register_value(&name))
    }

    fn put_register_value(&mut self, name: &str, value: &MemoryValue) {
        let name = name.to_owned();
        let value = value.clone();
        self.project
            .post_future(move |core| core.put_register_value(&name, &value))
    }

    fn set_register_value(&mut self, name: &str, value: &MemoryValue) -> MemoryValue {
        let name = name.to_owned();
        let value = value.clone();
        self.project
            .post_future(move |core| core.set_register_value(&name, &value))
    }

    fn get_memory_value_at(&mut self, address: usize, amount: usize) -> MemoryValue {
        self.project
            .post_future(move |core| core.get_memory_value_at(address, amount))
    }

    fn put_memory_value_at(&mut self, address: usize, value: &MemoryValue) {
        let value = value.clone();
        self.project
            .post_future(move |core| core.put_memory_value_at(address, &value))
    }

    fn set_memory_value_at(&mut self, address: usize, value: &MemoryValue) -> MemoryValue {
        let value = value.clone();
        self.project
            .post_future(move |core| core.set_memory_value_at(address, &value))
    }

    fn get_memory_size(&mut self) -> usize {
        self.project.post_future(|core| core.get_memory_size())
    }

    fn sleep(&mut self, milliseconds: u64) -> bool {
        !self.stop.wait_for(Duration::from_millis(milliseconds))
    }
}

/// The command surface of the executor.
#[derive(Clone)]
pub struct CommandInterface {
    execution: Servant<ParsingAndExecutionUnit>,
    stop: StopCondition,
}

impl CommandInterface {
    pub fn parse(&self, source: &str) {
        let source = source.to_owned();
        self.execution.post(move |unit| unit.parse(&source));
    }

    pub fn execute(&self) {
        self.execution.post(|unit| unit.execute());
    }

    /// Resolves to whether the program advanced by one line.
    pub fn execute_next_line(&self) -> Future<bool> {
        self.execution.future(|unit| unit.execute_next_line())
    }

    pub fn execute_to_breakpoint(&self) {
        self.execution.post(|unit| unit.execute_to_breakpoint());
    }

    pub fn set_execution_point(&self, line: usize) {
        self.execution.post(move |unit| unit.set_execution_point(line));
    }

    /// Returns whether the breakpoint was accepted.
    pub fn set_breakpoint(&self, line: usize) -> bool {
        self.execution
            .post_future(move |unit| unit.set_breakpoint(line))
    }

    pub fn delete_breakpoint(&self, line: usize) {
        self.execution.post(move |unit| unit.delete_breakpoint(line));
    }

    /// Raises the stop condition. This deliberately bypasses the task
    /// queue: the queue is busy running `execute`.
    pub fn stop(&self) {
        self.stop.raise();
    }

    pub fn set_sync_callback(&self, callback: SyncCallback) {
        self.execution.post(move |unit| unit.set_sync_callback(callback));
    }
}

/// The observer surface of the parser and executor.
#[derive(Clone)]
pub struct ParserInterface {
    execution: Servant<ParsingAndExecutionUnit>,
}

impl ParserInterface {
    pub fn set_final_representation_callback(&self, callback: FinalRepresentationCallback) {
        self.execution
            .post(move |unit| unit.set_final_representation_callback(callback));
    }

    pub fn set_error_callback(&self, callback: ErrorCallback) {
        self.execution.post(move |unit| unit.set_error_callback(callback));
    }

    pub fn set_current_line_callback(&self, callback: LineCallback) {
        self.execution
            .post(move |unit| unit.set_current_line_callback(callback));
    }

    pub fn set_macro_list_callback(&self, callback: MacroListCallback) {
        self.execution
            .post(move |unit| unit.set_macro_list_callback(callback));
    }

    pub fn set_execution_stopped_callback(&self, callback: StoppedCallback) {
        self.execution
            .post(move |unit| unit.set_execution_stopped_callback(callback));
    }

    /// The highlighting pattern for one token kind.
    pub fn get_syntax_regex(&self, kind: TokenKind) -> String {
        self.execution.post_future(move |unit| unit.syntax_regex(kind))
    }
}

/// The architecture surface, including the conversion helpers the editor
/// uses for in-place value editing.
#[derive(Clone)]
pub struct ArchitectureAccess {
    project: Servant<ProjectCore>,
    format: DataFormat,
}

impl ArchitectureAccess {
    pub fn get_architecture(&self) -> Architecture {
        self.project.post_future(|core| core.architecture().clone())
    }

    pub fn get_register_units(&self) -> Vec<UnitInformation> {
        self.project
            .post_future(|core| core.architecture().units().to_vec())
    }

    pub fn get_byte_size(&self) -> usize {
        self.project.post_future(|core| core.architecture().byte_size())
    }

    pub fn get_instruction_set(&self) -> InstructionSet {
        self.project
            .post_future(|core| core.architecture().instructions().clone())
    }

    pub fn to_signed_decimal(&self, value: &MemoryValue) -> String {
        conversions::to_signed_dec_string(value, &self.format)
    }

    pub fn to_unsigned_decimal(&self, value: &MemoryValue) -> String {
        conversions::to_unsigned_dec_string(value, &self.format)
    }

    pub fn to_hex(&self, value: &MemoryValue) -> String {
        conversions::to_hex_string(value)
    }

    pub fn from_signed_decimal(&self, text: &str, bits: usize) -> Option<MemoryValue> {
        conversions::signed_dec_string_to_memory_value(text, bits, &self.format)
    }

    pub fn from_unsigned_decimal(&self, text: &str, bits: usize) -> Option<MemoryValue> {
        conversions::unsigned_dec_string_to_memory_value(text, bits, &self.format)
    }

    pub fn from_hex(&self, text: &str, bits: usize) -> Option<MemoryValue> {
        conversions::hex_string_to_memory_value(text, bits)
    }
}

/// One open project: the stores behind the project scheduler, the parser
/// and interpreter behind the execution scheduler, and the shared stop
/// and observer-sync conditions.
pub struct ProjectModule {
    // Declaration order is teardown order: the execution scheduler drains
    // and joins while the project servant is still reachable.
    execution: Servant<ParsingAndExecutionUnit>,
    #[allow(dead_code)]
    execution_scheduler: Arc<Scheduler>,
    project: Servant<ProjectCore>,
    #[allow(dead_code)]
    project_scheduler: Arc<Scheduler>,
    stop: StopCondition,
    sync: SyncCondition,
    format: DataFormat,
}

impl Drop for ProjectModule {
    fn drop(&mut self) {
        // Cancel any running execution so the schedulers can drain.
        self.stop.raise();
        self.sync.notify();
    }
}

impl ProjectModule {
    pub fn new(
        formula: ArchitectureFormula,
        memory_cells: usize,
    ) -> Result<ProjectModule, ProjectError> {
        let stop = StopCondition::new();
        let sync = SyncCondition::new();
        let core = ProjectCore::new(formula, memory_cells, stop.clone())?;
        let architecture = core.architecture().clone();
        let format = architecture.data_format();

        let project_scheduler = Scheduler::new("project");
        let execution_scheduler = Scheduler::new("execution");
        let project = Servant::new(Arc::clone(&project_scheduler), core);
        let access = MemoryAccessProxy::new(project.clone(), stop.clone());
        let unit = ParsingAndExecutionUnit::new(architecture, access, stop.clone(), sync.clone());
        let execution = Servant::new(Arc::clone(&execution_scheduler), unit);
        debug!("project module wired");

        Ok(ProjectModule {
            project_scheduler,
            execution_scheduler,
            project,
            execution,
            stop,
            sync,
            format,
        })
    }

    pub fn command_interface(&self) -> CommandInterface {
        CommandInterface {
            execution: self.execution.clone(),
            stop: self.stop.clone(),
        }
    }

    pub fn parser_interface(&self) -> ParserInterface {
        ParserInterface {
            execution: self.execution.clone(),
        }
    }

    pub fn memory_access(&self) -> MemoryAccessProxy {
        MemoryAccessProxy::new(self.project.clone(), self.stop.clone())
    }

    pub fn architecture_access(&self) -> ArchitectureAccess {
        ArchitectureAccess {
            project: self.project.clone(),
            format: self.format,
        }
    }

    /// Observer acknowledgement for the execution back-pressure loop.
    pub fn gui_ready(&self) {
        self.sync.notify();
    }

    /// Registers the observer for memory changes `(address, amount)`.
    pub fn set_memory_callback<F: Fn(usize, usize) + Send + 'static>(&self, callback: F) {
        self.project.post(move |core| core.set_memory_callback(callback));
    }

    /// Registers the observer for register changes `(name)`.
    pub fn set_register_callback<F: Fn(&str) + Send + 'static>(&self, callback: F) {
        self.project.post(move |core| core.set_register_callback(callback));
    }

    /// The project snapshot: architecture formula, memory lines, register
    /// values.
    pub fn snapshot(&self) -> Json {
        self.project.post_future(|core| core.serialize_snapshot())
    }

    /// Restores a snapshot; the architecture formula and the memory
    /// geometry must match this project.
    pub fn load_snapshot(&self, snapshot: &Json) -> Result<(), ProjectError> {
        let snapshot = snapshot.clone();
        self.project
            .post_future(move |core| core.deserialize_snapshot(&snapshot))
    }
}
