//! The project servant state: the architecture, the memory and the
//! register set of one open project, together with its snapshot format.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use log::debug;
use serde_json::{Map, Value as Json};

use crate::arch::{Architecture, ArchitectureError, ArchitectureFormula};
use crate::ast::MemoryAccess;
use crate::memory::{Memory, MemoryDeserializationError};
use crate::register_set::RegisterSet;
use crate::scheduler::StopCondition;
use crate::value::MemoryValue;

const ARCHITECTURE_KEY: &str = "architecture";

#[derive(Debug)]
pub enum ProjectError {
    Architecture(ArchitectureError),
    Snapshot(MemoryDeserializationError),
    FormulaMismatch {
        expected: ArchitectureFormula,
        found: ArchitectureFormula,
    },
    MalformedSnapshot,
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProjectError::Architecture(error) => error.fmt(f),
            ProjectError::Snapshot(error) => error.fmt(f),
            ProjectError::FormulaMismatch { expected, found } => write!(
                f,
                "Snapshot was taken of a '{} {:?}' project, this project is '{} {:?}'.",
                found.family, found.modules, expected.family, expected.modules
            ),
            ProjectError::MalformedSnapshot => f.write_str("Snapshot is not a JSON object."),
        }
    }
}

impl StdError for ProjectError {}

impl From<ArchitectureError> for ProjectError {
    fn from(error: ArchitectureError) -> ProjectError {
        ProjectError::Architecture(error)
    }
}

impl From<MemoryDeserializationError> for ProjectError {
    fn from(error: MemoryDeserializationError) -> ProjectError {
        ProjectError::Snapshot(error)
    }
}

/// Uniquely owns the stores of one project. Always lives behind a servant;
/// every access from other threads goes through a proxy.
pub struct ProjectCore {
    formula: ArchitectureFormula,
    architecture: Architecture,
    memory: Memory,
    registers: RegisterSet,
    stop: StopCondition,
}

impl ProjectCore {
    /// Brews the architecture and builds zeroed stores for it.
    pub fn new(
        formula: ArchitectureFormula,
        memory_cells: usize,
        stop: StopCondition,
    ) -> Result<ProjectCore, ProjectError> {
        let architecture = Architecture::brew(&formula)?;
        let memory = Memory::new(memory_cells, architecture.byte_size());
        let mut registers = RegisterSet::new();
        for unit in architecture.units() {
            // Top-level registers own storage; enclosed ones become
            // aliases onto their parent.
            for register in unit.registers().iter().filter(|r| r.is_top_level()) {
                registers.create_with_value(
                    &register.name,
                    MemoryValue::new(register.size),
                    register.constant,
                );
            }
            for register in unit.registers().iter().filter(|r| !r.is_top_level()) {
                let parent = unit
                    .register_by_id(register.enclosing.expect("filtered on enclosing"))
                    .expect("enclosing register must exist")
                    .name
                    .clone();
                registers.alias(
                    &register.name,
                    &parent,
                    register.offset,
                    register.offset + register.size,
                    false,
                );
            }
        }
        debug!(
            "project up: {} with {} memory cells",
            architecture.name(),
            memory_cells
        );
        Ok(ProjectCore {
            formula,
            architecture,
            memory,
            registers,
            stop,
        })
    }

    pub fn formula(&self) -> &ArchitectureFormula {
        &self.formula
    }

    pub fn architecture(&self) -> &Architecture {
        &self.architecture
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn registers(&self) -> &RegisterSet {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterSet {
        &mut self.registers
    }

    /// Registers the observer for memory changes `(address, amount)`.
    pub fn set_memory_callback<F: Fn(usize, usize) + Send + 'static>(&mut self, callback: F) {
        self.memory.set_callback(callback);
    }

    /// Registers the observer for register changes `(name)`.
    pub fn set_register_callback<F: Fn(&str) + Send + 'static>(&mut self, callback: F) {
        self.registers.set_callback(callback);
    }

    /// Zeroes memory and all non-constant registers.
    pub fn reset(&mut self) {
        let cells = self.memory.byte_count();
        let zero = MemoryValue::new(cells * self.memory.byte_size());
        self.memory.put(0, &zero);
        let names: Vec<String> = self.registers.root_names().to_vec();
        for name in names {
            let size = self.registers.size_of(&name);
            self.registers.put(&name, &MemoryValue::new(size));
        }
    }

    /// The full project snapshot: architecture formula plus both stores.
    pub fn serialize_snapshot(&self) -> Json {
        let mut map = Map::new();
        map.insert(
            ARCHITECTURE_KEY.into(),
            serde_json::to_value(&self.formula).expect("formula serialization cannot fail"),
        );
        if let Json::Object(memory) = self.memory.serialize_json() {
            map.extend(memory);
        }
        if let Json::Object(registers) = self.registers.serialize_json() {
            map.extend(registers);
        }
        Json::Object(map)
    }

    /// Restores a snapshot into this project. The snapshot's architecture
    /// formula and memory geometry must match.
    pub fn deserialize_snapshot(&mut self, json: &Json) -> Result<(), ProjectError> {
        if !json.is_object() {
            return Err(ProjectError::MalformedSnapshot);
        }
        let found: ArchitectureFormula = json
            .get(ARCHITECTURE_KEY)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or(ProjectError::MalformedSnapshot)?;
        if found != self.formula {
            return Err(ProjectError::FormulaMismatch {
                expected: self.formula.clone(),
                found,
            });
        }
        self.memory.deserialize_json(json)?;
        self.registers.deserialize_json(json)?;
        Ok(())
    }
}

impl MemoryAccess for ProjectCore {
    fn get_register_value(&mut self, name: &str) -> MemoryValue {
        self.registers.get(name)
    }

    fn put_register_value(&mut self, name: &str, value: &MemoryValue) {
        self.registers.put(name, value);
    }

    fn set_register_value(&mut self, name: &str, value: &MemoryValue) -> MemoryValue {
        self.registers.set(name, value)
    }

    fn get_memory_value_at(&mut self, address: usize, amount: usize) -> MemoryValue {
        self.memory.get(address, amount)
    }

    fn put_memory_value_at(&mut self, address: usize, value: &MemoryValue) {
        self.memory.put(address, value);
    }

    fn set_memory_value_at(&mut self, address: usize, value: &MemoryValue) -> MemoryValue {
        self.memory.set(address, value)
    }

    fn get_memory_size(&mut self) -> usize {
        self.memory.byte_count()
    }

    fn sleep(&mut self, milliseconds: u64) -> bool {
        !self.stop.wait_for(Duration::from_millis(milliseconds))
    }
}
