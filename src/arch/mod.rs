//! The immutable description of an instruction-set architecture: its data
//! format, its register units and its instruction inventory.
//!
//! Architectures are brewed from an [`ArchitectureFormula`]: a family name
//! plus an ordered list of composable ISA modules. Later modules may extend
//! the result of earlier ones but must not contradict them.

mod instruction;
mod unit;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::conversions::{AlignmentBehavior, DataFormat, Endianness, SignRepresentation};
use crate::riscv::modules;

pub use self::instruction::{
    InstructionFormat, InstructionInformation, InstructionKey, InstructionSet,
};
pub use self::unit::{ConstituentInformation, RegisterInformation, RegisterType, UnitInformation};

/// Recipe for brewing an architecture: a family plus its module list,
/// e.g. `("riscv", ["rv32i", "rv32m"])`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureFormula {
    pub family: String,
    pub modules: Vec<String>,
}

impl ArchitectureFormula {
    pub fn new<S: Into<String>>(family: S, modules: &[&str]) -> ArchitectureFormula {
        ArchitectureFormula {
            family: family.into(),
            modules: modules.iter().map(|m| (*m).to_owned()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchitectureError {
    UnknownFamily(String),
    UnknownModule(String),
    EmptyFormula,
    /// The first module must define the base architecture.
    MissingBaseModule(String),
    /// A later module tried to redefine something incompatibly.
    ConflictingDefinition(String),
}

impl fmt::Display for ArchitectureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArchitectureError::UnknownFamily(family) => {
                write!(f, "Unknown architecture family '{}'.", family)
            }
            ArchitectureError::UnknownModule(module) => {
                write!(f, "Unknown architecture module '{}'.", module)
            }
            ArchitectureError::EmptyFormula => {
                write!(f, "An architecture formula needs at least one module.")
            }
            ArchitectureError::MissingBaseModule(module) => {
                write!(f, "The first module must be a base module, got '{}'.", module)
            }
            ArchitectureError::ConflictingDefinition(what) => {
                write!(f, "Conflicting architecture definition: {}.", what)
            }
        }
    }
}

impl StdError for ArchitectureError {}

/// Facts about an architecture that instruction nodes need at execution
/// time, shared behind an `Arc` so every node can hold them cheaply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchitectureProperties {
    /// Register width in bits.
    pub word_size: usize,
    /// Memory cell width in bits.
    pub byte_size: usize,
    pub format: DataFormat,
    pub alignment: AlignmentBehavior,
    /// Encoded instruction width in bits.
    pub instruction_length: usize,
    pub program_counter: String,
    pub link_register: String,
}

/// An immutable, fully brewed architecture.
#[derive(Clone)]
pub struct Architecture {
    name: String,
    endianness: Endianness,
    sign_representation: SignRepresentation,
    alignment: AlignmentBehavior,
    units: Vec<UnitInformation>,
    instructions: InstructionSet,
    properties: Arc<ArchitectureProperties>,
}

impl Architecture {
    /// Brews an architecture from a formula. The only supported family is
    /// `riscv` with the modules `rv32i`, `rv32m`, `rv64i` and `rv64m`.
    pub fn brew(formula: &ArchitectureFormula) -> Result<Architecture, ArchitectureError> {
        if formula.modules.is_empty() {
            return Err(ArchitectureError::EmptyFormula);
        }
        match formula.family.as_str() {
            "riscv" => modules::brew(&formula.modules),
            other => Err(ArchitectureError::UnknownFamily(other.to_owned())),
        }
    }

    pub(crate) fn assemble(
        name: String,
        word_size: usize,
        byte_size: usize,
        endianness: Endianness,
        sign_representation: SignRepresentation,
        alignment: AlignmentBehavior,
        units: Vec<UnitInformation>,
        instructions: InstructionSet,
        program_counter: String,
        link_register: String,
        instruction_length: usize,
    ) -> Architecture {
        let resolved_endianness = match endianness {
            Endianness::Bi => Endianness::Little,
            other => other,
        };
        let properties = Arc::new(ArchitectureProperties {
            word_size,
            byte_size,
            format: DataFormat {
                bits_per_byte: byte_size,
                endianness: resolved_endianness,
                sign_representation,
            },
            alignment,
            instruction_length,
            program_counter,
            link_register,
        });
        Architecture {
            name,
            endianness: resolved_endianness,
            sign_representation,
            alignment,
            units,
            instructions,
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn word_size(&self) -> usize {
        self.properties.word_size
    }

    pub fn byte_size(&self) -> usize {
        self.properties.byte_size
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn sign_representation(&self) -> SignRepresentation {
        self.sign_representation
    }

    pub fn alignment(&self) -> AlignmentBehavior {
        self.alignment
    }

    pub fn data_format(&self) -> DataFormat {
        self.properties.format
    }

    pub fn units(&self) -> &[UnitInformation] {
        &self.units
    }

    pub fn instructions(&self) -> &InstructionSet {
        &self.instructions
    }

    pub fn properties(&self) -> Arc<ArchitectureProperties> {
        Arc::clone(&self.properties)
    }

    /// Looks a register up across all units.
    pub fn register_by_name(&self, name: &str) -> Option<&RegisterInformation> {
        self.units.iter().find_map(|unit| unit.register_by_name(name))
    }
}

impl fmt::Debug for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Architecture")
            .field("name", &self.name)
            .field("word_size", &self.properties.word_size)
            .field("units", &self.units.len())
            .field("instructions", &self.instructions.len())
            .finish()
    }
}
