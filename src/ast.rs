//! The executable abstract syntax tree.
//!
//! Nodes form a closed tagged union instead of a class hierarchy: each kind
//! carries its specific fields, instruction nodes own their operand children.
//! The four operations every node answers are `validate` (static
//! well-formedness), `validate_runtime` (checks that need live store state),
//! `get_value` (the effect; for instruction nodes the returned value is the
//! next program counter) and `assemble` (the bit-exact encoding).

use std::fmt;
use std::sync::Arc;

use crate::arch::{ArchitectureProperties, InstructionInformation};
use crate::conversions;
use crate::riscv::formats;
use crate::riscv::operations::{self, Operation};
use crate::value::MemoryValue;

/// A user-facing message plus its arguments, kept apart so a host can
/// translate the template before substituting. Placeholders are `%1`,
/// `%2`, …
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Translateable {
    base: String,
    operands: Vec<String>,
}

impl Translateable {
    pub fn new<S: Into<String>>(base: S) -> Translateable {
        Translateable {
            base: base.into(),
            operands: Vec::new(),
        }
    }

    pub fn with_args<S: Into<String>>(base: S, operands: Vec<String>) -> Translateable {
        Translateable {
            base: base.into(),
            operands,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn operands(&self) -> &[String] {
        &self.operands
    }
}

impl fmt::Display for Translateable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut rendered = self.base.clone();
        for (index, operand) in self.operands.iter().enumerate() {
            rendered = rendered.replace(&format!("%{}", index + 1), operand);
        }
        f.write_str(&rendered)
    }
}

/// Outcome of `validate` / `validate_runtime`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    Success,
    Failure(Translateable),
}

impl ValidationResult {
    pub fn fail<S: Into<String>>(message: S) -> ValidationResult {
        ValidationResult::Failure(Translateable::new(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success)
    }

    pub fn message(&self) -> Option<&Translateable> {
        match self {
            ValidationResult::Success => None,
            ValidationResult::Failure(message) => Some(message),
        }
    }

    /// Keeps the first failure.
    pub fn and(self, other: ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Success => other,
            failure => failure,
        }
    }
}

/// Handle through which nodes reach the stores. The project servant
/// implements it directly; the execution unit talks through a proxy
/// implementation that posts onto the project's scheduler.
pub trait MemoryAccess {
    fn get_register_value(&mut self, name: &str) -> MemoryValue;
    fn put_register_value(&mut self, name: &str, value: &MemoryValue);
    fn set_register_value(&mut self, name: &str, value: &MemoryValue) -> MemoryValue;
    fn get_memory_value_at(&mut self, address: usize, amount: usize) -> MemoryValue;
    fn put_memory_value_at(&mut self, address: usize, value: &MemoryValue);
    fn set_memory_value_at(&mut self, address: usize, value: &MemoryValue) -> MemoryValue;
    /// Memory size in cells.
    fn get_memory_size(&mut self) -> usize;
    /// Interruptible sleep; returns `false` when cut short by the stop
    /// condition.
    fn sleep(&mut self, milliseconds: u64) -> bool;
}

/// Coarse node classification, used when instruction nodes check their
/// operand shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Instruction,
    Register,
    Immediate,
    Arithmetic,
    MemoryAccess,
    Data,
    Other,
}

/// A register operand, resolved against the architecture by the factory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterNode {
    pub name: String,
    /// Numeric id used by the encoder.
    pub id: usize,
}

/// An immediate operand; the value width is the architecture's word size
/// so immediates compose directly with register values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImmediateNode {
    pub value: MemoryValue,
}

/// Raw text payload, used by `simucrash`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataNode {
    pub data: String,
}

/// An instruction with its operand children.
#[derive(Clone)]
pub struct InstructionNode {
    pub info: InstructionInformation,
    pub operation: Operation,
    pub properties: Arc<ArchitectureProperties>,
    pub children: Vec<SyntaxTreeNode>,
}

#[derive(Clone)]
pub enum SyntaxTreeNode {
    Instruction(InstructionNode),
    Register(RegisterNode),
    Immediate(ImmediateNode),
    Data(DataNode),
}

impl SyntaxTreeNode {
    pub fn register(name: &str, id: usize) -> SyntaxTreeNode {
        SyntaxTreeNode::Register(RegisterNode {
            name: name.to_owned(),
            id,
        })
    }

    pub fn immediate(value: MemoryValue) -> SyntaxTreeNode {
        SyntaxTreeNode::Immediate(ImmediateNode { value })
    }

    pub fn data(data: &str) -> SyntaxTreeNode {
        SyntaxTreeNode::Data(DataNode {
            data: data.to_owned(),
        })
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            SyntaxTreeNode::Instruction(_) => NodeType::Instruction,
            SyntaxTreeNode::Register(_) => NodeType::Register,
            SyntaxTreeNode::Immediate(_) => NodeType::Immediate,
            SyntaxTreeNode::Data(_) => NodeType::Data,
        }
    }

    pub fn identifier(&self) -> String {
        match self {
            SyntaxTreeNode::Instruction(node) => node.info.mnemonic.clone(),
            SyntaxTreeNode::Register(node) => node.name.clone(),
            SyntaxTreeNode::Immediate(node) => {
                conversions::to_signed(&node.value, &Default::default()).to_string()
            }
            SyntaxTreeNode::Data(node) => node.data.clone(),
        }
    }

    pub fn children(&self) -> &[SyntaxTreeNode] {
        match self {
            SyntaxTreeNode::Instruction(node) => &node.children,
            _ => &[],
        }
    }

    /// Static well-formedness: operand counts, operand kinds, immediate
    /// widths.
    pub fn validate(&self, access: &mut dyn MemoryAccess) -> ValidationResult {
        match self {
            SyntaxTreeNode::Instruction(node) => operations::validate(node, access),
            _ => ValidationResult::Success,
        }
    }

    /// Checks that depend on live state, e.g. computed memory addresses.
    pub fn validate_runtime(&self, access: &mut dyn MemoryAccess) -> ValidationResult {
        match self {
            SyntaxTreeNode::Instruction(node) => operations::validate_runtime(node, access),
            _ => ValidationResult::Success,
        }
    }

    /// Performs the node's effect. For instruction nodes the result is the
    /// next program-counter value; register and immediate nodes yield
    /// their operand value.
    pub fn get_value(&self, access: &mut dyn MemoryAccess) -> MemoryValue {
        match self {
            SyntaxTreeNode::Instruction(node) => operations::execute(node, access),
            SyntaxTreeNode::Register(node) => access.get_register_value(&node.name),
            SyntaxTreeNode::Immediate(node) => node.value.clone(),
            SyntaxTreeNode::Data(_) => {
                panic!("data nodes have no value; they may only appear as operands")
            }
        }
    }

    /// The bit-exact encoding of this node.
    pub fn assemble(&self) -> MemoryValue {
        match self {
            SyntaxTreeNode::Instruction(node) => formats::assemble_instruction(node),
            SyntaxTreeNode::Register(node) => {
                conversions::from_unsigned(node.id as u64, 5, &Default::default())
            }
            SyntaxTreeNode::Immediate(node) => node.value.clone(),
            SyntaxTreeNode::Data(_) => panic!("data nodes have no encoding"),
        }
    }
}

impl fmt::Debug for SyntaxTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SyntaxTreeNode::Instruction(node) => f
                .debug_struct("Instruction")
                .field("mnemonic", &node.info.mnemonic)
                .field("children", &node.children)
                .finish(),
            SyntaxTreeNode::Register(node) => write!(f, "Register({})", node.name),
            SyntaxTreeNode::Immediate(node) => write!(f, "Immediate({:?})", node.value),
            SyntaxTreeNode::Data(node) => write!(f, "Data({:?})", node.data),
        }
    }
}
