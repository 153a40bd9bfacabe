mod instructions;
mod memory;
mod registers;
mod scheduling;
mod value;

use crate::arch::ArchitectureFormula;
use crate::project::ProjectCore;
use crate::scheduler::StopCondition;

/// A fresh rv32i+m project with 1024 memory cells, used as the direct
/// (thread-free) `MemoryAccess` in node-level tests.
pub fn test_project() -> ProjectCore {
    let formula = ArchitectureFormula::new("riscv", &["rv32i", "rv32m"]);
    ProjectCore::new(formula, 1024, StopCondition::new()).expect("test architecture must brew")
}

pub fn test_project_64() -> ProjectCore {
    let formula = ArchitectureFormula::new("riscv", &["rv32i", "rv32m", "rv64i", "rv64m"]);
    ProjectCore::new(formula, 1024, StopCondition::new()).expect("test architecture must brew")
}
