//! Core of an interactive assembly-language interpreter for teaching
//! computer architecture.
//!
//! This crate contains the language-independent simulation engine: the
//! bit-addressable [`MemoryValue`](value/struct.MemoryValue.html), the
//! [`Memory`](memory/struct.Memory.html) and
//! [`RegisterSet`](register_set/struct.RegisterSet.html) stores with
//! aliasing and change notification, the immutable
//! [architecture model](arch/index.html) brewed from composable ISA
//! modules, the executable [instruction AST](ast/index.html) with its
//! RISC-V [semantics](riscv/index.html) and encoders, and the
//! [active-object layer](scheduler/index.html) that isolates the engine
//! from observer threads.
//!
//! Parsing lives in the `rvasm` crate; the `rvsim` crate wires everything
//! into a project façade.

pub mod arch;
pub mod ast;
pub mod conversions;
pub mod memory;
pub mod project;
pub mod register_set;
pub mod riscv;
pub mod scheduler;
pub mod value;

#[cfg(test)]
mod test;
