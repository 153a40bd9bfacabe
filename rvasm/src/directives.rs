//! The assembler directives: constants, sections, memory definition and
//! memory reservation.

use matches::debug_assert_matches;
use rvcore::conversions;

use crate::allocator::MemoryAllocator;
use crate::errors::CompileErrorList;
use crate::expression::{unescape_string_literal, CLikeExpressionCompiler};
use crate::ir::{ExecuteContext, OperationMeta};
use crate::position::PositionedString;
use crate::symbols::{SymbolKind, SymbolReplacer, SymbolTable};

/// `.equ name, expression` — a textual constant.
#[derive(Clone, Debug)]
pub struct ConstantDirective {
    pub meta: OperationMeta,
    pub arguments: Vec<PositionedString>,
}

impl ConstantDirective {
    pub fn enhance_symbol_table(&self, table: &mut SymbolTable, errors: &mut CompileErrorList) {
        if self.arguments.len() != 2 {
            errors.push_error_args(
                self.meta.interval,
                "'equ' expects a name and a value, got %1 arguments.",
                vec![self.arguments.len().to_string()],
            );
            return;
        }
        table.insert(
            &self.arguments[0],
            self.arguments[1].string.trim(),
            SymbolKind::Constant,
            errors,
        );
    }
}

/// `.section name` — switches the allocator's current section.
#[derive(Clone, Debug)]
pub struct SectionDirective {
    pub meta: OperationMeta,
    pub name: PositionedString,
}

impl SectionDirective {
    pub fn allocate_memory(&self, allocator: &mut MemoryAllocator) {
        let name = self.name.string.trim().trim_start_matches('.');
        allocator.set_current_section(name);
    }
}

/// `.byte` / `.half` / `.word` / `.dword` — initialized data cells.
///
/// Each argument is either a constant expression filling one cell or a
/// string literal filling one cell per code unit plus a terminating NUL.
#[derive(Clone, Debug)]
pub struct MemoryDefinitionDirective {
    pub meta: OperationMeta,
    /// Cell width in architecture bytes: 1, 2, 4 or 8.
    pub cell_size: usize,
    pub values: Vec<PositionedString>,
}

impl MemoryDefinitionDirective {
    pub fn new(
        meta: OperationMeta,
        cell_size: usize,
        values: Vec<PositionedString>,
    ) -> MemoryDefinitionDirective {
        debug_assert_matches!(cell_size, 1 | 2 | 4 | 8);
        MemoryDefinitionDirective {
            meta,
            cell_size,
            values,
        }
    }

    fn value_cell_count(&self, value: &PositionedString, errors: &mut CompileErrorList) -> usize {
        let text = value.string.trim();
        if text.starts_with('"') {
            match unescape_string_literal(text) {
                Ok(decoded) => string_units(&decoded, self.cell_size).len() + 1,
                Err(message) => {
                    errors.push_error(value.interval, message);
                    0
                }
            }
        } else {
            1
        }
    }

    pub fn allocate_memory(&mut self, allocator: &mut MemoryAllocator, errors: &mut CompileErrorList) {
        if self.values.is_empty() {
            errors.push_error(self.meta.interval, "Expected at least one value.");
        }
        let mut cells = 0;
        for value in &self.values {
            cells += self.value_cell_count(value, errors);
        }
        self.meta.position =
            Some(allocator.allocate_aligned(cells * self.cell_size, self.cell_size));
    }

    pub fn execute(&self, ctx: &mut ExecuteContext) {
        let base = match self.meta.address {
            Some(address) => address,
            None => return,
        };
        let mut offset = 0;
        for value in &self.values {
            let text = value.string.trim();
            if text.is_empty() {
                ctx.errors.push_error(value.interval, "Argument is empty.");
                continue;
            }
            if text.starts_with('"') {
                if let Ok(decoded) = unescape_string_literal(text) {
                    for unit in string_units(&decoded, self.cell_size) {
                        self.write_cell(ctx, base + offset, unit);
                        offset += self.cell_size;
                    }
                    self.write_cell(ctx, base + offset, 0);
                    offset += self.cell_size;
                }
                // A malformed string was already reported at allocation.
                continue;
            }
            let raw = compile_sized(text, value, self.cell_size, &ctx.replacer, ctx.errors);
            self.write_cell(ctx, base + offset, raw);
            offset += self.cell_size;
        }
    }

    fn write_cell(&self, ctx: &mut ExecuteContext, address: usize, raw: u64) {
        let bits = self.cell_size * ctx.architecture.byte_size();
        let value = conversions::from_unsigned(raw, bits, &ctx.architecture.data_format());
        ctx.memory_access.put_memory_value_at(address, &value);
    }
}

/// Evaluates an expression in the integer width of the cell, so wrapping
/// happens at the width the user declared.
fn compile_sized(
    text: &str,
    value: &PositionedString,
    cell_size: usize,
    replacer: &SymbolReplacer,
    errors: &mut CompileErrorList,
) -> u64 {
    let positioned = PositionedString::new(text, value.interval);
    match cell_size {
        1 => u64::from(CLikeExpressionCompiler::<u8>::new().compile(&positioned, replacer, errors)),
        2 => u64::from(CLikeExpressionCompiler::<u16>::new().compile(&positioned, replacer, errors)),
        4 => u64::from(CLikeExpressionCompiler::<u32>::new().compile(&positioned, replacer, errors)),
        _ => CLikeExpressionCompiler::<u64>::new().compile(&positioned, replacer, errors),
    }
}

/// The code units of a string for one cell width: UTF-8 bytes, UTF-16
/// units or code points.
fn string_units(decoded: &str, cell_size: usize) -> Vec<u64> {
    match cell_size {
        1 => decoded.bytes().map(u64::from).collect(),
        2 => decoded.encode_utf16().map(u64::from).collect(),
        _ => decoded.chars().map(|c| u64::from(u32::from(c))).collect(),
    }
}

/// `.resb` / `.resh` / `.resw` / `.resd` — reserved, zero-initialized
/// cells. The counts must be plain constant expressions; symbols are not
/// resolved yet when space is reserved.
#[derive(Clone, Debug)]
pub struct MemoryReservationDirective {
    pub meta: OperationMeta,
    pub cell_size: usize,
    pub values: Vec<PositionedString>,
}

impl MemoryReservationDirective {
    pub fn new(
        meta: OperationMeta,
        cell_size: usize,
        values: Vec<PositionedString>,
    ) -> MemoryReservationDirective {
        debug_assert_matches!(cell_size, 1 | 2 | 4 | 8);
        MemoryReservationDirective {
            meta,
            cell_size,
            values,
        }
    }

    pub fn allocate_memory(&mut self, allocator: &mut MemoryAllocator, errors: &mut CompileErrorList) {
        if self.values.is_empty() {
            errors.push_error(self.meta.interval, "Expected at least one count.");
        }
        let compiler = CLikeExpressionCompiler::<u64>::new();
        let empty = SymbolReplacer::empty();
        let mut count = 0u64;
        for value in &self.values {
            count = count.saturating_add(compiler.compile(value, &empty, errors));
        }
        self.meta.position =
            Some(allocator.allocate_aligned(count as usize * self.cell_size, self.cell_size));
    }
}
