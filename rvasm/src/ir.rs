//! The intermediate representation: the operation variants the parser
//! emits, and the representator that collects them and runs the three
//! compile phases (memory allocation, symbol-table enhancement,
//! execution into the final representation).

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use rvcore::arch::Architecture;
use rvcore::ast::{MemoryAccess, SyntaxTreeNode};
use rvcore::conversions;
use rvcore::riscv::operations::is_relative_format;
use rvcore::riscv::InstructionNodeFactory;

use crate::allocator::{MemoryAllocator, RelativeMemoryPosition, TEXT_SECTION};
use crate::directives::{
    ConstantDirective, MemoryDefinitionDirective, MemoryReservationDirective, SectionDirective,
};
use crate::errors::CompileErrorList;
use crate::expression::{unescape_string_literal, CLikeExpressionCompiler};
use crate::final_rep::{FinalCommand, FinalRepresentation, MacroInformation};
use crate::macros::{MacroDirective, MacroEndDirective, MacroInvocation, MacroTable};
use crate::position::{CodePositionInterval, PositionedString};
use crate::symbols::{SymbolKind, SymbolReplacer, SymbolTable};

/// Data every operation variant carries: its labels and source interval,
/// plus its position once allocation ran.
#[derive(Clone, Debug, Default)]
pub struct OperationMeta {
    pub labels: Vec<PositionedString>,
    pub interval: CodePositionInterval,
    pub position: Option<RelativeMemoryPosition>,
    pub address: Option<usize>,
}

impl OperationMeta {
    pub fn new(labels: Vec<PositionedString>, interval: CodePositionInterval) -> OperationMeta {
        OperationMeta {
            labels,
            interval,
            position: None,
            address: None,
        }
    }
}

/// An instruction line: mnemonic plus raw operand texts. Lowered to a
/// syntax-tree node in the execute phase, after symbol replacement.
#[derive(Clone, Debug)]
pub struct IntermediateInstruction {
    pub meta: OperationMeta,
    pub mnemonic: PositionedString,
    pub operands: Vec<PositionedString>,
}

#[derive(Clone, Debug)]
pub enum IntermediateOperation {
    Instruction(IntermediateInstruction),
    MemoryDefinition(MemoryDefinitionDirective),
    MemoryReservation(MemoryReservationDirective),
    Constant(ConstantDirective),
    Section(SectionDirective),
    Macro(MacroDirective),
    MacroEnd(MacroEndDirective),
    MacroInvocation(MacroInvocation),
}

/// Mutable state of the execute phase.
pub struct ExecuteContext<'a> {
    pub architecture: &'a Architecture,
    pub factory: &'a InstructionNodeFactory,
    pub memory_access: &'a mut dyn MemoryAccess,
    pub replacer: SymbolReplacer,
    pub commands: &'a mut Vec<FinalCommand>,
    pub errors: &'a mut CompileErrorList,
}

impl IntermediateOperation {
    pub fn meta(&self) -> &OperationMeta {
        match self {
            IntermediateOperation::Instruction(op) => &op.meta,
            IntermediateOperation::MemoryDefinition(op) => &op.meta,
            IntermediateOperation::MemoryReservation(op) => &op.meta,
            IntermediateOperation::Constant(op) => &op.meta,
            IntermediateOperation::Section(op) => &op.meta,
            IntermediateOperation::Macro(op) => &op.meta,
            IntermediateOperation::MacroEnd(op) => &op.meta,
            IntermediateOperation::MacroInvocation(op) => &op.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut OperationMeta {
        match self {
            IntermediateOperation::Instruction(op) => &mut op.meta,
            IntermediateOperation::MemoryDefinition(op) => &mut op.meta,
            IntermediateOperation::MemoryReservation(op) => &mut op.meta,
            IntermediateOperation::Constant(op) => &mut op.meta,
            IntermediateOperation::Section(op) => &mut op.meta,
            IntermediateOperation::Macro(op) => &mut op.meta,
            IntermediateOperation::MacroEnd(op) => &mut op.meta,
            IntermediateOperation::MacroInvocation(op) => &mut op.meta,
        }
    }

    /// Phase one: reserve memory and track the current section.
    pub fn allocate_memory(
        &mut self,
        architecture: &Architecture,
        allocator: &mut MemoryAllocator,
        errors: &mut CompileErrorList,
    ) {
        match self {
            IntermediateOperation::Instruction(op) => {
                let cells = architecture.properties().instruction_length / architecture.byte_size();
                op.meta.position = Some(allocator.allocate_in(TEXT_SECTION, cells));
            }
            IntermediateOperation::MemoryDefinition(op) => op.allocate_memory(allocator, errors),
            IntermediateOperation::MemoryReservation(op) => op.allocate_memory(allocator, errors),
            IntermediateOperation::Section(op) => op.allocate_memory(allocator),
            IntermediateOperation::MacroInvocation(op) => {
                for inner in &mut op.operations {
                    inner.allocate_memory(architecture, allocator, errors);
                }
            }
            IntermediateOperation::Constant(_)
            | IntermediateOperation::Macro(_)
            | IntermediateOperation::MacroEnd(_) => {}
        }
    }

    /// Resolves the relative position handed out in phase one.
    pub fn solidify_address(&mut self, allocator: &MemoryAllocator) {
        if let IntermediateOperation::MacroInvocation(op) = self {
            for inner in &mut op.operations {
                inner.solidify_address(allocator);
            }
            let first = op.operations.iter().find_map(|inner| inner.meta().address);
            op.meta.address = first;
            return;
        }
        let meta = self.meta_mut();
        if let Some(position) = &meta.position {
            meta.address = Some(allocator.absolute(position));
        }
    }

    /// Phase two: resolve labels to addresses and collect constants.
    pub fn enhance_symbol_table(
        &mut self,
        table: &mut SymbolTable,
        errors: &mut CompileErrorList,
    ) {
        let address = self.meta().address;
        for label in self.meta().labels.clone() {
            match address {
                Some(address) => {
                    table.insert(&label, &address.to_string(), SymbolKind::Label, errors)
                }
                None => errors.push_error_args(
                    label.interval,
                    "Label '%1' is not attached to an addressable operation.",
                    vec![label.string.clone()],
                ),
            }
        }
        match self {
            IntermediateOperation::Constant(op) => op.enhance_symbol_table(table, errors),
            IntermediateOperation::MacroInvocation(op) => {
                for inner in &mut op.operations {
                    inner.enhance_symbol_table(table, errors);
                }
            }
            _ => {}
        }
    }

    /// Phase three: lower instructions to final commands and write data
    /// directives into memory.
    pub fn execute(&self, ctx: &mut ExecuteContext) {
        match self {
            IntermediateOperation::Instruction(op) => op.execute(ctx),
            IntermediateOperation::MemoryDefinition(op) => op.execute(ctx),
            IntermediateOperation::MacroInvocation(op) => {
                for inner in &op.operations {
                    inner.execute(ctx);
                }
            }
            _ => {}
        }
    }
}

lazy_static! {
    static ref MEMORY_OPERAND: Regex =
        Regex::new(r"^(?P<offset>.*)\(\s*(?P<base>[A-Za-z_][A-Za-z0-9_]*)\s*\)$").unwrap();
}

impl IntermediateInstruction {
    fn execute(&self, ctx: &mut ExecuteContext) {
        let address = self
            .meta
            .address
            .expect("instructions always receive an address");

        // Branch and jump operands are written PC-relative in halfwords;
        // everything else substitutes absolute label addresses.
        let format = ctx
            .factory
            .instruction_set()
            .get(&self.mnemonic.string)
            .map(|info| info.format);
        let replacer = match format {
            Some(format) if is_relative_format(format) => {
                let own_address = address as i64;
                ctx.replacer
                    .with_label_transform(move |label| (label - own_address) / 2)
            }
            _ => ctx.replacer.clone(),
        };

        let mut children = Vec::new();
        let mut failed = false;
        for operand in &self.operands {
            let replaced =
                PositionedString::new(replacer.replace(operand, ctx.errors), operand.interval);
            match lower_operand(&replaced, ctx) {
                Some(mut nodes) => children.append(&mut nodes),
                None => failed = true,
            }
        }
        if failed {
            return;
        }

        match ctx.factory.create(&self.mnemonic.string, children) {
            Ok(node) => {
                let validation = node.validate(ctx.memory_access);
                if let Some(message) = validation.message() {
                    ctx.errors
                        .push_translateable(self.meta.interval, message.clone());
                    return;
                }
                ctx.commands.push(FinalCommand {
                    node,
                    address,
                    interval: self.meta.interval,
                });
            }
            Err(message) => ctx.errors.push_translateable(self.meta.interval, message),
        }
    }
}

/// Turns one replaced operand text into operand nodes. A memory operand
/// `offset(base)` yields the base register followed by the offset.
fn lower_operand(
    operand: &PositionedString,
    ctx: &mut ExecuteContext,
) -> Option<Vec<SyntaxTreeNode>> {
    let text = operand.string.trim();
    if text.is_empty() {
        ctx.errors.push_error(operand.interval, "Operand is empty.");
        return None;
    }

    let lowered = text.to_lowercase();
    if let Some(register) = ctx.architecture.register_by_name(&lowered) {
        return Some(vec![SyntaxTreeNode::register(&register.name, register.id)]);
    }

    if text.starts_with('"') {
        return match unescape_string_literal(text) {
            Ok(decoded) => Some(vec![SyntaxTreeNode::data(&decoded)]),
            Err(message) => {
                ctx.errors.push_error(operand.interval, message);
                None
            }
        };
    }

    if let Some(captures) = MEMORY_OPERAND.captures(text) {
        let base_name = captures["base"].to_lowercase();
        if let Some(register) = ctx.architecture.register_by_name(&base_name) {
            let base = SyntaxTreeNode::register(&register.name, register.id);
            let offset_text = captures["offset"].trim().to_owned();
            let offset_text = if offset_text.is_empty() {
                "0".to_owned()
            } else {
                offset_text
            };
            let offset = lower_immediate(
                &PositionedString::new(offset_text, operand.interval),
                ctx,
            )?;
            return Some(vec![base, offset]);
        }
    }

    Some(vec![lower_immediate(operand, ctx)?])
}

fn lower_immediate(
    operand: &PositionedString,
    ctx: &mut ExecuteContext,
) -> Option<SyntaxTreeNode> {
    let before = ctx.errors.len();
    // Symbols were already replaced; the compiler only evaluates.
    let empty = SymbolReplacer::empty();
    let word_size = ctx.architecture.word_size();
    let value: i64 = if word_size > 32 {
        CLikeExpressionCompiler::<i64>::new().compile(operand, &empty, ctx.errors)
    } else {
        i64::from(CLikeExpressionCompiler::<i32>::new().compile(operand, &empty, ctx.errors))
    };
    if ctx.errors.len() > before {
        return None;
    }
    Some(SyntaxTreeNode::immediate(conversions::from_signed(
        value,
        word_size,
        &ctx.architecture.data_format(),
    )))
}

/// Collects parsed operations and runs the compile phases over them.
pub struct IntermediateRepresentator {
    operations: Vec<IntermediateOperation>,
    open_macro: Option<MacroDirective>,
}

impl IntermediateRepresentator {
    pub fn new() -> IntermediateRepresentator {
        IntermediateRepresentator {
            operations: Vec::new(),
            open_macro: None,
        }
    }

    /// Inserts the next parsed operation, routing it into an open macro
    /// body when one is being collected.
    pub fn insert(&mut self, operation: IntermediateOperation, errors: &mut CompileErrorList) {
        match operation {
            IntermediateOperation::Macro(directive) => {
                if self.open_macro.is_some() {
                    errors.push_error(
                        directive.meta.interval,
                        "Macros may not be defined inside macros.",
                    );
                } else {
                    self.open_macro = Some(directive);
                }
            }
            IntermediateOperation::MacroEnd(end) => match self.open_macro.take() {
                Some(directive) => self
                    .operations
                    .push(IntermediateOperation::Macro(directive.closed(end))),
                None => errors.push_error(
                    end.meta.interval,
                    "'endm' without a matching 'macro' directive.",
                ),
            },
            other => match &mut self.open_macro {
                Some(open) => open.body.push(other),
                None => self.operations.push(other),
            },
        }
    }

    /// Runs macro expansion, the three phases and the final assembly of
    /// the representation.
    pub fn transform(
        mut self,
        architecture: &Architecture,
        factory: &InstructionNodeFactory,
        memory_access: &mut dyn MemoryAccess,
        mut errors: CompileErrorList,
    ) -> FinalRepresentation {
        if let Some(open) = &self.open_macro {
            errors.push_error(open.meta.interval, "A macro is missing its 'endm'.");
        }

        // Replace macro-invoking instructions before anything is
        // allocated.
        let macros = MacroTable::collect(&self.operations);
        let mut operations = Vec::with_capacity(self.operations.len());
        for operation in self.operations.drain(..) {
            operations.push(macros.expand(operation, &mut errors));
        }

        let mut allocator = MemoryAllocator::new();
        for operation in &mut operations {
            operation.allocate_memory(architecture, &mut allocator, &mut errors);
        }
        allocator.calculate_positions();

        let memory_size = memory_access.get_memory_size();
        if allocator.total_size() > memory_size {
            errors.push_error_args(
                CodePositionInterval::default(),
                "The program needs %1 memory cells, but only %2 are available.",
                vec![allocator.total_size().to_string(), memory_size.to_string()],
            );
            return FinalRepresentation {
                commands: Vec::new(),
                error_list: errors,
                macros: macros.information(),
            };
        }

        for operation in &mut operations {
            operation.solidify_address(&allocator);
        }

        let mut table = SymbolTable::new();
        for operation in &mut operations {
            operation.enhance_symbol_table(&mut table, &mut errors);
        }

        let mut commands = Vec::new();
        {
            let mut ctx = ExecuteContext {
                architecture,
                factory,
                memory_access,
                replacer: table.replacer(),
                commands: &mut commands,
                errors: &mut errors,
            };
            for operation in &operations {
                operation.execute(&mut ctx);
            }
        }
        debug!(
            "transformed {} operations into {} commands ({} diagnostics)",
            operations.len(),
            commands.len(),
            errors.len()
        );

        FinalRepresentation {
            commands,
            error_list: errors,
            macros: macros.information(),
        }
    }
}

impl Default for IntermediateRepresentator {
    fn default() -> IntermediateRepresentator {
        IntermediateRepresentator::new()
    }
}
