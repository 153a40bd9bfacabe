//! Macro capture, lookup and expansion.
//!
//! A `.macro` directive captures the operations up to its `.endm` as a
//! reusable body with `\name` formal parameters. An instruction whose
//! mnemonic and operand count match a registered macro is replaced by an
//! invocation owning a freshly instantiated copy of the body.

use std::collections::HashMap;

use crate::errors::CompileErrorList;
use crate::final_rep::MacroInformation;
use crate::ir::{IntermediateInstruction, IntermediateOperation, OperationMeta};
use crate::position::PositionedString;

#[derive(Clone, Debug)]
pub struct MacroDirective {
    pub meta: OperationMeta,
    pub name: String,
    pub parameters: Vec<String>,
    pub body: Vec<IntermediateOperation>,
}

impl MacroDirective {
    /// Extends the directive to its matching `endm`.
    pub fn closed(mut self, end: MacroEndDirective) -> MacroDirective {
        self.meta.interval = self.meta.interval.merge(&end.meta.interval);
        self
    }
}

#[derive(Clone, Debug)]
pub struct MacroEndDirective {
    pub meta: OperationMeta,
}

/// The expansion of one macro call; owns the instantiated body.
#[derive(Clone, Debug)]
pub struct MacroInvocation {
    pub meta: OperationMeta,
    pub name: String,
    pub operations: Vec<IntermediateOperation>,
}

/// All macros of one parse, keyed by name and arity.
pub struct MacroTable {
    macros: HashMap<(String, usize), MacroDirective>,
}

impl MacroTable {
    pub fn collect(operations: &[IntermediateOperation]) -> MacroTable {
        let mut macros = HashMap::new();
        for operation in operations {
            if let IntermediateOperation::Macro(directive) = operation {
                macros.insert(
                    (directive.name.to_lowercase(), directive.parameters.len()),
                    directive.clone(),
                );
            }
        }
        MacroTable { macros }
    }

    pub fn information(&self) -> Vec<MacroInformation> {
        let mut information: Vec<MacroInformation> = self
            .macros
            .values()
            .map(|directive| MacroInformation {
                name: directive.name.clone(),
                parameter_count: directive.parameters.len(),
                interval: directive.meta.interval,
            })
            .collect();
        information.sort_by(|a, b| a.name.cmp(&b.name));
        information
    }

    /// Replaces a macro-invoking instruction by its expansion; all other
    /// operations pass through unchanged.
    pub fn expand(
        &self,
        operation: IntermediateOperation,
        errors: &mut CompileErrorList,
    ) -> IntermediateOperation {
        self.expand_with_stack(operation, &mut Vec::new(), errors)
    }

    fn expand_with_stack(
        &self,
        operation: IntermediateOperation,
        stack: &mut Vec<String>,
        errors: &mut CompileErrorList,
    ) -> IntermediateOperation {
        let instruction = match operation {
            IntermediateOperation::Instruction(instruction) => instruction,
            other => return other,
        };
        let key = (
            instruction.mnemonic.string.to_lowercase(),
            instruction.operands.len(),
        );
        let directive = match self.macros.get(&key) {
            Some(directive) => directive,
            None => return IntermediateOperation::Instruction(instruction),
        };
        if stack.contains(&key.0) {
            errors.push_error_args(
                instruction.meta.interval,
                "Cyclic macro call of macro '%1'.",
                vec![directive.name.clone()],
            );
            return IntermediateOperation::Instruction(instruction);
        }

        stack.push(key.0);
        let operations = self.instantiate(directive, &instruction, stack, errors);
        stack.pop();

        IntermediateOperation::MacroInvocation(MacroInvocation {
            meta: instruction.meta.clone(),
            name: directive.name.clone(),
            operations,
        })
    }

    fn instantiate(
        &self,
        directive: &MacroDirective,
        call: &IntermediateInstruction,
        stack: &mut Vec<String>,
        errors: &mut CompileErrorList,
    ) -> Vec<IntermediateOperation> {
        // Substitute longer parameter names first so `\n` never clobbers
        // a `\nn`.
        let mut substitutions: Vec<(String, &PositionedString)> = directive
            .parameters
            .iter()
            .zip(&call.operands)
            .map(|(parameter, operand)| (format!("\\{}", parameter), operand))
            .collect();
        substitutions.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        directive
            .body
            .iter()
            .map(|operation| {
                let mut instance = operation.clone();
                substitute_operation(&mut instance, &substitutions);
                self.expand_with_stack(instance, stack, errors)
            })
            .collect()
    }
}

fn substitute_text(text: &mut PositionedString, substitutions: &[(String, &PositionedString)]) {
    for (pattern, operand) in substitutions {
        if text.string.contains(pattern.as_str()) {
            text.string = text.string.replace(pattern.as_str(), &operand.string);
        }
    }
}

fn substitute_operation(
    operation: &mut IntermediateOperation,
    substitutions: &[(String, &PositionedString)],
) {
    match operation {
        IntermediateOperation::Instruction(instruction) => {
            substitute_text(&mut instruction.mnemonic, substitutions);
            for operand in &mut instruction.operands {
                substitute_text(operand, substitutions);
            }
        }
        IntermediateOperation::MemoryDefinition(directive) => {
            for value in &mut directive.values {
                substitute_text(value, substitutions);
            }
        }
        IntermediateOperation::MemoryReservation(directive) => {
            for value in &mut directive.values {
                substitute_text(value, substitutions);
            }
        }
        IntermediateOperation::Constant(directive) => {
            for argument in &mut directive.arguments {
                substitute_text(argument, substitutions);
            }
        }
        IntermediateOperation::Section(directive) => {
            substitute_text(&mut directive.name, substitutions);
        }
        IntermediateOperation::Macro(_)
        | IntermediateOperation::MacroEnd(_)
        | IntermediateOperation::MacroInvocation(_) => {}
    }
}
