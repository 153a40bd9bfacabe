use rvcore::ast::SyntaxTreeNode;

use crate::errors::CompileErrorList;
use crate::position::CodePositionInterval;

/// One executable command: the root of its syntax tree, its absolute
/// address in the text section and the source lines it came from.
#[derive(Clone, Debug)]
pub struct FinalCommand {
    pub node: SyntaxTreeNode,
    pub address: usize,
    pub interval: CodePositionInterval,
}

/// A macro the parse discovered, as shown in the editor's macro list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroInformation {
    pub name: String,
    pub parameter_count: usize,
    pub interval: CodePositionInterval,
}

/// Everything one parse produces: the ordered command list, the
/// accumulated diagnostics and the discovered macros.
#[derive(Clone, Debug, Default)]
pub struct FinalRepresentation {
    pub commands: Vec<FinalCommand>,
    pub error_list: CompileErrorList,
    pub macros: Vec<MacroInformation>,
}

impl FinalRepresentation {
    /// Index of the command at `address`, if any.
    pub fn command_at_address(&self, address: usize) -> Option<usize> {
        self.commands
            .iter()
            .position(|command| command.address == address)
    }

    /// Index of the first command whose line interval contains `line`.
    pub fn command_on_line(&self, line: usize) -> Option<usize> {
        self.commands.iter().position(|command| {
            command.interval.start_line() <= line && line <= command.interval.end_line()
        })
    }
}
