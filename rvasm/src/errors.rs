use std::fmt;

use rvcore::ast::Translateable;

use crate::position::CodePositionInterval;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileErrorSeverity {
    Error,
    Warning,
    Information,
}

/// One diagnostic: a translateable message, where it happened and how bad
/// it is. Compile errors never abort the pipeline; they accumulate so a
/// user sees as many problems as possible per pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub message: Translateable,
    pub interval: CodePositionInterval,
    pub severity: CompileErrorSeverity,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "line {}: {}",
            self.interval.start_line() + 1,
            self.message
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileErrorList {
    errors: Vec<CompileError>,
}

impl CompileErrorList {
    pub fn new() -> CompileErrorList {
        CompileErrorList { errors: Vec::new() }
    }

    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn push_error<S: Into<String>>(&mut self, interval: CodePositionInterval, message: S) {
        self.push(CompileError {
            message: Translateable::new(message),
            interval,
            severity: CompileErrorSeverity::Error,
        });
    }

    pub fn push_error_args<S: Into<String>>(
        &mut self,
        interval: CodePositionInterval,
        message: S,
        operands: Vec<String>,
    ) {
        self.push(CompileError {
            message: Translateable::with_args(message, operands),
            interval,
            severity: CompileErrorSeverity::Error,
        });
    }

    pub fn push_translateable(&mut self, interval: CodePositionInterval, message: Translateable) {
        self.push(CompileError {
            message,
            interval,
            severity: CompileErrorSeverity::Error,
        });
    }

    pub fn push_warning<S: Into<String>>(&mut self, interval: CodePositionInterval, message: S) {
        self.push(CompileError {
            message: Translateable::new(message),
            interval,
            severity: CompileErrorSeverity::Warning,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|error| error.severity == CompileErrorSeverity::Error)
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}
