//! The symbol table and the whole-word symbol replacer.

use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::CompileErrorList;
use crate::position::PositionedString;

lazy_static! {
    static ref VALID_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Constant,
    Label,
}

#[derive(Clone, Debug)]
struct Symbol {
    name: String,
    replacement: String,
    kind: SymbolKind,
}

/// Names defined by `equ` directives and labels, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    names: HashSet<String>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            symbols: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Inserts a symbol, rejecting syntactically invalid and duplicate
    /// names.
    pub fn insert(
        &mut self,
        name: &PositionedString,
        replacement: &str,
        kind: SymbolKind,
        errors: &mut CompileErrorList,
    ) {
        let trimmed = name.string.trim();
        if !VALID_NAME.is_match(trimmed) {
            errors.push_error_args(
                name.interval,
                "Symbol '%1' does not have a qualified name.",
                vec![trimmed.to_owned()],
            );
            return;
        }
        if !self.names.insert(trimmed.to_owned()) {
            errors.push_error_args(
                name.interval,
                "Symbol '%1' defined twice.",
                vec![trimmed.to_owned()],
            );
            return;
        }
        self.symbols.push(Symbol {
            name: trimmed.to_owned(),
            replacement: replacement.to_owned(),
            kind,
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// A replacer over the current table contents.
    pub fn replacer(&self) -> SymbolReplacer {
        let compiled = self
            .symbols
            .iter()
            .map(|symbol| {
                // Names are plain identifiers, so no escaping is needed.
                let regex = Regex::new(&format!(r"\b{}\b", symbol.name))
                    .expect("symbol names form valid patterns");
                (symbol.clone(), regex)
            })
            .collect();
        SymbolReplacer {
            symbols: Arc::new(compiled),
            label_transform: None,
        }
    }
}

type LabelTransform = Arc<dyn Fn(i64) -> i64 + Send + Sync>;

/// Replaces symbol names by their values as whole words, as a bounded
/// fixed point so constants may refer to each other.
#[derive(Clone)]
pub struct SymbolReplacer {
    symbols: Arc<Vec<(Symbol, Regex)>>,
    label_transform: Option<LabelTransform>,
}

/// Replacement rounds before "recursion depth exceeded" is reported.
pub const MAXIMUM_REPLACE_COUNT: usize = 64;

impl SymbolReplacer {
    /// An empty replacer, for operands that must not contain symbols.
    pub fn empty() -> SymbolReplacer {
        SymbolReplacer {
            symbols: Arc::new(Vec::new()),
            label_transform: None,
        }
    }

    /// A derived replacer that maps every label address through `f`
    /// before substitution; used to turn absolute label addresses into
    /// PC-relative branch immediates.
    pub fn with_label_transform<F: Fn(i64) -> i64 + Send + Sync + 'static>(
        &self,
        f: F,
    ) -> SymbolReplacer {
        SymbolReplacer {
            symbols: Arc::clone(&self.symbols),
            label_transform: Some(Arc::new(f)),
        }
    }

    fn replacement_for(&self, symbol: &Symbol) -> String {
        match (&self.label_transform, symbol.kind) {
            (Some(transform), SymbolKind::Label) => {
                let address: i64 = symbol
                    .replacement
                    .parse()
                    .expect("label replacements are addresses");
                transform(address).to_string()
            }
            _ => symbol.replacement.clone(),
        }
    }

    /// Substitutes all symbols in `text`. Each round replaces every
    /// symbol once; rounds stop as soon as the text no longer changes,
    /// and exceeding the round cap reports a recursion error.
    pub fn replace(&self, text: &PositionedString, errors: &mut CompileErrorList) -> String {
        let mut result = text.string.clone();
        for _ in 0..MAXIMUM_REPLACE_COUNT {
            let mut changed = false;
            for (symbol, regex) in self.symbols.iter() {
                let replacement = self.replacement_for(symbol);
                let replaced = regex
                    .replace_all(&result, replacement.as_str())
                    .into_owned();
                if replaced != result {
                    changed = true;
                    result = replaced;
                }
            }
            if !changed {
                return result;
            }
        }
        errors.push_error(text.interval, "Exceeded recursion replacement depth.");
        result
    }
}
