use crate::errors::CompileErrorList;
use crate::symbols::{SymbolKind, SymbolTable};
use crate::test::positioned;

#[test]
fn replaces_whole_words_only() {
    let mut errors = CompileErrorList::new();
    let mut table = SymbolTable::new();
    table.insert(&positioned("A"), "1", SymbolKind::Constant, &mut errors);
    table.insert(&positioned("B"), "2", SymbolKind::Constant, &mut errors);

    let replacer = table.replacer();
    assert_eq!(replacer.replace(&positioned("A+B"), &mut errors), "1+2");
    assert_eq!(replacer.replace(&positioned("AB"), &mut errors), "AB");
    assert!(!errors.has_errors());
}

#[test]
fn replacement_reaches_a_fixed_point() {
    let mut errors = CompileErrorList::new();
    let mut table = SymbolTable::new();
    table.insert(&positioned("A"), "B", SymbolKind::Constant, &mut errors);
    table.insert(&positioned("B"), "C", SymbolKind::Constant, &mut errors);
    table.insert(&positioned("C"), "7", SymbolKind::Constant, &mut errors);

    let replacer = table.replacer();
    assert_eq!(replacer.replace(&positioned("A"), &mut errors), "7");
    assert!(!errors.has_errors());
}

#[test]
fn recursive_definitions_hit_the_round_cap() {
    let mut errors = CompileErrorList::new();
    let mut table = SymbolTable::new();
    table.insert(&positioned("A"), "B", SymbolKind::Constant, &mut errors);
    table.insert(&positioned("B"), "A", SymbolKind::Constant, &mut errors);

    let replacer = table.replacer();
    replacer.replace(&positioned("A"), &mut errors);
    assert!(errors.has_errors());
    assert!(errors.errors()[0]
        .message
        .to_string()
        .contains("recursion replacement depth"));
}

#[test]
fn invalid_names_are_rejected() {
    let mut errors = CompileErrorList::new();
    let mut table = SymbolTable::new();
    table.insert(&positioned("1abc"), "1", SymbolKind::Constant, &mut errors);
    assert!(errors.has_errors());
    assert!(table.is_empty());
}

#[test]
fn duplicate_names_are_rejected() {
    let mut errors = CompileErrorList::new();
    let mut table = SymbolTable::new();
    table.insert(&positioned("twice"), "1", SymbolKind::Constant, &mut errors);
    table.insert(&positioned("twice"), "2", SymbolKind::Constant, &mut errors);
    assert!(errors.has_errors());
    assert_eq!(table.len(), 1);
}

#[test]
fn label_transform_rewrites_label_values_only() {
    let mut errors = CompileErrorList::new();
    let mut table = SymbolTable::new();
    table.insert(&positioned("loop"), "40", SymbolKind::Label, &mut errors);
    table.insert(&positioned("k"), "40", SymbolKind::Constant, &mut errors);

    // A branch at address 8 sees the label as (40 - 8) / 2.
    let replacer = table.replacer().with_label_transform(|address| (address - 8) / 2);
    assert_eq!(replacer.replace(&positioned("loop"), &mut errors), "16");
    assert_eq!(replacer.replace(&positioned("k"), &mut errors), "40");
    assert!(!errors.has_errors());
}
