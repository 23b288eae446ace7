use super::*;
use pretty_assertions::assert_eq;
use tarn_source::{FileTable, Loc};

#[test]
fn builder_accumulates_labels_and_notes() {
    let mut files = FileTable::new();
    let file = files.enter_source("a.tn", "x\n");
    let loc = Loc::new(file, 0, 1);

    let diagnostic = Diagnostic::error(ErrorCode::E5001)
        .with_message("alias chain for `X` is too deep")
        .with_label(loc, "alias declared here")
        .with_note("expansion stopped after 256 links");

    assert_eq!(diagnostic.severity, Severity::Error);
    assert_eq!(diagnostic.labels.len(), 1);
    assert_eq!(diagnostic.notes.len(), 1);
    assert_eq!(diagnostic.primary_loc(), Some(loc));
}

#[test]
fn primary_loc_skips_sentinel_labels() {
    let diagnostic = Diagnostic::warning(ErrorCode::E5002)
        .with_message("did you mean `count`?")
        .with_label(Loc::NONE, "synthesized scope");
    assert_eq!(diagnostic.primary_loc(), None);
}

#[test]
fn internal_codes_are_flagged() {
    assert!(ErrorCode::E9001.is_internal());
    assert!(!ErrorCode::E5001.is_internal());
    assert_eq!(ErrorCode::E9001.to_string(), "E9001");
}
