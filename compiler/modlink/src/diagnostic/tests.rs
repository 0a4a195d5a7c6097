use super::*;
use crate::cache::LinkKey;
use crate::error::StaleReason;
use modlink_ir::Signature;
use pretty_assertions::assert_eq;

#[test]
fn test_error_code_display() {
    assert_eq!(ErrorCode::E4002.to_string(), "E4002");
    assert!(ErrorCode::W3001.is_warning());
    assert!(!ErrorCode::E3001.is_warning());
}

#[test]
fn test_ambiguous_rendering() {
    let err = LinkError::Ambiguous {
        key: LinkKey::new("Main", 0),
        interface: "Data.Set".into(),
        matches: vec!["Set_A".into(), "Set_B".into()],
    };
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, ErrorCode::E4002);
    assert_eq!(
        diag.to_string(),
        "error[E4002]: Main#0 is ambiguous: 2 modules implementing `Data.Set` match (Set_A, Set_B)\n  \
         = note: modules are never picked implicitly\n  \
         = help: add a constraint or narrow the search space"
    );
}

#[test]
fn test_stale_pin_suggests_refresh() {
    let err = LinkError::from(CacheError::StalePin {
        key: LinkKey::new("Main", 1),
        module: "Set_A".into(),
        reason: StaleReason::ConstraintFailed,
    });
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, ErrorCode::E5001);
    assert_eq!(diag.suggestions, vec!["re-link with `--refresh=Main#1`".to_string()]);
}

#[test]
fn test_conformance_lists_every_failure() {
    let err = ConformanceError {
        module: "Set_C".into(),
        interface: "Data.Set".into(),
        failures: vec![
            ConformanceFailure::MissingSignature {
                name: "insert".to_string(),
                expected: Signature::function("insert", 2),
            },
            ConformanceFailure::ShapeMismatch {
                name: "has".to_string(),
                expected: Signature::function("has", 2),
                found: Signature::function("has", 1),
            },
        ],
    };
    let diag = err.to_diagnostic();
    assert_eq!(diag.code, ErrorCode::E2001);
    assert_eq!(diag.notes.len(), 3);
    assert_eq!(diag.suggestions.len(), 1);
}

#[test]
fn test_register_error_fans_out() {
    let err = RegisterError::Analysis {
        module: "Main".into(),
        errors: vec![
            AnalysisError::UnknownInterface {
                module: "Main".into(),
                slot: 0,
                interface: "Data.Map".into(),
            },
            AnalysisError::ConstraintSyntax {
                module: "Main".into(),
                slot: 1,
                reason: "empty metadata path".to_string(),
            },
        ],
    };
    let codes: Vec<_> = err.to_diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E3003, ErrorCode::E3001]);
}

#[test]
fn test_render_summary() {
    let diags = vec![
        Diagnostic::error(ErrorCode::E4001).with_message("a"),
        Diagnostic::warning(ErrorCode::W3001).with_message("b"),
    ];
    let out = render(&diags);
    assert!(out.starts_with("error[E4001]: a\n\nwarning[W3001]: b\n\n"));
    assert!(out.ends_with("1 error(s), 1 warning(s) emitted\n"));
    assert_eq!(render(&[]), "");
}
