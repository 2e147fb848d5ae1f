//! Integration Test: Panic-Free Production Code
//!
//! **Policy**: Library and daemon code propagate errors with `?`, `ok_or`,
//! `unwrap_or_*` or a logged fallback. `unwrap()` and `expect()` belong in
//! tests only.

use architectural_enforcement::{report, scan_production};

fn unwrap_rule(code: &str) -> Option<&'static str> {
    if code.contains(".unwrap()") {
        Some("unwrap() in production code")
    } else if code.contains(".expect(") {
        Some("expect() in production code")
    } else {
        None
    }
}

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let violations = scan_production(unwrap_rule);
    report(
        "CRITICAL: unwrap()/expect() found in production code!",
        &[
            "✅ REQUIRED:",
            "  - Return Result and use `?`",
            "  - unwrap_or / unwrap_or_else / unwrap_or_default with a sensible fallback",
            "  - let-else with a logged early return",
        ],
        &violations,
    );
}

#[test]
fn test_rule_ignores_fallback_variants() {
    assert!(unwrap_rule("x.unwrap_or_default()").is_none());
    assert!(unwrap_rule("x.unwrap_or_else(|_| y)").is_none());
    assert!(unwrap_rule("x.unwrap()").is_some());
    assert!(unwrap_rule("x.expect(\"boom\")").is_some());
}
