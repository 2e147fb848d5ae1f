//! Integration Test: Blocking Call Prohibition
//!
//! **Policy**: Everything in the companion runs on the tokio runtime. Timers
//! use `tokio::time`, stdin is read through `tokio::io`, and HTTP goes through
//! the async `reqwest::Client`.

use architectural_enforcement::{report, scan_production};

fn blocking_rule(code: &str) -> Option<&'static str> {
    if code.contains("thread::sleep") {
        Some("Blocking sleep")
    } else if code.contains("reqwest::blocking") {
        Some("Blocking HTTP client")
    } else if code.contains("std::io::stdin")
        || (code.contains("io::stdin()") && !code.contains("tokio::io::stdin"))
    {
        Some("Blocking stdin")
    } else if code.contains("block_on(") {
        Some("Nested runtime block_on")
    } else {
        None
    }
}

#[test]
fn test_no_blocking_calls_in_production_code() {
    let violations = scan_production(blocking_rule);
    report(
        "CRITICAL: Blocking calls found in production code!",
        &[
            "❌ FORBIDDEN:",
            "  - std::thread::sleep()",
            "  - reqwest::blocking::*",
            "  - std::io::stdin()",
            "  - Runtime::block_on() / futures::executor::block_on()",
            "✅ REQUIRED:",
            "  - tokio::time::sleep().await",
            "  - reqwest::Client with .await",
            "  - tokio::io::stdin() with AsyncBufReadExt",
        ],
        &violations,
    );
}

#[test]
fn test_rule_allows_async_equivalents() {
    assert!(blocking_rule("tokio::time::sleep(delay).await").is_none());
    assert!(blocking_rule("BufReader::new(tokio::io::stdin()).lines()").is_none());
    assert!(blocking_rule("std::thread::sleep(d)").is_some());
    assert!(blocking_rule("let s = std::io::stdin();").is_some());
}
