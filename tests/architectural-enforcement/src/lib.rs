//! Architectural Enforcement Integration Tests
//!
//! This package contains source-scanning tests that keep the companion's
//! production code honest:
//! - No `unwrap()`/`expect()` outside tests
//! - No blocking sleeps on the async runtime
//! - No blocking HTTP or stdin
//!
//! Scanning is textual. Everything from the first `#[cfg(test)]` in a file
//! onward is treated as test code, and comment lines are ignored.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["companion/core/src", "companion/daemon/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Trimmed source text
    pub text: String,
    /// What rule the line broke
    pub reason: &'static str,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.reason,
            self.text
        )
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Code portion of `line`, or `None` for comment-only lines
fn code_part(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*') {
        return None;
    }
    // Trailing comments; string literals containing "//" are cut too, which
    // can only hide matches
    Some(trimmed.split("//").next().unwrap_or(trimmed))
}

/// Production lines of one file: `(line_number, code)`
pub fn production_lines(content: &str) -> Vec<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
        .filter_map(|(idx, line)| code_part(line).map(|code| (idx + 1, code)))
        .collect()
}

/// Check one file's production lines against `rule`
pub fn check_file<F>(path: &Path, rule: &F, violations: &mut Vec<Violation>)
where
    F: Fn(&str) -> Option<&'static str>,
{
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    for (line, code) in production_lines(&content) {
        if let Some(reason) = rule(code) {
            violations.push(Violation {
                path: path.to_path_buf(),
                line,
                text: code.trim().to_string(),
                reason,
            });
        }
    }
}

/// Run `rule` over every `.rs` file in the production trees
pub fn scan_production<F>(rule: F) -> Vec<Violation>
where
    F: Fn(&str) -> Option<&'static str>,
{
    let root = workspace_root();
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }

        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                check_file(entry.path(), &rule, &mut violations);
            }
        }
    }

    violations
}

/// Print `violations` and panic if there are any
pub fn report(title: &str, hint: &[&str], violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in hint {
        eprintln!("  {line}");
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let src = "fn a() {}\n// x.unwrap()\nfn b() {}\n#[cfg(test)]\nmod tests {}\n";
        let lines = production_lines(src);
        assert_eq!(lines, vec![(1, "fn a() {}"), (3, "fn b() {}")]);
    }

    #[test]
    fn test_trailing_comment_removed() {
        let lines = production_lines("let a = b; // b.unwrap() would panic\n");
        assert_eq!(lines, vec![(1, "let a = b; ")]);
    }

    #[test]
    fn test_workspace_root_has_production_dirs() {
        let root = workspace_root();
        for dir in PRODUCTION_DIRS {
            assert!(root.join(dir).exists(), "missing {dir}");
        }
    }
}
