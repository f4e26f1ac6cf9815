//! Glob matching for protected-file patterns.
//!
//! Patterns use the familiar shell syntax: `*` matches within one path
//! segment, `**` spans segments. Matching is purely textual; paths are
//! never touched on disk.

use glob::{MatchOptions, Pattern};

/// Match options: `*` must not cross `/` so that `a/*.ts` does not match
/// `a/b/c.ts`.
fn options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Match a path against a single glob pattern.
///
/// A leading `**/` also matches zero directories, so `**/*.ts` matches
/// both `c.ts` and `a/b/c.ts`.
///
/// # Examples
///
/// ```
/// use dcp_util::glob::matches_glob;
///
/// assert!(matches_glob("a/b/c.ts", "**/*.ts"));
/// assert!(matches_glob("a/b.ts", "a/*.ts"));
/// assert!(!matches_glob("a/b/c.ts", "a/*.ts"));
/// ```
pub fn matches_glob(path: &str, pattern: &str) -> bool {
    let path = path.strip_prefix("./").unwrap_or(path);
    let opts = options();

    if let Ok(p) = Pattern::new(pattern) {
        if p.matches_with(path, opts) {
            return true;
        }
    }

    // `**/` at the start also covers the zero-directory case.
    if let Some(rest) = pattern.strip_prefix("**/") {
        if let Ok(p) = Pattern::new(rest) {
            if p.matches_with(path, opts) {
                return true;
            }
        }
    }

    false
}

/// Match a path against any of the given patterns.
pub fn matches_any<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|p| matches_glob(path, p.as_ref()))
}
