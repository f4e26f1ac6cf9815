//! Path utilities.
//!
//! Display helpers for file paths shown in the prunable-tools manifest and
//! in notifications, plus the engine's own on-disk directories.

use std::path::PathBuf;

/// Get the dcp configuration directory (`~/.config/dcp`).
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dcp"))
}

/// Get the dcp data directory (`~/.local/share/dcp`).
///
/// Session sidecars live under `<data_dir>/sessions`.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("dcp"))
}

/// Get the dcp logs directory.
pub fn logs_dir() -> Option<PathBuf> {
    data_dir().map(|p| p.join("logs"))
}

/// Shorten a path for display, keeping the trailing `max_segments`
/// segments and prefixing `…/` when anything was dropped.
///
/// ```
/// use dcp_util::path::shorten;
///
/// assert_eq!(shorten("src/main.rs", 3), "src/main.rs");
/// assert_eq!(shorten("/home/user/project/src/main.rs", 2), "…/src/main.rs");
/// ```
pub fn shorten(path: &str, max_segments: usize) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() <= max_segments {
        return path.to_string();
    }
    let tail = &segments[segments.len() - max_segments..];
    format!("…/{}", tail.join("/"))
}

/// Truncate a string for display, appending `…` when cut.
///
/// Used for bash commands and other free-form parameter values in the
/// manifest. Truncation is by character, not byte, so multi-byte input
/// never splits a code point.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorten_short_path() {
        assert_eq!(shorten("main.rs", 2), "main.rs");
        assert_eq!(shorten("src/main.rs", 2), "src/main.rs");
    }

    #[test]
    fn test_shorten_long_path() {
        assert_eq!(shorten("/home/user/project/src/main.rs", 2), "…/src/main.rs");
        assert_eq!(shorten("a/b/c/d", 1), "…/d");
    }

    #[test]
    fn test_shorten_preserves_short_absolute_paths() {
        // Leading slash produces an empty segment that must not count.
        assert_eq!(shorten("/src/main.rs", 2), "/src/main.rs");
        assert_eq!(shorten("/x", 4), "/x");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("npm run build --verbose", 7), "npm run…");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("héllo wörld", 5), "héllo…");
    }
}
