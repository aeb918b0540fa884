//! The three-rule exclusion matcher for `sync-directory`: a
//! trailing-slash pattern matches any directory of that name at any
//! depth, a `*.ext` pattern matches by suffix, and anything else matches
//! only by exact relative-path equality.

use std::path::Path;

pub fn is_excluded(relative: &Path, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| matches_one(relative, pattern))
}

fn matches_one(relative: &Path, pattern: &str) -> bool {
    if let Some(dir_name) = pattern.strip_suffix('/') {
        return relative
            .components()
            .any(|c| c.as_os_str() == dir_name);
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        return relative
            .to_str()
            .map(|s| s.ends_with(suffix))
            .unwrap_or(false);
    }

    relative.to_str().map(|s| s == pattern).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn trailing_slash_matches_directory_at_any_depth() {
        let patterns = vec!["node_modules/".to_string()];
        assert!(is_excluded(&PathBuf::from("node_modules/left-pad/index.js"), &patterns));
        assert!(is_excluded(&PathBuf::from("apps/web/node_modules/x"), &patterns));
        assert!(!is_excluded(&PathBuf::from("src/node_modules_backup/x"), &patterns));
    }

    #[test]
    fn suffix_pattern_matches_by_extension() {
        let patterns = vec!["*.log".to_string()];
        assert!(is_excluded(&PathBuf::from("var/log/app.log"), &patterns));
        assert!(!is_excluded(&PathBuf::from("var/log/app.txt"), &patterns));
    }

    #[test]
    fn literal_pattern_matches_exact_relative_path_only() {
        let patterns = vec![".env".to_string()];
        assert!(is_excluded(&PathBuf::from(".env"), &patterns));
        assert!(!is_excluded(&PathBuf::from("config/.env"), &patterns));
    }
}
