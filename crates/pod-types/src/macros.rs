//! Macro-site identity and the file directive tri-state.

use std::path::Path;

/// Identifies a macro call site as `<normalized-relative-path>:<binding>`.
///
/// Normalization always uses forward slashes, regardless of platform, so
/// keys are stable between a build run on Windows and one on Linux.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteKey(String);

impl SiteKey {
    /// Builds a key from an already-normalized relative path and a binding
    /// name. Prefer [`SiteKey::from_root`] when you have an absolute path
    /// and a project root to normalize against.
    pub fn new(normalized_file: impl Into<String>, binding: impl AsRef<str>) -> Self {
        Self(format!("{}:{}", normalized_file.into(), binding.as_ref()))
    }

    /// Normalizes `file` relative to `root` (forward slashes) and appends
    /// `:binding`.
    pub fn from_root(root: &Path, file: &Path, binding: impl AsRef<str>) -> Self {
        let rel = file.strip_prefix(root).unwrap_or(file);
        let normalized = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(normalized, binding)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The portion of the key before the final `:binding` suffix.
    pub fn file_part(&self) -> &str {
        self.0.rsplit_once(':').map(|(f, _)| f).unwrap_or(&self.0)
    }

    /// The portion of the key after the final `:binding` suffix.
    pub fn binding_part(&self) -> &str {
        self.0.rsplit_once(':').map(|(_, b)| b).unwrap_or("")
    }
}

impl std::fmt::Display for SiteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file's opening-position marker, selecting a downstream transformation
/// pipeline outside the expander itself. Exactly one of three states: a
/// leading `"use public"` statement, a leading `"use interactive"`
/// statement, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileDirective {
    #[default]
    None,
    Public,
    Interactive,
}

impl FileDirective {
    pub fn as_directive_str(self) -> Option<&'static str> {
        match self {
            FileDirective::None => None,
            FileDirective::Public => Some("use public"),
            FileDirective::Interactive => Some("use interactive"),
        }
    }

    pub fn from_directive_str(s: &str) -> Option<Self> {
        match s {
            "use public" => Some(FileDirective::Public),
            "use interactive" => Some(FileDirective::Interactive),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn normalizes_with_forward_slashes() {
        let root = PathBuf::from("/proj");
        let file = PathBuf::from("/proj/src/widgets/button.tsx");
        let key = SiteKey::from_root(&root, &file, "Table");
        assert_eq!(key.as_str(), "src/widgets/button.tsx:Table");
        assert_eq!(key.file_part(), "src/widgets/button.tsx");
        assert_eq!(key.binding_part(), "Table");
    }

    #[test]
    fn directive_round_trips() {
        assert_eq!(
            FileDirective::from_directive_str("use public"),
            Some(FileDirective::Public)
        );
        assert_eq!(FileDirective::Public.as_directive_str(), Some("use public"));
        assert_eq!(FileDirective::from_directive_str("use banana"), None);
    }
}
