//! Language inference and grammar lookup
//!
//! Languages are inferred from file extensions with a fixed table. A
//! language may be recognized without having a grammar wired: component
//! formats (vue, svelte, riot, marko) and markup languages are identified
//! for rendering and wildcard handling, but structural queries require a
//! grammar.

use std::path::Path;

/// Canonical language identifiers supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Golang,
    Python,
    Typescript,
    Tsx,
    Javascript,
    Java,
    Kotlin,
    Rust,
    Cpp,
    C,
    Vue,
    Svelte,
    Riot,
    Marko,
    Markdown,
    Html,
    Css,
    Unknown,
}

impl Language {
    /// Infer a language from a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "go" => Self::Golang,
            "py" | "pyi" => Self::Python,
            "ts" | "mts" | "cts" => Self::Typescript,
            "tsx" => Self::Tsx,
            "js" | "jsx" | "mjs" | "cjs" => Self::Javascript,
            "java" => Self::Java,
            "kt" | "kts" => Self::Kotlin,
            "rs" => Self::Rust,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
            "c" | "h" => Self::C,
            "vue" => Self::Vue,
            "svelte" => Self::Svelte,
            "riot" => Self::Riot,
            "marko" => Self::Marko,
            "md" | "markdown" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "css" => Self::Css,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// The canonical identifier string for this language.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Golang => "golang",
            Self::Python => "python",
            Self::Typescript => "typescript",
            Self::Tsx => "tsx",
            Self::Javascript => "javascript",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::Rust => "rust",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::Vue => "vue",
            Self::Svelte => "svelte",
            Self::Riot => "riot",
            Self::Marko => "marko",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Css => "css",
            Self::Unknown => "unknown",
        }
    }

    /// The tag emitted on rendered code fences. Markdown content gets a
    /// bare fence, like unknown files.
    pub fn fence_tag(&self) -> &'static str {
        match self {
            Self::Golang => "go",
            Self::Unknown | Self::Markdown => "",
            other => other.identifier(),
        }
    }

    /// Single-file-component formats, subject to the component-name
    /// wildcard heuristic.
    pub fn is_component(&self) -> bool {
        matches!(self, Self::Vue | Self::Svelte | Self::Riot | Self::Marko)
    }

    /// The tree-sitter grammar for this language, when one is wired.
    pub fn grammar(&self) -> Option<tree_sitter::Language> {
        match self {
            Self::Golang => Some(tree_sitter_go::LANGUAGE.into()),
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Self::Typescript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Self::Javascript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Self::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Self::Kotlin => Some(tree_sitter_kotlin_codanna::language()),
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Self::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Self::C => Some(tree_sitter_c::LANGUAGE.into()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_table() {
        assert_eq!(Language::from_extension("go"), Language::Golang);
        assert_eq!(Language::from_extension("GO"), Language::Golang);
        assert_eq!(Language::from_extension("ts"), Language::Typescript);
        assert_eq!(Language::from_extension("tsx"), Language::Tsx);
        assert_eq!(Language::from_extension("vue"), Language::Vue);
        assert_eq!(Language::from_extension("weird"), Language::Unknown);
    }

    #[test]
    fn path_inference() {
        assert_eq!(Language::from_path(Path::new("a/b/main.go")), Language::Golang);
        assert_eq!(Language::from_path(Path::new("Makefile")), Language::Unknown);
    }

    #[test]
    fn fence_tags() {
        assert_eq!(Language::Golang.fence_tag(), "go");
        assert_eq!(Language::Unknown.fence_tag(), "");
        assert_eq!(Language::Markdown.fence_tag(), "");
        assert_eq!(Language::Python.fence_tag(), "python");
        assert_eq!(Language::Tsx.fence_tag(), "tsx");
    }

    #[test]
    fn component_languages() {
        assert!(Language::Vue.is_component());
        assert!(Language::Svelte.is_component());
        assert!(!Language::Golang.is_component());
    }

    #[test]
    fn grammar_availability() {
        assert!(Language::Golang.grammar().is_some());
        assert!(Language::Rust.grammar().is_some());
        assert!(Language::Vue.grammar().is_none());
        assert!(Language::Unknown.grammar().is_none());
    }
}
