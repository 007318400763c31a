//! Tree grammars via ast-grep-language.
//!
//! We use the grammars bundled with `ast-grep-language` instead of depending
//! on individual `tree-sitter-*` crates, which keeps the tree-sitter version
//! pinned to the one ast-grep was built against.

use ast_grep_language::SupportLang;
use std::fmt;
use std::path::Path;

/// Languages the tree engine can decompose into statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeLanguage {
    Python,
    Rust,
    JavaScript,
    Java,
    C,
}

impl TreeLanguage {
    pub const ALL: [TreeLanguage; 5] = [
        TreeLanguage::Python,
        TreeLanguage::Rust,
        TreeLanguage::JavaScript,
        TreeLanguage::Java,
        TreeLanguage::C,
    ];

    /// Pick a grammar from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext {
            "py" | "pyi" => Some(TreeLanguage::Python),
            "rs" => Some(TreeLanguage::Rust),
            "js" | "mjs" | "cjs" => Some(TreeLanguage::JavaScript),
            "java" => Some(TreeLanguage::Java),
            "c" | "h" => Some(TreeLanguage::C),
            _ => None,
        }
    }

    pub fn support_lang(self) -> SupportLang {
        match self {
            TreeLanguage::Python => SupportLang::Python,
            TreeLanguage::Rust => SupportLang::Rust,
            TreeLanguage::JavaScript => SupportLang::JavaScript,
            TreeLanguage::Java => SupportLang::Java,
            TreeLanguage::C => SupportLang::C,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TreeLanguage::Python => "python",
            TreeLanguage::Rust => "rust",
            TreeLanguage::JavaScript => "javascript",
            TreeLanguage::Java => "java",
            TreeLanguage::C => "c",
        }
    }

    /// Node kinds whose named children are statements.
    pub fn statement_containers(self) -> &'static [&'static str] {
        match self {
            TreeLanguage::Python => &["module", "block"],
            TreeLanguage::Rust => &["source_file", "block", "declaration_list"],
            TreeLanguage::JavaScript => &["program", "statement_block"],
            TreeLanguage::Java => &["program", "block", "class_body", "constructor_body"],
            TreeLanguage::C => &["translation_unit", "compound_statement"],
        }
    }

    /// Statement left behind when the last statement of a block is deleted.
    pub fn empty_block_placeholder(self) -> Option<&'static str> {
        match self {
            TreeLanguage::Python => Some("pass"),
            _ => None,
        }
    }

    /// Whether a named child of a container counts as a statement.
    pub fn is_statement_kind(self, kind: &str) -> bool {
        !kind.contains("comment")
    }
}

impl fmt::Display for TreeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
