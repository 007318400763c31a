use crate::engine::errors::EngineError;
use crate::engine::lang::TreeLanguage;
use ast_grep_language::LanguageExt;
use std::path::Path;
use tree_sitter::{Parser, Tree};

/// Tree-sitter parser bound to one [`TreeLanguage`].
pub struct SourceParser {
    parser: Parser,
    language: TreeLanguage,
}

impl SourceParser {
    pub fn new(language: TreeLanguage) -> Result<Self, EngineError> {
        let mut parser = Parser::new();
        let ts_lang = language.support_lang().get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| EngineError::LanguageSet {
                language: language.to_string(),
            })?;

        Ok(Self { parser, language })
    }

    pub fn language(&self) -> TreeLanguage {
        self.language
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        path: &Path,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, EngineError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| EngineError::ParseFailed {
                path: path.to_path_buf(),
            })?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    pub fn root_node(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    pub fn node_text(&self, node: tree_sitter::Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }
}
