//! Thread-local parser pooling.
//!
//! Keeps one reusable tree-sitter parser per language and thread. Parsers
//! are created on first use and reused by every later point discovery.

use crate::engine::{EngineError, SourceParser, TreeLanguage};
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static PARSERS: RefCell<HashMap<TreeLanguage, SourceParser>> = RefCell::new(HashMap::new());
}

/// Execute function with the pooled parser for `language`.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use gipatch::engine::TreeLanguage;
/// use gipatch::pool::with_parser;
/// use std::path::Path;
///
/// let has_errors = with_parser(TreeLanguage::Python, |parser| {
///     parser
///         .parse_with_source(Path::new("a.py"), "x = 1\n")
///         .map(|parsed| parsed.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(language: TreeLanguage, f: F) -> Result<R, EngineError>
where
    F: FnOnce(&mut SourceParser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(language) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(SourceParser::new(language)?)
            }
        };
        Ok(f(parser))
    })
}
