//! Granularity engines.
//!
//! An [`Engine`] decomposes a file into an ordered list of modification points
//! and knows how to rewrite a point-indexed working representation of that
//! file. Two engines ship with the crate:
//!
//! - [`LineEngine`]: every line is a point.
//! - [`TreeEngine`]: every statement-level syntax node is a point, discovered
//!   with tree-sitter.
//!
//! Edits never touch file contents themselves; they hand explicit
//! target/ingredient locations to the engine of the target file.
//!
//! # Index policy
//!
//! Point indices always refer to the numbering produced by [`Engine::parse`].
//! A working representation keeps a frozen mapping from that numbering to the
//! current position of each point, so later edits of a patch address the same
//! points as earlier ones regardless of insertions and deletions. A point that
//! no longer exists (deleted, or swallowed by an enclosing rewrite) makes any
//! edit targeting it report [`ApplyStatus::Conflict`].

pub mod errors;
pub mod lang;
pub mod line;
pub mod parser;
pub mod tree;

pub use errors::EngineError;
pub use lang::TreeLanguage;
pub use line::{LineContents, LineEngine};
pub use parser::{ParsedSource, SourceParser};
pub use tree::{TreeContents, TreeEngine};

use crate::edit::{Direction, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Mutation granularity requested for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Line,
    Tree,
}

/// Identity of an engine. Two files may exchange code only when their engine
/// kinds are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Line,
    Tree(TreeLanguage),
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Line => write!(f, "line"),
            EngineKind::Tree(lang) => write!(f, "tree:{lang}"),
        }
    }
}

/// Build the engine for `path` at the requested granularity.
pub fn engine_for(path: &Path, granularity: Granularity) -> Result<Arc<dyn Engine>, EngineError> {
    match granularity {
        Granularity::Line => Ok(Arc::new(LineEngine)),
        Granularity::Tree => {
            let language =
                TreeLanguage::from_path(path).ok_or_else(|| EngineError::UnsupportedLanguage {
                    path: path.to_path_buf(),
                })?;
            Ok(Arc::new(TreeEngine::new(language)))
        }
    }
}

/// Descriptive metadata for one modification point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModificationPoint {
    pub index: usize,
    /// `line` for the line engine, the syntax node kind for tree engines
    pub kind: String,
    /// 1-based line where the point starts
    pub line: usize,
}

/// Output of [`Engine::parse`].
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub contents: FileContents,
    pub points: Vec<ModificationPoint>,
}

/// Working representation of one file.
#[derive(Debug, Clone)]
pub enum FileContents {
    Lines(LineContents),
    Tree(TreeContents),
}

impl FileContents {
    fn variant_name(&self) -> &'static str {
        match self {
            FileContents::Lines(_) => "line",
            FileContents::Tree(_) => "tree",
        }
    }

    /// Number of points in the original numbering.
    pub fn point_count(&self) -> usize {
        match self {
            FileContents::Lines(lines) => lines.point_count(),
            FileContents::Tree(tree) => tree.point_count(),
        }
    }

    pub(crate) fn mismatch(&self, path: &Path, expected: EngineKind) -> EngineError {
        EngineError::RepresentationMismatch {
            path: path.to_path_buf(),
            expected,
            found: self.variant_name(),
        }
    }
}

/// Per-file working representations threaded through a patch application.
#[derive(Debug, Clone, Default)]
pub struct WorkingCopy {
    files: BTreeMap<PathBuf, FileContents>,
}

impl WorkingCopy {
    pub fn new(files: BTreeMap<PathBuf, FileContents>) -> Self {
        Self { files }
    }

    pub fn file(&self, path: &Path) -> Result<&FileContents, EngineError> {
        self.files.get(path).ok_or_else(|| EngineError::UnknownFile {
            path: path.to_path_buf(),
        })
    }

    pub fn file_mut(&mut self, path: &Path) -> Result<&mut FileContents, EngineError> {
        self.files.get_mut(path).ok_or_else(|| EngineError::UnknownFile {
            path: path.to_path_buf(),
        })
    }

    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &FileContents)> {
        self.files.iter()
    }
}

/// Outcome of one engine primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "ApplyStatus reports structural conflicts"]
pub enum ApplyStatus {
    Applied,
    /// The working copy no longer has the addressed point
    Conflict { reason: String },
}

impl ApplyStatus {
    pub fn conflict(reason: impl Into<String>) -> Self {
        ApplyStatus::Conflict {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyStatus::Applied)
    }
}

/// Text of a point, captured for copying elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    /// Leading whitespace of the line the point started on
    pub indent: String,
}

impl Snippet {
    /// Re-base continuation lines from this snippet's indentation onto `indent`.
    pub fn reindented(&self, indent: &str) -> String {
        if self.indent == indent || !self.text.contains('\n') {
            return self.text.clone();
        }
        let mut out = String::with_capacity(self.text.len());
        for (idx, line) in self.text.split('\n').enumerate() {
            if idx > 0 {
                out.push('\n');
                if let Some(rest) = line.strip_prefix(self.indent.as_str()) {
                    out.push_str(indent);
                    out.push_str(rest);
                    continue;
                }
            }
            out.push_str(line);
        }
        out
    }
}

/// Granularity strategy: point discovery plus the replace/insert/delete
/// primitives over a working representation.
pub trait Engine: fmt::Debug + Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Decompose `source` into a working representation and its ordered
    /// modification points.
    fn parse(&self, path: &Path, source: &str) -> Result<ParsedFile, EngineError>;

    /// Reconstitute text. For an untouched representation this returns exactly
    /// the source given to [`Engine::parse`].
    fn dump(&self, path: &Path, contents: &FileContents) -> Result<String, EngineError>;

    /// Current text of point `index`, or `None` when it no longer exists.
    fn snippet(
        &self,
        path: &Path,
        contents: &FileContents,
        index: usize,
    ) -> Result<Option<Snippet>, EngineError>;

    /// Whether point `inner` lies within point `outer`. A point encloses itself.
    fn encloses(
        &self,
        path: &Path,
        contents: &FileContents,
        outer: usize,
        inner: usize,
    ) -> Result<bool, EngineError>;

    fn replace_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
        snippet: &Snippet,
    ) -> Result<ApplyStatus, EngineError>;

    fn insert_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
        snippet: &Snippet,
        direction: Direction,
    ) -> Result<ApplyStatus, EngineError>;

    fn delete_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
    ) -> Result<ApplyStatus, EngineError>;

    /// Text of point `index`; empty when the point no longer exists.
    fn get_source(
        &self,
        path: &Path,
        contents: &FileContents,
        index: usize,
    ) -> Result<String, EngineError> {
        Ok(self
            .snippet(path, contents, index)?
            .map(|snippet| snippet.text)
            .unwrap_or_default())
    }

    /// Overwrite `target` with the current content of `ingredient`.
    fn do_replace(
        &self,
        working: &mut WorkingCopy,
        target: &Location,
        ingredient: &Location,
    ) -> Result<ApplyStatus, EngineError> {
        let Some(snippet) = read_ingredient(self, working, ingredient)? else {
            return Ok(gone(ingredient));
        };
        let contents = working.file_mut(&target.file)?;
        self.replace_point(&target.file, contents, target.index, &snippet)
    }

    /// Copy the content of `ingredient` next to `target`.
    fn do_insert(
        &self,
        working: &mut WorkingCopy,
        target: &Location,
        ingredient: &Location,
        direction: Direction,
    ) -> Result<ApplyStatus, EngineError> {
        let Some(snippet) = read_ingredient(self, working, ingredient)? else {
            return Ok(gone(ingredient));
        };
        let contents = working.file_mut(&target.file)?;
        self.insert_point(&target.file, contents, target.index, &snippet, direction)
    }

    /// Remove `target`.
    fn do_delete(
        &self,
        working: &mut WorkingCopy,
        target: &Location,
    ) -> Result<ApplyStatus, EngineError> {
        let contents = working.file_mut(&target.file)?;
        self.delete_point(&target.file, contents, target.index)
    }
}

fn read_ingredient<E: Engine + ?Sized>(
    engine: &E,
    working: &WorkingCopy,
    ingredient: &Location,
) -> Result<Option<Snippet>, EngineError> {
    let contents = working.file(&ingredient.file)?;
    engine.snippet(&ingredient.file, contents, ingredient.index)
}

fn gone(location: &Location) -> ApplyStatus {
    ApplyStatus::conflict(format!("ingredient {location} no longer exists"))
}

pub(crate) fn check_index(path: &Path, index: usize, len: usize) -> Result<(), EngineError> {
    if index >= len {
        return Err(EngineError::PointOutOfRange {
            path: path.to_path_buf(),
            index,
            len,
        });
    }
    Ok(())
}

/// 1-based line number of byte `offset` in `source`.
pub(crate) fn line_of(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}
