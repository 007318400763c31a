//! Statement granularity backed by tree-sitter.
//!
//! A file is split into layout text and statement nodes. Every named child of
//! a statement container (module, block, ...) is a modification point. Each
//! point owns the pieces of source it spans, with nested statements kept as
//! references, so concatenating the pieces reproduces the file byte for byte.
//!
//! Copied code (insertions, replacements) is stored as opaque text that is
//! re-indented to the target's indentation. It is never addressable: indices
//! keep referring to the statements found by [`Engine::parse`].

use crate::edit::Direction;
use crate::engine::parser::{ParsedSource, SourceParser};
use crate::engine::{
    check_index, line_of, ApplyStatus, Engine, EngineError, EngineKind, FileContents,
    ModificationPoint, ParsedFile, Snippet, TreeLanguage,
};
use crate::pool::with_parser;
use log::{debug, warn};
use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    /// Original layout text between and around statements
    Text(String),
    /// Original statement, by point index
    Stmt(usize),
    /// Code placed by an edit, tagged with the block it belongs to
    Code { text: String, block: usize },
}

#[derive(Debug, Clone)]
struct StmtNode {
    kind: String,
    line: usize,
    indent: String,
    /// tree-sitter id of the container node this statement sits in
    block: usize,
    /// Nearest enclosing statement
    parent: Option<usize>,
    pieces: Vec<Piece>,
    attached: bool,
}

/// Statement tree of one file plus the frozen point mapping.
#[derive(Debug, Clone)]
pub struct TreeContents {
    language: TreeLanguage,
    nodes: Vec<StmtNode>,
    root: Vec<Piece>,
}

struct RawPoint {
    kind: String,
    span: Range<usize>,
    block: usize,
}

impl TreeContents {
    pub fn language(&self) -> TreeLanguage {
        self.language
    }

    pub fn point_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_pieces(&self.root, &mut out);
        out
    }

    fn build(parser: &mut SourceParser, path: &Path, source: &str) -> Result<Self, EngineError> {
        let language = parser.language();
        let parsed = parser.parse_with_source(path, source)?;
        if parsed.has_errors() {
            warn!(
                "{} has syntax errors; statement points may be incomplete",
                path.display()
            );
        }

        let mut raw = Vec::new();
        collect_points(parsed.root_node(), &parsed, language, &mut raw);

        // Preorder: the enclosing statement is the nearest open span
        let mut parents = Vec::with_capacity(raw.len());
        let mut open: Vec<usize> = Vec::new();
        for (idx, point) in raw.iter().enumerate() {
            while let Some(&top) = open.last() {
                if raw[top].span.end <= point.span.start {
                    open.pop();
                } else {
                    break;
                }
            }
            parents.push(open.last().copied());
            open.push(idx);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); raw.len()];
        let mut top_level = Vec::new();
        for (idx, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(idx),
                None => top_level.push(idx),
            }
        }

        let nodes = raw
            .iter()
            .enumerate()
            .map(|(idx, point)| StmtNode {
                kind: point.kind.clone(),
                line: line_of(source, point.span.start),
                indent: indent_at(source, point.span.start),
                block: point.block,
                parent: parents[idx],
                pieces: layout(source, point.span.clone(), &children[idx], &raw),
                attached: true,
            })
            .collect();
        let root = layout(source, 0..source.len(), &top_level, &raw);

        Ok(Self {
            language,
            nodes,
            root,
        })
    }

    fn render_pieces(&self, pieces: &[Piece], out: &mut String) {
        for piece in pieces {
            match piece {
                Piece::Text(text) | Piece::Code { text, .. } => out.push_str(text),
                Piece::Stmt(idx) => self.render_pieces(&self.nodes[*idx].pieces, out),
            }
        }
    }

    fn is_descendant(&self, node: usize, ancestor: usize) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            current = self.nodes[idx].parent;
        }
        false
    }

    fn detach_descendants(&mut self, ancestor: usize) {
        for idx in ancestor + 1..self.nodes.len() {
            if self.is_descendant(idx, ancestor) {
                self.nodes[idx].attached = false;
            }
        }
    }

    fn container_mut(&mut self, idx: usize) -> &mut Vec<Piece> {
        match self.nodes[idx].parent {
            Some(parent) => &mut self.nodes[parent].pieces,
            None => &mut self.root,
        }
    }

    fn slot(&mut self, idx: usize) -> Option<usize> {
        self.container_mut(idx)
            .iter()
            .position(|piece| matches!(piece, Piece::Stmt(j) if *j == idx))
    }

    fn replace(&mut self, idx: usize, snippet: &Snippet) {
        let text = snippet.reindented(&self.nodes[idx].indent);
        let block = self.nodes[idx].block;
        self.detach_descendants(idx);
        self.nodes[idx].pieces = vec![Piece::Code { text, block }];
    }

    fn insert(&mut self, idx: usize, slot: usize, snippet: &Snippet, direction: Direction) {
        let node = &self.nodes[idx];
        let code = Piece::Code {
            text: snippet.reindented(&node.indent),
            block: node.block,
        };
        let separator = Piece::Text(format!("\n{}", node.indent));
        let container = self.container_mut(idx);
        match direction {
            Direction::Before => {
                container.splice(slot..slot, [code, separator]);
            }
            Direction::After => {
                container.splice(slot + 1..slot + 1, [separator, code]);
            }
        }
    }

    fn delete(&mut self, idx: usize, slot: usize) {
        let block = self.nodes[idx].block;
        let placeholder = self.language.empty_block_placeholder();
        let occupied = {
            let nodes = &self.nodes;
            let container = match nodes[idx].parent {
                Some(parent) => &nodes[parent].pieces,
                None => &self.root,
            };
            container.iter().any(|piece| match piece {
                Piece::Stmt(j) => *j != idx && nodes[*j].block == block,
                Piece::Code { block: b, .. } => *b == block,
                Piece::Text(_) => false,
            })
        };

        let container = self.container_mut(idx);
        match placeholder {
            Some(text) if !occupied => {
                container[slot] = Piece::Code {
                    text: text.to_string(),
                    block,
                };
            }
            _ => {
                container.remove(slot);
                let ends_line = match container.get(slot) {
                    Some(Piece::Text(next)) => next
                        .trim_start_matches(|c| c == ' ' || c == '\t')
                        .starts_with(|c| c == '\n' || c == '\r'),
                    Some(_) => false,
                    None => true,
                };
                if ends_line {
                    if slot > 0 {
                        if let Piece::Text(prev) = &mut container[slot - 1] {
                            trim_before(prev);
                        }
                    }
                } else if let Some(Piece::Text(next)) = container.get_mut(slot) {
                    trim_after(next);
                }
            }
        }

        self.nodes[idx].attached = false;
        self.detach_descendants(idx);
    }
}

fn collect_points(
    node: tree_sitter::Node<'_>,
    parsed: &ParsedSource<'_>,
    language: TreeLanguage,
    out: &mut Vec<RawPoint>,
) {
    let is_container = language.statement_containers().contains(&node.kind());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if is_container
            && child.is_named()
            && !child.is_error()
            && !child.is_missing()
            && child.start_byte() < child.end_byte()
            && language.is_statement_kind(child.kind())
        {
            // Some grammars end a statement after its newline
            let start = child.start_byte();
            let end = start + parsed.node_text(child).trim_end().len();
            out.push(RawPoint {
                kind: child.kind().to_string(),
                span: start..end,
                block: node.id(),
            });
        }
        collect_points(child, parsed, language, out);
    }
}

fn layout(source: &str, span: Range<usize>, children: &[usize], raw: &[RawPoint]) -> Vec<Piece> {
    let mut pieces = Vec::with_capacity(children.len() * 2 + 1);
    let mut cursor = span.start;
    for &child in children {
        let child_span = &raw[child].span;
        if child_span.start > cursor {
            pieces.push(Piece::Text(source[cursor..child_span.start].to_string()));
        }
        pieces.push(Piece::Stmt(child));
        cursor = cursor.max(child_span.end);
    }
    if span.end > cursor {
        pieces.push(Piece::Text(source[cursor..span.end].to_string()));
    }
    pieces
}

/// Leading whitespace of the line containing `offset`.
fn indent_at(source: &str, offset: usize) -> String {
    let line_start = source[..offset].rfind('\n').map_or(0, |nl| nl + 1);
    source[line_start..offset]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

fn is_separator(c: char) -> bool {
    c == ';' || c == ','
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Layout before a statement that ended its line: drop a trailing
/// `\n<whitespace>` so no blank line is left, or the `;` joining it to the
/// previous statement on the same line.
fn trim_before(text: &mut String) {
    if let Some(nl) = text.rfind('\n') {
        if text[nl + 1..].chars().all(char::is_whitespace) {
            text.truncate(nl);
            return;
        }
    }
    let kept = text.trim_end_matches(is_blank);
    let kept = kept.strip_suffix(is_separator).unwrap_or(kept);
    let len = kept.trim_end_matches(is_blank).len();
    text.truncate(len);
}

/// Layout after a statement that shared its line with the next one.
fn trim_after(text: &mut String) {
    let rest = text.trim_start_matches(is_blank);
    let rest = rest.strip_prefix(is_separator).unwrap_or(rest);
    *text = rest.trim_start_matches(is_blank).to_string();
}

/// Engine whose points are statement-level syntax nodes.
#[derive(Debug, Clone, Copy)]
pub struct TreeEngine {
    language: TreeLanguage,
}

impl TreeEngine {
    pub fn new(language: TreeLanguage) -> Self {
        Self { language }
    }

    pub fn language(&self) -> TreeLanguage {
        self.language
    }

    fn tree<'c>(
        &self,
        path: &Path,
        contents: &'c FileContents,
    ) -> Result<&'c TreeContents, EngineError> {
        match contents {
            FileContents::Tree(tree) if tree.language == self.language => Ok(tree),
            other => Err(other.mismatch(path, self.kind())),
        }
    }

    fn tree_mut<'c>(
        &self,
        path: &Path,
        contents: &'c mut FileContents,
    ) -> Result<&'c mut TreeContents, EngineError> {
        if !matches!(contents, FileContents::Tree(tree) if tree.language == self.language) {
            return Err(contents.mismatch(path, self.kind()));
        }
        match contents {
            FileContents::Tree(tree) => Ok(tree),
            other => Err(other.mismatch(path, self.kind())),
        }
    }

    /// Bounds check plus the slot of an attached statement in its container.
    fn locate(
        &self,
        path: &Path,
        tree: &mut TreeContents,
        index: usize,
    ) -> Result<Result<usize, ApplyStatus>, EngineError> {
        check_index(path, index, tree.nodes.len())?;
        if !tree.nodes[index].attached {
            return Ok(Err(ApplyStatus::conflict(format!(
                "statement {index} of {} no longer exists",
                path.display()
            ))));
        }
        Ok(tree.slot(index).ok_or_else(|| {
            ApplyStatus::conflict(format!(
                "statement {index} of {} is not in its block",
                path.display()
            ))
        }))
    }
}

impl Engine for TreeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Tree(self.language)
    }

    fn parse(&self, path: &Path, source: &str) -> Result<ParsedFile, EngineError> {
        let tree = with_parser(self.language, |parser| {
            TreeContents::build(parser, path, source)
        })??;
        let points = tree
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| ModificationPoint {
                index,
                kind: node.kind.clone(),
                line: node.line,
            })
            .collect();
        debug!(
            "{}: {} {} statements",
            path.display(),
            tree.nodes.len(),
            self.language
        );
        Ok(ParsedFile {
            contents: FileContents::Tree(tree),
            points,
        })
    }

    fn dump(&self, path: &Path, contents: &FileContents) -> Result<String, EngineError> {
        Ok(self.tree(path, contents)?.render())
    }

    fn snippet(
        &self,
        path: &Path,
        contents: &FileContents,
        index: usize,
    ) -> Result<Option<Snippet>, EngineError> {
        let tree = self.tree(path, contents)?;
        check_index(path, index, tree.nodes.len())?;
        let node = &tree.nodes[index];
        if !node.attached {
            return Ok(None);
        }
        let mut text = String::new();
        tree.render_pieces(&node.pieces, &mut text);
        Ok(Some(Snippet {
            text,
            indent: node.indent.clone(),
        }))
    }

    fn encloses(
        &self,
        path: &Path,
        contents: &FileContents,
        outer: usize,
        inner: usize,
    ) -> Result<bool, EngineError> {
        let tree = self.tree(path, contents)?;
        check_index(path, outer, tree.nodes.len())?;
        check_index(path, inner, tree.nodes.len())?;
        Ok(outer == inner || tree.is_descendant(inner, outer))
    }

    fn replace_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
        snippet: &Snippet,
    ) -> Result<ApplyStatus, EngineError> {
        let tree = self.tree_mut(path, contents)?;
        if let Err(status) = self.locate(path, tree, index)? {
            return Ok(status);
        }
        debug!("{}: replace statement {index}", path.display());
        tree.replace(index, snippet);
        Ok(ApplyStatus::Applied)
    }

    fn insert_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
        snippet: &Snippet,
        direction: Direction,
    ) -> Result<ApplyStatus, EngineError> {
        let tree = self.tree_mut(path, contents)?;
        let slot = match self.locate(path, tree, index)? {
            Ok(slot) => slot,
            Err(status) => return Ok(status),
        };
        debug!("{}: insert {direction} statement {index}", path.display());
        tree.insert(index, slot, snippet, direction);
        Ok(ApplyStatus::Applied)
    }

    fn delete_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
    ) -> Result<ApplyStatus, EngineError> {
        let tree = self.tree_mut(path, contents)?;
        let slot = match self.locate(path, tree, index)? {
            Ok(slot) => slot,
            Err(status) => return Ok(status),
        };
        debug!("{}: delete statement {index}", path.display());
        tree.delete(index, slot);
        Ok(ApplyStatus::Applied)
    }
}
