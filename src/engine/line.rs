//! Line granularity: every line of a file is a modification point.

use crate::edit::Direction;
use crate::engine::{
    check_index, ApplyStatus, Engine, EngineError, EngineKind, FileContents, ModificationPoint,
    ParsedFile, Snippet,
};
use log::debug;
use std::path::Path;

/// Lines of a file plus the frozen point mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineContents {
    lines: Vec<String>,
    trailing_newline: bool,
    /// Original point index -> current position in `lines`
    positions: Vec<Option<usize>>,
}

impl LineContents {
    pub fn from_source(source: &str) -> Self {
        let mut lines: Vec<String> = source.split('\n').map(str::to_string).collect();
        let trailing_newline = source.ends_with('\n');
        if trailing_newline || source.is_empty() {
            lines.pop();
        }
        let positions = (0..lines.len()).map(Some).collect();
        Self {
            lines,
            trailing_newline,
            positions,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn point_count(&self) -> usize {
        self.positions.len()
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    fn position(&self, path: &Path, index: usize) -> Result<Option<usize>, EngineError> {
        check_index(path, index, self.positions.len())?;
        Ok(self.positions[index])
    }

    fn shift_from(&mut self, at: usize, up: bool) {
        for pos in self.positions.iter_mut().flatten() {
            if *pos >= at {
                if up {
                    *pos += 1;
                } else {
                    *pos -= 1;
                }
            }
        }
    }
}

/// Engine whose points are the lines of a file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineEngine;

impl LineEngine {
    fn lines<'c>(
        &self,
        path: &Path,
        contents: &'c FileContents,
    ) -> Result<&'c LineContents, EngineError> {
        match contents {
            FileContents::Lines(lines) => Ok(lines),
            other => Err(other.mismatch(path, self.kind())),
        }
    }

    fn lines_mut<'c>(
        &self,
        path: &Path,
        contents: &'c mut FileContents,
    ) -> Result<&'c mut LineContents, EngineError> {
        match contents {
            FileContents::Lines(lines) => Ok(lines),
            other => Err(other.mismatch(path, self.kind())),
        }
    }
}

impl Engine for LineEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Line
    }

    fn parse(&self, _path: &Path, source: &str) -> Result<ParsedFile, EngineError> {
        let contents = LineContents::from_source(source);
        let points = (0..contents.lines.len())
            .map(|index| ModificationPoint {
                index,
                kind: "line".to_string(),
                line: index + 1,
            })
            .collect();
        Ok(ParsedFile {
            contents: FileContents::Lines(contents),
            points,
        })
    }

    fn dump(&self, path: &Path, contents: &FileContents) -> Result<String, EngineError> {
        Ok(self.lines(path, contents)?.render())
    }

    fn snippet(
        &self,
        path: &Path,
        contents: &FileContents,
        index: usize,
    ) -> Result<Option<Snippet>, EngineError> {
        let lines = self.lines(path, contents)?;
        Ok(lines.position(path, index)?.map(|pos| Snippet {
            text: lines.lines[pos].clone(),
            indent: String::new(),
        }))
    }

    fn encloses(
        &self,
        path: &Path,
        contents: &FileContents,
        outer: usize,
        inner: usize,
    ) -> Result<bool, EngineError> {
        let lines = self.lines(path, contents)?;
        check_index(path, outer, lines.point_count())?;
        check_index(path, inner, lines.point_count())?;
        Ok(outer == inner)
    }

    fn replace_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
        snippet: &Snippet,
    ) -> Result<ApplyStatus, EngineError> {
        let lines = self.lines_mut(path, contents)?;
        let Some(pos) = lines.position(path, index)? else {
            return Ok(deleted(path, index));
        };
        debug!("{}: replace line point {index}", path.display());
        lines.lines[pos] = snippet.text.clone();
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
        let lines = self.lines_mut(path, contents)?;
        let Some(pos) = lines.position(path, index)? else {
            return Ok(deleted(path, index));
        };
        let at = match direction {
            Direction::Before => pos,
            Direction::After => pos + 1,
        };
        debug!("{}: insert line {direction} point {index}", path.display());
        lines.shift_from(at, true);
        lines.lines.insert(at, snippet.text.clone());
        Ok(ApplyStatus::Applied)
    }

    fn delete_point(
        &self,
        path: &Path,
        contents: &mut FileContents,
        index: usize,
    ) -> Result<ApplyStatus, EngineError> {
        let lines = self.lines_mut(path, contents)?;
        let Some(pos) = lines.position(path, index)? else {
            return Ok(deleted(path, index));
        };
        debug!("{}: delete line point {index}", path.display());
        lines.lines.remove(pos);
        lines.positions[index] = None;
        lines.shift_from(pos + 1, false);
        Ok(ApplyStatus::Applied)
    }
}

fn deleted(path: &Path, index: usize) -> ApplyStatus {
    ApplyStatus::conflict(format!(
        "line point {index} of {} was already deleted",
        path.display()
    ))
}
