use crate::edit::Edit;
use crate::engine::{ApplyStatus, WorkingCopy};
use crate::program::{Program, ProgramError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered sequence of edits. Later edits see the effect of earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    edits: Vec<Edit>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    /// Remove and return the edit at `index`, if any.
    pub fn remove(&mut self, index: usize) -> Option<Edit> {
        (index < self.edits.len()).then(|| self.edits.remove(index))
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Edit> {
        self.edits.iter()
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Apply every edit in order, returning one status per edit.
    ///
    /// Stops at the first error; conflicts do not stop the sequence.
    pub fn apply(
        &self,
        program: &Program,
        working: &mut WorkingCopy,
    ) -> Result<Vec<ApplyStatus>, ProgramError> {
        self.edits
            .iter()
            .map(|edit| edit.apply(program, working))
            .collect()
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, edit) in self.edits.iter().enumerate() {
            if idx > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{edit}")?;
        }
        Ok(())
    }
}

impl FromIterator<Edit> for Patch {
    fn from_iter<I: IntoIterator<Item = Edit>>(iter: I) -> Self {
        Self {
            edits: iter.into_iter().collect(),
        }
    }
}

impl Extend<Edit> for Patch {
    fn extend<I: IntoIterator<Item = Edit>>(&mut self, iter: I) {
        self.edits.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.iter()
    }
}
