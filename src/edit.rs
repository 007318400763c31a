use crate::engine::{ApplyStatus, EngineKind, WorkingCopy};
use crate::program::{Program, ProgramError};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Address of one modification point: `(file, point index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Target file, relative to the project root
    pub file: PathBuf,
    /// Index into the file's modification points
    pub index: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            file: file.into(),
            index,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.index)
    }
}

/// Side of the target an insertion lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Before,
    After,
}

impl Direction {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            Direction::Before
        } else {
            Direction::After
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Before => f.write_str("before"),
            Direction::After => f.write_str("after"),
        }
    }
}

/// How a target point is drawn from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    /// Uniform over all points
    Random,
    /// Proportional to per-point weights (unset weights count as 1.0)
    #[default]
    Weighted,
}

/// The four edit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    Replacement,
    Insertion,
    Deletion,
    Moving,
}

impl EditKind {
    pub const ALL: [EditKind; 4] = [
        EditKind::Replacement,
        EditKind::Insertion,
        EditKind::Deletion,
        EditKind::Moving,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    fn has_ingredient(self) -> bool {
        !matches!(self, EditKind::Deletion)
    }
}

/// Knobs for [`Edit::create`]. Unset fields are drawn at random.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub target_file: Option<PathBuf>,
    pub ingredient_file: Option<PathBuf>,
    pub direction: Option<Direction>,
    pub method: SelectionMethod,
}

impl CreateOptions {
    pub fn target_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.target_file = Some(file.into());
        self
    }

    pub fn ingredient_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.ingredient_file = Some(file.into());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn method(mut self, method: SelectionMethod) -> Self {
        self.method = method;
        self
    }
}

/// A single mutation.
///
/// An edit is a typed envelope over target, ingredient and direction; the
/// engine of the target file performs the actual rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
#[must_use = "Edit does nothing until added to a Patch or applied"]
pub enum Edit {
    /// Overwrite `target` with the content of `ingredient`
    Replacement { target: Location, ingredient: Location },
    /// Copy `ingredient` next to `target`
    Insertion {
        target: Location,
        ingredient: Location,
        direction: Direction,
    },
    /// Remove `target`
    Deletion { target: Location },
    /// Relocate `ingredient` next to `target`
    Moving {
        target: Location,
        ingredient: Location,
        direction: Direction,
    },
}

impl Edit {
    pub fn replacement(target: Location, ingredient: Location) -> Self {
        Edit::Replacement { target, ingredient }
    }

    pub fn insertion(target: Location, ingredient: Location, direction: Direction) -> Self {
        Edit::Insertion {
            target,
            ingredient,
            direction,
        }
    }

    pub fn deletion(target: Location) -> Self {
        Edit::Deletion { target }
    }

    pub fn moving(target: Location, ingredient: Location, direction: Direction) -> Self {
        Edit::Moving {
            target,
            ingredient,
            direction,
        }
    }

    pub fn kind(&self) -> EditKind {
        match self {
            Edit::Replacement { .. } => EditKind::Replacement,
            Edit::Insertion { .. } => EditKind::Insertion,
            Edit::Deletion { .. } => EditKind::Deletion,
            Edit::Moving { .. } => EditKind::Moving,
        }
    }

    pub fn target(&self) -> &Location {
        match self {
            Edit::Replacement { target, .. }
            | Edit::Insertion { target, .. }
            | Edit::Deletion { target }
            | Edit::Moving { target, .. } => target,
        }
    }

    pub fn ingredient(&self) -> Option<&Location> {
        match self {
            Edit::Replacement { ingredient, .. }
            | Edit::Insertion { ingredient, .. }
            | Edit::Moving { ingredient, .. } => Some(ingredient),
            Edit::Deletion { .. } => None,
        }
    }

    /// Draw a random edit of `kind` against `program`.
    ///
    /// Files are resolved first (the ingredient file must share the target
    /// file's engine kind), then the target point is drawn with
    /// `options.method` and the ingredient point uniformly.
    pub fn create<R: Rng + ?Sized>(
        kind: EditKind,
        program: &Program,
        options: &CreateOptions,
        rng: &mut R,
    ) -> Result<Self, ProgramError> {
        let target_file = match &options.target_file {
            Some(file) => file.clone(),
            None => program.random_file(None, rng)?,
        };
        let engine_kind = program.engine(&target_file)?.kind();

        let ingredient_file = if kind.has_ingredient() {
            let file = match &options.ingredient_file {
                Some(file) => file.clone(),
                None => program.random_file(Some(engine_kind), rng)?,
            };
            check_compatible(program, &target_file, &file)?;
            Some(file)
        } else {
            None
        };

        let target = Location::new(
            &target_file,
            program.random_target(&target_file, options.method, rng)?,
        );
        let Some(ingredient_file) = ingredient_file else {
            return Ok(Edit::deletion(target));
        };
        let ingredient = Location::new(
            &ingredient_file,
            program.random_target(&ingredient_file, SelectionMethod::Random, rng)?,
        );
        let direction = options.direction.unwrap_or_else(|| Direction::random(rng));

        Ok(match kind {
            EditKind::Replacement => Edit::replacement(target, ingredient),
            EditKind::Insertion => Edit::insertion(target, ingredient, direction),
            EditKind::Moving => Edit::moving(target, ingredient, direction),
            EditKind::Deletion => Edit::deletion(target),
        })
    }

    /// Apply this edit to `working` through the target file's engine.
    ///
    /// Structural conflicts come back as [`ApplyStatus::Conflict`]; unknown
    /// files, mismatched engines and out-of-range indices are errors.
    pub fn apply(
        &self,
        program: &Program,
        working: &mut WorkingCopy,
    ) -> Result<ApplyStatus, ProgramError> {
        let target = self.target();
        if let Some(ingredient) = self.ingredient() {
            check_compatible(program, &target.file, &ingredient.file)?;
        }
        let engine = program.engine(&target.file)?;
        debug!("applying {self}");

        let status = match self {
            Edit::Replacement { target, ingredient } => {
                engine.do_replace(working, target, ingredient)?
            }
            Edit::Insertion {
                target,
                ingredient,
                direction,
            } => engine.do_insert(working, target, ingredient, *direction)?,
            Edit::Deletion { target } => engine.do_delete(working, target)?,
            Edit::Moving {
                target,
                ingredient,
                direction,
            } => {
                // the copy would land inside the block the delete removes
                if target.file == ingredient.file
                    && engine.encloses(
                        &target.file,
                        working.file(&target.file)?,
                        ingredient.index,
                        target.index,
                    )?
                {
                    return Ok(ApplyStatus::conflict(format!(
                        "cannot move {ingredient} next to {target}, which lies inside it"
                    )));
                }
                // insert a copy, then delete the original ingredient
                match engine.do_insert(working, target, ingredient, *direction)? {
                    ApplyStatus::Applied => engine.do_delete(working, ingredient)?,
                    conflict => conflict,
                }
            }
        };
        Ok(status)
    }
}

fn check_compatible(program: &Program, target: &Path, ingredient: &Path) -> Result<(), ProgramError> {
    let target_kind: EngineKind = program.engine(target)?.kind();
    let ingredient_kind = program.engine(ingredient)?.kind();
    if target_kind != ingredient_kind {
        return Err(ProgramError::EngineMismatch {
            target: target.to_path_buf(),
            target_kind,
            ingredient: ingredient.to_path_buf(),
            ingredient_kind,
        });
    }
    Ok(())
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edit::Replacement { target, ingredient } => {
                write!(f, "Replacement({target}, {ingredient})")
            }
            Edit::Insertion {
                target,
                ingredient,
                direction,
            } => write!(f, "Insertion({target}, {ingredient}, {direction})"),
            Edit::Deletion { target } => write!(f, "Deletion({target})"),
            Edit::Moving {
                target,
                ingredient,
                direction,
            } => write!(f, "Moving({target}, {ingredient}, {direction})"),
        }
    }
}
