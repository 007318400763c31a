//! A target project under mutation.
//!
//! [`Program`] loads the configured target files, assigns each an engine,
//! records the original modification points and owns the sandbox that
//! variants are written into and tested in.

pub mod sandbox;

pub use sandbox::{Sandbox, SandboxError, WriteOutcome};

use crate::config::{ConfigError, ConfigSource, ProgramConfig};
use crate::edit::SelectionMethod;
use crate::engine::{
    engine_for, ApplyStatus, Engine, EngineError, EngineKind, ModificationPoint, WorkingCopy,
};
use crate::exec::{exec_cmd, ExecResult, ExecStatus};
use crate::fitness::{FitnessFunction, StatusCode};
use crate::patch::Patch;
use log::{debug, info, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use similar::TextDiff;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgramError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "cannot combine {} ({target_kind}) with {} ({ingredient_kind})",
        target.display(),
        ingredient.display()
    )]
    EngineMismatch {
        target: PathBuf,
        target_kind: EngineKind,
        ingredient: PathBuf,
        ingredient_kind: EngineKind,
    },

    #[error("{} is not a target file", path.display())]
    UnknownFile { path: PathBuf },

    #[error("program has no target files")]
    NoTargetFiles,

    #[error("no target file uses the {kind} engine")]
    NoCandidateFile { kind: EngineKind },

    #[error("{} has no modification points", path.display())]
    NoPoints { path: PathBuf },

    #[error("invalid weight {weight} for {}:{index}", path.display())]
    InvalidWeight {
        path: PathBuf,
        index: usize,
        weight: f64,
    },
}

/// Result of [`Program::get_modified_contents`].
#[derive(Debug, Clone)]
pub struct ModifiedContents {
    pub working: WorkingCopy,
    /// One status per edit of the patch, in order
    pub statuses: Vec<ApplyStatus>,
}

impl ModifiedContents {
    pub fn conflicts(&self) -> usize {
        self.statuses.iter().filter(|s| !s.is_applied()).count()
    }
}

/// Result of [`Program::apply`].
#[derive(Debug, Clone)]
#[must_use = "ApplyReport carries per-edit conflicts"]
pub struct ApplyReport {
    pub statuses: Vec<ApplyStatus>,
    pub writes: Vec<WriteOutcome>,
}

impl ApplyReport {
    pub fn conflicts(&self) -> usize {
        self.statuses.iter().filter(|s| !s.is_applied()).count()
    }
}

#[derive(Debug)]
pub struct Program {
    name: String,
    project_path: PathBuf,
    config: ProgramConfig,
    sandbox: Sandbox,
    engines: BTreeMap<PathBuf, Arc<dyn Engine>>,
    originals: BTreeMap<PathBuf, String>,
    contents: WorkingCopy,
    points: BTreeMap<PathBuf, Vec<ModificationPoint>>,
    weights: BTreeMap<PathBuf, BTreeMap<usize, f64>>,
}

impl Program {
    /// Load the project at `project_path` and copy it into a fresh sandbox.
    pub fn new(
        project_path: impl AsRef<Path>,
        config: impl Into<ConfigSource>,
    ) -> Result<Self, ProgramError> {
        let project_path = project_path.as_ref().to_path_buf();
        let config = config.into().resolve(&project_path)?;

        let mut shared: HashMap<EngineKind, Arc<dyn Engine>> = HashMap::new();
        let mut engines = BTreeMap::new();
        let mut originals = BTreeMap::new();
        let mut files = BTreeMap::new();
        let mut points = BTreeMap::new();

        for file in &config.target_files {
            let path = project_path.join(file);
            let source = fs::read_to_string(&path).map_err(|source| ProgramError::Io {
                path: path.clone(),
                source,
            })?;
            let engine = engine_for(file, config.granularity_for(file))?;
            let engine = shared.entry(engine.kind()).or_insert(engine).clone();
            let parsed = engine.parse(file, &source)?;
            debug!(
                "{}: {} points ({})",
                file.display(),
                parsed.points.len(),
                engine.kind()
            );

            engines.insert(file.clone(), engine);
            originals.insert(file.clone(), source);
            files.insert(file.clone(), parsed.contents);
            points.insert(file.clone(), parsed.points);
        }

        let name = config
            .name
            .clone()
            .or_else(|| {
                project_path
                    .canonicalize()
                    .ok()?
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "project".to_string());
        let tmp_root = config
            .tmp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("gipatch"));
        let sandbox = Sandbox::create(&project_path, &tmp_root, &name, config.keep_sandbox)?;

        info!(
            "loaded {} with {} target files",
            name,
            config.target_files.len()
        );
        Ok(Self {
            name,
            project_path,
            config,
            sandbox,
            engines,
            originals,
            contents: WorkingCopy::new(files),
            points,
            weights: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Root of the sandbox copy the test command runs in.
    pub fn tmp_path(&self) -> &Path {
        self.sandbox.path()
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    pub fn target_files(&self) -> &[PathBuf] {
        &self.config.target_files
    }

    pub fn test_command(&self) -> &str {
        &self.config.test_command
    }

    /// Engine assigned to each target file.
    pub fn engines(&self) -> &BTreeMap<PathBuf, Arc<dyn Engine>> {
        &self.engines
    }

    pub fn engine(&self, file: &Path) -> Result<&Arc<dyn Engine>, ProgramError> {
        self.engines.get(file).ok_or_else(|| unknown(file))
    }

    /// Original working representations; never modified after construction.
    pub fn contents(&self) -> &WorkingCopy {
        &self.contents
    }

    pub fn modification_points(&self, file: &Path) -> Result<&[ModificationPoint], ProgramError> {
        self.points
            .get(file)
            .map(Vec::as_slice)
            .ok_or_else(|| unknown(file))
    }

    /// Weights set through [`Program::set_weight`]; unset points weigh 1.0.
    pub fn modification_weights(&self) -> &BTreeMap<PathBuf, BTreeMap<usize, f64>> {
        &self.weights
    }

    pub fn set_weight(&mut self, file: &Path, index: usize, weight: f64) -> Result<(), ProgramError> {
        let len = self.modification_points(file)?.len();
        if index >= len {
            return Err(EngineError::PointOutOfRange {
                path: file.to_path_buf(),
                index,
                len,
            }
            .into());
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(ProgramError::InvalidWeight {
                path: file.to_path_buf(),
                index,
                weight,
            });
        }
        self.weights
            .entry(file.to_path_buf())
            .or_default()
            .insert(index, weight);
        Ok(())
    }

    /// Uniform choice among target files, optionally only those whose engine
    /// has kind `kind`.
    pub fn random_file<R: Rng + ?Sized>(
        &self,
        kind: Option<EngineKind>,
        rng: &mut R,
    ) -> Result<PathBuf, ProgramError> {
        let candidates: Vec<&PathBuf> = self
            .config
            .target_files
            .iter()
            .filter(|file| {
                kind.map_or(true, |kind| {
                    self.engines.get(*file).is_some_and(|e| e.kind() == kind)
                })
            })
            .collect();
        if candidates.is_empty() {
            return Err(match kind {
                Some(kind) => ProgramError::NoCandidateFile { kind },
                None => ProgramError::NoTargetFiles,
            });
        }
        Ok(candidates[rng.gen_range(0..candidates.len())].clone())
    }

    /// Draw a point index of `file`.
    pub fn random_target<R: Rng + ?Sized>(
        &self,
        file: &Path,
        method: SelectionMethod,
        rng: &mut R,
    ) -> Result<usize, ProgramError> {
        let len = self.modification_points(file)?.len();
        if len == 0 {
            return Err(ProgramError::NoPoints {
                path: file.to_path_buf(),
            });
        }
        let weights = match (method, self.weights.get(file)) {
            (SelectionMethod::Weighted, Some(weights)) => weights,
            _ => return Ok(rng.gen_range(0..len)),
        };

        let vector: Vec<f64> = (0..len)
            .map(|idx| weights.get(&idx).copied().unwrap_or(1.0))
            .collect();
        match WeightedIndex::new(&vector) {
            Ok(dist) => Ok(dist.sample(rng)),
            Err(err) => {
                // all weights zero
                debug!("{}: {err}, falling back to uniform", file.display());
                Ok(rng.gen_range(0..len))
            }
        }
    }

    /// Original text of point `index` of `file`.
    pub fn get_source(&self, file: &Path, index: usize) -> Result<String, ProgramError> {
        let engine = self.engine(file)?;
        let contents = self.contents.file(file)?;
        Ok(engine.get_source(file, contents, index)?)
    }

    /// Apply `patch` to a copy of the original contents.
    pub fn get_modified_contents(&self, patch: &Patch) -> Result<ModifiedContents, ProgramError> {
        let mut working = self.contents.clone();
        let statuses = patch.apply(self, &mut working)?;
        for (edit, status) in patch.iter().zip(&statuses) {
            if let ApplyStatus::Conflict { reason } = status {
                warn!("{edit} conflicted: {reason}");
            }
        }
        Ok(ModifiedContents { working, statuses })
    }

    /// Text of `file` in `working`.
    pub fn dump(&self, working: &WorkingCopy, file: &Path) -> Result<String, ProgramError> {
        let engine = self.engine(file)?;
        Ok(engine.dump(file, working.file(file)?)?)
    }

    /// Materialize `patch` into the sandbox.
    pub fn apply(&self, patch: &Patch) -> Result<ApplyReport, ProgramError> {
        let modified = self.get_modified_contents(patch)?;
        let mut writes = Vec::with_capacity(self.config.target_files.len());
        for file in &self.config.target_files {
            let text = self.dump(&modified.working, file)?;
            writes.push(self.sandbox.write_file(file, &text)?);
        }
        Ok(ApplyReport {
            statuses: modified.statuses,
            writes,
        })
    }

    /// Unified diff of the variant produced by `patch` against the originals.
    pub fn diff(&self, patch: &Patch) -> Result<String, ProgramError> {
        let modified = self.get_modified_contents(patch)?;
        let mut out = String::new();
        for file in &self.config.target_files {
            let original = self.original(file)?;
            let variant = self.dump(&modified.working, file)?;
            if original == variant {
                continue;
            }
            let name = file.display().to_string();
            let diff = TextDiff::from_lines(original, variant.as_str());
            out.push_str(
                &diff
                    .unified_diff()
                    .context_radius(3)
                    .header(&format!("a/{name}"), &format!("b/{name}"))
                    .to_string(),
            );
        }
        Ok(out)
    }

    /// Write the original target files back into the sandbox.
    pub fn reset(&self) -> Result<Vec<WriteOutcome>, ProgramError> {
        self.config
            .target_files
            .iter()
            .map(|file| Ok(self.sandbox.write_file(file, self.original(file)?)?))
            .collect()
    }

    /// Run `command` in the sandbox.
    pub fn exec_cmd(&self, command: &str, timeout: Option<Duration>) -> ExecResult {
        exec_cmd(self.sandbox.path(), command, timeout)
    }

    /// Apply `patch`, run the test command and parse its output with
    /// `fitness`.
    ///
    /// Conflicting edits do not stop the evaluation; the variant is tested
    /// with whatever the remaining edits produced.
    pub fn evaluate_patch<F: FitnessFunction>(
        &self,
        patch: &Patch,
        fitness: &F,
    ) -> Result<(StatusCode, Option<F::Output>), ProgramError> {
        let report = self.apply(patch)?;
        if report.conflicts() > 0 {
            warn!(
                "{} of {} edits conflicted in [{patch}]",
                report.conflicts(),
                patch.len()
            );
        }

        let result = self.exec_cmd(&self.config.test_command, self.config.timeout());
        let outcome = match result.status {
            ExecStatus::Timeout { .. } => (StatusCode::Timeout, None),
            ExecStatus::SpawnFailed { ref message } => {
                warn!("test command failed to run: {message}");
                (StatusCode::ExecError, None)
            }
            ExecStatus::Exited { .. } => {
                match fitness.evaluate(result.elapsed, &result.stdout, &result.stderr) {
                    Ok(value) => (StatusCode::Normal, Some(value)),
                    Err(err) => {
                        debug!("{err}");
                        (StatusCode::ParseError, None)
                    }
                }
            }
        };
        info!(
            "[{patch}] -> {} in {:.3}s",
            outcome.0,
            result.elapsed.as_secs_f64()
        );
        Ok(outcome)
    }

    fn original(&self, file: &Path) -> Result<&str, ProgramError> {
        self.originals
            .get(file)
            .map(String::as_str)
            .ok_or_else(|| unknown(file))
    }
}

fn unknown(file: &Path) -> ProgramError {
    ProgramError::UnknownFile {
        path: file.to_path_buf(),
    }
}
