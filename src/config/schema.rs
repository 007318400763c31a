use crate::engine::Granularity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

/// Project configuration consumed by [`crate::Program`].
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct ProgramConfig {
    /// Files to mutate, relative to the project root, in order
    pub target_files: Vec<PathBuf>,
    /// Shell command run inside the sandbox to evaluate a variant
    pub test_command: String,
    /// Project name used in the sandbox directory name
    #[serde(default)]
    pub name: Option<String>,
    /// Granularity for files without an explicit override
    #[serde(default)]
    pub granularity: Granularity,
    /// Per-file granularity overrides
    #[serde(default)]
    pub engines: BTreeMap<PathBuf, Granularity>,
    /// Test command time budget in seconds
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    /// Root directory for sandboxes (system temp dir when unset)
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
    /// Keep the sandbox on disk after the program is dropped
    #[serde(default)]
    pub keep_sandbox: bool,
}

impl ProgramConfig {
    pub fn new(target_files: Vec<PathBuf>, test_command: impl Into<String>) -> Self {
        Self {
            target_files,
            test_command: test_command.into(),
            ..Self::default()
        }
    }

    /// Granularity assigned to `file`.
    pub fn granularity_for(&self, file: &Path) -> Granularity {
        self.engines.get(file).copied().unwrap_or(self.granularity)
    }

    /// Test command time budget. Validated configs always convert.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.target_files.is_empty() {
            issues.push(ValidationIssue::EmptyTargetList);
        }
        if self.test_command.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                field: "test_command",
            });
        }

        for (idx, file) in self.target_files.iter().enumerate() {
            if file.as_os_str().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    field: "target_files[]",
                });
                continue;
            }
            if !is_contained(file) {
                issues.push(ValidationIssue::InvalidPath {
                    path: file.clone(),
                    message: "target files must be relative and stay inside the project"
                        .to_string(),
                });
            }
            if self.target_files[..idx].contains(file) {
                issues.push(ValidationIssue::InvalidPath {
                    path: file.clone(),
                    message: "listed more than once".to_string(),
                });
            }
        }

        for file in self.engines.keys() {
            if !self.target_files.contains(file) {
                issues.push(ValidationIssue::InvalidPath {
                    path: file.clone(),
                    message: "engine override names a file that is not a target".to_string(),
                });
            }
        }

        if let Some(secs) = self.timeout_secs {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                issues.push(ValidationIssue::InvalidTimeout { secs });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyTargetList,
    MissingField { field: &'static str },
    InvalidPath { path: PathBuf, message: String },
    InvalidTimeout { secs: f64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTargetList => write!(f, "config lists no target files"),
            ValidationIssue::MissingField { field } => {
                write!(f, "config missing required field '{field}'")
            }
            ValidationIssue::InvalidPath { path, message } => {
                write!(f, "invalid target '{}': {message}", path.display())
            }
            ValidationIssue::InvalidTimeout { secs } => {
                write!(f, "timeout_secs must be a positive number of seconds, got {secs}")
            }
        }
    }
}
