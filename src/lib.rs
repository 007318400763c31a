//! gipatch: mutation-based program transformation for genetic improvement
//!
//! Source files are decomposed into ordered modification points (lines, or
//! statement-level syntax nodes) by a granularity [`Engine`]. Edits rewrite
//! points by index, patches sequence edits, and a [`Program`] materializes a
//! patch into a sandboxed copy of the project and scores it by running the
//! project's test command.
//!
//! # Architecture
//!
//! - [`engine`]: the [`Engine`] trait plus the line and tree-sitter engines
//! - [`edit`] / [`patch`]: the four edit operators and ordered patches
//! - [`program`]: target files, point selection, sandbox, evaluation
//! - [`exec`] / [`fitness`]: test command execution and output parsing
//!
//! Edits never mutate the program's original contents. Every application
//! starts from a clone and threads a working copy through the patch.
//!
//! # Example
//!
//! ```no_run
//! use gipatch::{Direction, Edit, Location, Patch, Program, ProgramConfig, TestSummaryFitness};
//! use std::path::PathBuf;
//!
//! let config = ProgramConfig::new(vec![PathBuf::from("triangle.py")], "./run.sh");
//! let program = Program::new("sample/Triangle", config)?;
//!
//! let mut patch = Patch::new();
//! patch.add(Edit::insertion(
//!     Location::new("triangle.py", 1),
//!     Location::new("triangle.py", 10),
//!     Direction::After,
//! ));
//!
//! let (status, failed) = program.evaluate_patch(&patch, &TestSummaryFitness)?;
//! println!("{patch}: {status} {failed:?}");
//! # Ok::<(), gipatch::ProgramError>(())
//! ```

pub mod config;
pub mod edit;
pub mod engine;
pub mod exec;
pub mod fitness;
pub mod patch;
pub mod pool;
pub mod program;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, ConfigSource, ProgramConfig};
pub use edit::{CreateOptions, Direction, Edit, EditKind, Location, SelectionMethod};
pub use engine::{
    ApplyStatus, Engine, EngineError, EngineKind, FileContents, Granularity, LineEngine,
    ModificationPoint, TreeEngine, TreeLanguage, WorkingCopy,
};
pub use exec::{ExecResult, ExecStatus};
pub use fitness::{FitnessFunction, ParseError, StatusCode, TestSummaryFitness};
pub use patch::Patch;
pub use program::{ApplyReport, ModifiedContents, Program, ProgramError};
