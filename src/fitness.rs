//! Fitness parsing of test-command output.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// Overall outcome of one [`crate::Program::evaluate_patch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Test command ran and the fitness parser accepted its output
    Normal,
    /// Fitness parser rejected the output
    ParseError,
    /// Test command exceeded its time budget
    Timeout,
    /// Test command could not be spawned or waited on
    ExecError,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Normal => "NORMAL",
            StatusCode::ParseError => "PARSE_ERROR",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::ExecError => "EXEC_ERROR",
        };
        f.write_str(name)
    }
}

/// Test output carried no recognizable fitness marker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse fitness: {reason}")]
pub struct ParseError {
    pub reason: String,
}

impl ParseError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Maps `(elapsed, stdout, stderr)` of a test run to a fitness value.
///
/// Any `Fn(Duration, &str, &str) -> Result<T, ParseError>` closure is a
/// fitness function.
pub trait FitnessFunction {
    type Output;

    fn evaluate(
        &self,
        elapsed: Duration,
        stdout: &str,
        stderr: &str,
    ) -> Result<Self::Output, ParseError>;
}

impl<F, T> FitnessFunction for F
where
    F: Fn(Duration, &str, &str) -> Result<T, ParseError>,
{
    type Output = T;

    fn evaluate(&self, elapsed: Duration, stdout: &str, stderr: &str) -> Result<T, ParseError> {
        self(elapsed, stdout, stderr)
    }
}

static RUNTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"runtime: *([0-9]+(?:\.[0-9]+)?)").unwrap());
static FAILED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([0-9]+) failed").unwrap());

/// Failed-test count read from a `runtime: <secs>` / `<n> failed` summary.
///
/// The `runtime:` line is required; a missing `failed` count means zero
/// failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestSummaryFitness;

impl TestSummaryFitness {
    /// Reported runtime in seconds, when present.
    pub fn runtime(stdout: &str) -> Option<f64> {
        RUNTIME
            .captures(stdout)
            .and_then(|caps| caps[1].parse().ok())
    }
}

impl FitnessFunction for TestSummaryFitness {
    type Output = u32;

    fn evaluate(&self, _elapsed: Duration, stdout: &str, _stderr: &str) -> Result<u32, ParseError> {
        if Self::runtime(stdout).is_none() {
            return Err(ParseError::new("no `runtime:` line in test output"));
        }
        match FAILED.captures(stdout) {
            Some(caps) => caps[1]
                .parse()
                .map_err(|_| ParseError::new(format!("bad failure count `{}`", &caps[1]))),
            None => Ok(0),
        }
    }
}
