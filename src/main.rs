use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use gipatch::{
    ApplyStatus, ConfigSource, CreateOptions, Edit, EditKind, Patch, Program, ProgramConfig,
    StatusCode, TestSummaryFitness,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gipatch")]
#[command(about = "Mutate, patch and evaluate programs for genetic improvement", long_about = None)]
#[command(version)]
struct Cli {
    /// Log engine and evaluation details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Config file (JSON or TOML); defaults to .gipatch.json, .pyggi.config or gipatch.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep the sandbox directory after exiting
    #[arg(short, long)]
    keep: bool,
}

impl ProjectArgs {
    fn load(&self) -> Result<Program> {
        let source = match &self.config {
            // relative to the working directory, not the project
            Some(path) => {
                ConfigSource::Path(fs::canonicalize(path).unwrap_or_else(|_| path.clone()))
            }
            None => ConfigSource::Default,
        };
        let mut config: ProgramConfig = source
            .resolve(&self.project)
            .with_context(|| format!("loading config for {}", self.project.display()))?;
        config.keep_sandbox |= self.keep;
        let program = Program::new(&self.project, config)?;
        if self.keep {
            println!("Sandbox: {}", program.tmp_path().display());
        }
        Ok(program)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the modification points of every target file
    Points {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Apply a JSON patch into the sandbox
    Apply {
        #[command(flatten)]
        project: ProjectArgs,

        /// Patch file (JSON list of edits)
        patch: PathBuf,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Run the test command against a patch (the empty patch by default)
    Eval {
        #[command(flatten)]
        project: ProjectArgs,

        /// Patch file (JSON list of edits)
        patch: Option<PathBuf>,
    },

    /// Generate and evaluate random single-edit patches
    Mutate {
        #[command(flatten)]
        project: ProjectArgs,

        /// Number of patches to try
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Random seed
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Points { project } => cmd_points(&project),

        Commands::Apply {
            project,
            patch,
            diff,
        } => cmd_apply(&project, &patch, diff),

        Commands::Eval { project, patch } => cmd_eval(&project, patch.as_deref()),

        Commands::Mutate {
            project,
            count,
            seed,
        } => cmd_mutate(&project, count, seed),
    }
}

fn read_patch(path: &Path) -> Result<Patch> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading patch {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing patch {}", path.display()))
}

/// Helper: Print a unified diff with colored +/- lines
fn display_diff(diff: &str) {
    for line in diff.lines() {
        let line = if line.starts_with("+++") || line.starts_with("---") {
            line.dimmed()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with("@@") {
            line.cyan()
        } else {
            line.normal()
        };
        println!("{line}");
    }
}

fn status_label(status: StatusCode) -> colored::ColoredString {
    let label = status.to_string();
    match status {
        StatusCode::Normal => label.green(),
        StatusCode::ParseError => label.yellow(),
        StatusCode::Timeout | StatusCode::ExecError => label.red(),
    }
}

fn cmd_points(args: &ProjectArgs) -> Result<()> {
    let program = args.load()?;

    for file in program.target_files() {
        let engine = program.engine(file)?;
        let points = program.modification_points(file)?;
        println!(
            "{} ({}, {} points)",
            file.display().to_string().bold(),
            engine.kind(),
            points.len()
        );
        for point in points {
            let source = program.get_source(file, point.index)?;
            let first = source.lines().next().unwrap_or("").trim();
            println!(
                "  {:>4}  {:>5}  {:<24} {}",
                point.index,
                format!("L{}", point.line).dimmed(),
                point.kind.cyan(),
                first
            );
        }
    }
    Ok(())
}

fn cmd_apply(args: &ProjectArgs, patch_file: &Path, show_diff: bool) -> Result<()> {
    let program = args.load()?;
    let patch = read_patch(patch_file)?;

    let report = program.apply(&patch)?;
    for (edit, status) in patch.iter().zip(&report.statuses) {
        match status {
            ApplyStatus::Applied => println!("{} {}", "✓".green(), edit),
            ApplyStatus::Conflict { reason } => {
                println!("{} {}: {}", "⊘".yellow(), edit, reason)
            }
        }
    }

    if show_diff {
        display_diff(&program.diff(&patch)?);
    }

    println!();
    println!("{}", "Summary:".bold());
    println!(
        "  {} applied",
        format!("{}", patch.len() - report.conflicts()).green()
    );
    println!(
        "  {} conflicted",
        format!("{}", report.conflicts()).yellow()
    );
    Ok(())
}

fn cmd_eval(args: &ProjectArgs, patch_file: Option<&Path>) -> Result<()> {
    let program = args.load()?;
    let patch = match patch_file {
        Some(path) => read_patch(path)?,
        None => Patch::new(),
    };

    let (status, failed) = program.evaluate_patch(&patch, &TestSummaryFitness)?;
    match failed {
        Some(failed) => println!("{} failed tests: {}", status_label(status), failed),
        None => println!("{}", status_label(status)),
    }

    if status != StatusCode::Normal {
        // exit skips destructors
        drop(program);
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_mutate(args: &ProjectArgs, count: usize, seed: u64) -> Result<()> {
    let program = args.load()?;
    let mut rng = StdRng::seed_from_u64(seed);
    let options = CreateOptions::default();

    let mut best: Option<(u32, Patch)> = None;
    for trial in 0..count {
        let kind = EditKind::random(&mut rng);
        let edit = Edit::create(kind, &program, &options, &mut rng)?;
        let patch: Patch = std::iter::once(edit).collect();

        let (status, failed) = program.evaluate_patch(&patch, &TestSummaryFitness)?;
        let fitness = failed.map_or_else(|| "-".to_string(), |f| f.to_string());
        println!(
            "{:>4}  {:<12} {:>4}  {}",
            trial,
            status_label(status),
            fitness,
            patch
        );

        if let Some(failed) = failed {
            if best.as_ref().map_or(true, |(current, _)| failed < *current) {
                best = Some((failed, patch));
            }
        }
    }

    println!();
    match best {
        Some((failed, patch)) => {
            println!("{} {} ({} failed)", "Best:".bold(), patch, failed);
            println!("{}", serde_json::to_string(&patch)?);
        }
        None => println!("{}", "No patch produced a fitness value".yellow()),
    }
    Ok(())
}
