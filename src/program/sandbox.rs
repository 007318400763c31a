//! Isolated on-disk copy of a project.
//!
//! Every [`crate::Program`] owns one sandbox. Variants are materialized into
//! it and the test command runs inside it, so the original project is never
//! written to.

use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

static SANDBOX_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk project tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("project directory does not exist: {0}")]
    MissingProject(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SandboxError + '_ {
    move |source| SandboxError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Result of writing one file into the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { file: PathBuf, bytes: usize },
    /// Sandbox copy already had exactly this content
    Unchanged { file: PathBuf },
}

#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    keep: bool,
}

impl Sandbox {
    /// Copy `project` into `<tmp_root>/<name>_<suffix>`.
    pub fn create(
        project: &Path,
        tmp_root: &Path,
        name: &str,
        keep: bool,
    ) -> Result<Self, SandboxError> {
        if !project.is_dir() {
            return Err(SandboxError::MissingProject(project.to_path_buf()));
        }
        fs::create_dir_all(tmp_root).map_err(io_err(tmp_root))?;
        let root = tmp_root.join(sandbox_dir_name(name));
        fs::create_dir_all(&root).map_err(io_err(&root))?;

        // Skip our own output when tmp_root lives inside the project
        let tmp_root = tmp_root.canonicalize().map_err(io_err(tmp_root))?;
        let sandbox = Self { root, keep };
        sandbox.copy_project(project, &tmp_root)?;
        info!(
            "created sandbox {} from {}",
            sandbox.root.display(),
            project.display()
        );
        Ok(sandbox)
    }

    fn copy_project(&self, project: &Path, tmp_root: &Path) -> Result<(), SandboxError> {
        let walker = WalkDir::new(project).min_depth(1).into_iter();
        for entry in walker.filter_entry(|e| !is_skipped(e.path(), tmp_root)) {
            let entry = entry?;
            let Ok(relative) = entry.path().strip_prefix(project) else {
                continue;
            };
            let dest = self.root.join(relative);
            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs::create_dir_all(&dest).map_err(io_err(&dest))?;
            } else if file_type.is_file() {
                fs::copy(entry.path(), &dest).map_err(io_err(entry.path()))?;
            } else if file_type.is_symlink() {
                self.copy_link(project, entry.path(), &dest)?;
            } else {
                warn!("not copying special file {}", entry.path().display());
            }
        }
        Ok(())
    }

    /// Recreate a symlink. Absolute targets inside the project are rebased
    /// onto the sandbox; anything else is kept as written.
    #[cfg(unix)]
    fn copy_link(&self, project: &Path, link: &Path, dest: &Path) -> Result<(), SandboxError> {
        let target = fs::read_link(link).map_err(io_err(link))?;
        let target = match target.strip_prefix(project) {
            Ok(inside) if target.is_absolute() => self.root.join(inside),
            _ => target,
        };
        debug!("linking {} -> {}", dest.display(), target.display());
        std::os::unix::fs::symlink(&target, dest).map_err(io_err(dest))
    }

    /// Without portable symlinks, copy what a file link points at.
    #[cfg(not(unix))]
    fn copy_link(&self, _project: &Path, link: &Path, dest: &Path) -> Result<(), SandboxError> {
        if link.is_file() {
            fs::copy(link, dest).map_err(io_err(link))?;
        } else {
            warn!("not copying link {}", link.display());
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative` inside the sandbox.
    pub fn file_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn read_file(&self, relative: &Path) -> Result<String, SandboxError> {
        let path = self.file_path(relative);
        fs::read_to_string(&path).map_err(io_err(&path))
    }

    /// Write `content` to `relative` unless the sandbox copy already matches.
    pub fn write_file(&self, relative: &Path, content: &str) -> Result<WriteOutcome, SandboxError> {
        let path = self.file_path(relative);
        if let Ok(existing) = fs::read(&path) {
            if xxh3_64(&existing) == xxh3_64(content.as_bytes()) {
                return Ok(WriteOutcome::Unchanged {
                    file: relative.to_path_buf(),
                });
            }
        }

        atomic_write(&path, content.as_bytes())?;

        // Bump mtime so incremental build tools notice the change
        let now = filetime::FileTime::now();
        filetime::set_file_mtime(&path, now).map_err(io_err(&path))?;

        debug!("wrote {} ({} bytes)", path.display(), content.len());
        Ok(WriteOutcome::Written {
            file: relative.to_path_buf(),
            bytes: content.len(),
        })
    }

    /// Keep the sandbox on disk when dropped.
    pub fn persist(&mut self) {
        self.keep = true;
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.root) {
            warn!("failed to remove sandbox {}: {err}", self.root.display());
        }
    }
}

/// `<name>_<pid>_<counter>_<millis>`
fn sandbox_dir_name(name: &str) -> String {
    let counter = SANDBOX_COUNTER.fetch_add(1, Ordering::Relaxed);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{name}_{}_{counter}_{millis}", std::process::id())
}

fn is_skipped(path: &Path, tmp_root: &Path) -> bool {
    if path.file_name().is_some_and(|name| name == ".git") {
        return true;
    }
    path.canonicalize()
        .map(|canonical| canonical == tmp_root)
        .unwrap_or(false)
}

/// Atomic file write: tempfile + fsync + rename.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), SandboxError> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = path.parent().ok_or_else(|| SandboxError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ),
    })?;
    fs::create_dir_all(parent).map_err(io_err(parent))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err(parent))?;
    temp.write_all(content).map_err(io_err(path))?;
    temp.as_file().sync_all().map_err(io_err(path))?;

    // Keep the executable bit of scripts we overwrite
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(temp.path(), meta.permissions()).map_err(io_err(path))?;
    }

    temp.persist(path).map_err(|e| SandboxError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
