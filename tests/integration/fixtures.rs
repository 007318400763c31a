//! Shared project fixtures.

use gipatch::{Granularity, Program, ProgramConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const TRIANGLE: &str = r#"def classify_triangle(a, b, c):
    if a > b:
        tmp = a
        a = b
        b = tmp
    if a > c:
        tmp = a
        a = c
        c = tmp
    if a + b <= c:
        return "INVALID"
    return "SCALENE"
"#;

pub const TRIANGLE_POINTS: usize = 12;

pub const RUN_SH: &str = "#!/bin/sh\necho \"4 passed\"\necho \"runtime: 0.01\"\n";

pub const PYGGI_CONFIG: &str = r#"{
    "target_files": ["triangle.py"],
    "test_command": "./run.sh"
}
"#;

pub fn triangle() -> &'static Path {
    Path::new("triangle.py")
}

/// A Triangle project with `triangle.py`, an executable `run.sh` and a
/// `.pyggi.config`.
pub fn triangle_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("triangle.py"), TRIANGLE).unwrap();
    fs::write(dir.path().join(".pyggi.config"), PYGGI_CONFIG).unwrap();
    write_script(dir.path(), "run.sh", RUN_SH);
    dir
}

pub fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

pub fn config(tmp: &TempDir, granularity: Granularity) -> ProgramConfig {
    let mut config = ProgramConfig::new(vec![PathBuf::from("triangle.py")], "./run.sh");
    config.granularity = granularity;
    config.tmp_dir = Some(tmp.path().to_path_buf());
    config
}

/// Load the Triangle project at `granularity`, sandboxed under `tmp`.
pub fn load(project: &TempDir, tmp: &TempDir, granularity: Granularity) -> Program {
    Program::new(project.path(), config(tmp, granularity)).unwrap()
}

pub fn sandboxed(program: &Program, file: &Path) -> String {
    fs::read_to_string(program.tmp_path().join(file)).unwrap()
}
