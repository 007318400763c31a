use crate::fixtures::{load, sandboxed, triangle, triangle_project, TRIANGLE};
use gipatch::{
    ConfigSource, Edit, EngineKind, Granularity, Location, Patch, Program, ProgramConfig,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn check_program_validity(program: &Program, project: &TempDir) {
    let basename = project.path().canonicalize().unwrap();
    let basename = basename.file_name().unwrap().to_string_lossy();
    assert_eq!(program.name(), basename);
    assert_eq!(program.test_command(), "./run.sh");
    assert_eq!(program.target_files(), &[PathBuf::from("triangle.py")]);
    for file in program.target_files() {
        assert!(program.engine(file).is_ok());
        assert!(!program.modification_points(file).unwrap().is_empty());
    }
    assert!(program.tmp_path().is_dir());
}

#[test]
fn init_from_inline_config() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);

    check_program_validity(&program, &project);
    assert_eq!(program.engine(triangle()).unwrap().kind(), EngineKind::Line);
    assert_eq!(
        program.modification_points(triangle()).unwrap().len(),
        TRIANGLE.lines().count()
    );
}

#[test]
fn init_from_config_file_name() {
    let project = triangle_project();
    let program = Program::new(project.path(), ".pyggi.config").unwrap();
    check_program_validity(&program, &project);
}

#[test]
fn init_from_default_config_file() {
    let project = triangle_project();
    let program = Program::new(project.path(), ConfigSource::Default).unwrap();
    check_program_validity(&program, &project);
}

#[test]
fn file_and_inline_configs_are_equivalent() {
    let project = triangle_project();
    let from_file = Program::new(project.path(), ".pyggi.config").unwrap();
    let inline = Program::new(
        project.path(),
        ProgramConfig::new(vec![PathBuf::from("triangle.py")], "./run.sh"),
    )
    .unwrap();

    assert_eq!(from_file.target_files(), inline.target_files());
    assert_eq!(from_file.test_command(), inline.test_command());
    assert_eq!(
        from_file.modification_points(triangle()).unwrap(),
        inline.modification_points(triangle()).unwrap()
    );
}

#[test]
fn tmp_path_is_named_after_project() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);
    let prefix = tmp.path().join(program.name());
    assert!(program
        .tmp_path()
        .to_string_lossy()
        .starts_with(&*prefix.to_string_lossy()));
}

#[test]
fn sandbox_removed_on_drop() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);
    let path = program.tmp_path().to_path_buf();
    drop(program);
    assert!(!path.exists());
}

#[test]
fn set_weight_is_visible() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let mut program = load(&project, &tmp, Granularity::Line);

    assert!(!program.modification_weights().contains_key(triangle()));
    program.set_weight(triangle(), 1, 0.1).unwrap();
    assert_eq!(program.modification_weights()[triangle()][&1], 0.1);
}

#[test]
fn get_source_is_in_sandboxed_file() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);
    let contents = sandboxed(&program, triangle());

    for point in program.modification_points(triangle()).unwrap() {
        let source = program.get_source(triangle(), point.index).unwrap();
        assert!(contents.contains(&source), "point {}", point.index);
    }
}

#[test]
fn apply_writes_dumped_contents() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);

    let mut patch = Patch::new();
    patch.add(Edit::deletion(Location::new(triangle(), 1)));
    let report = program.apply(&patch).unwrap();
    assert_eq!(report.conflicts(), 0);

    let modified = program.get_modified_contents(&patch).unwrap();
    let expected = program.dump(&modified.working, triangle()).unwrap();
    assert_eq!(sandboxed(&program, triangle()), expected);
    assert!(!expected.contains("if a > b:"));
}

#[test]
fn empty_patch_round_trips() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);

    let modified = program.get_modified_contents(&Patch::new()).unwrap();
    assert_eq!(program.dump(&modified.working, triangle()).unwrap(), TRIANGLE);
}

#[test]
fn exec_cmd_runs_in_sandbox() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);

    let result = program.exec_cmd("echo hello", None);
    assert_eq!(result.stdout.trim(), "hello");
    assert!(result.success());
}
