use crate::fixtures::{config, load, triangle, triangle_project, write_script};
use gipatch::{
    Edit, Granularity, Location, ParseError, Patch, Program, StatusCode, TestSummaryFitness,
};
use std::time::Duration;
use tempfile::TempDir;

fn with_command(project: &TempDir, tmp: &TempDir, command: &str) -> Program {
    let mut cfg = config(tmp, Granularity::Line);
    cfg.test_command = command.to_string();
    Program::new(project.path(), cfg).unwrap()
}

#[test]
#[cfg(unix)]
fn empty_patch_is_normal_with_zero_failures() {
    for granularity in [Granularity::Line, Granularity::Tree] {
        let project = triangle_project();
        let tmp = TempDir::new().unwrap();
        let program = load(&project, &tmp, granularity);

        let result = program
            .evaluate_patch(&Patch::new(), &TestSummaryFitness)
            .unwrap();
        assert_eq!(result, (StatusCode::Normal, Some(0)));
    }
}

#[test]
#[cfg(unix)]
fn missing_runtime_marker_is_parse_error() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = with_command(&project, &tmp, "echo all good");

    let result = program
        .evaluate_patch(&Patch::new(), &TestSummaryFitness)
        .unwrap();
    assert_eq!(result, (StatusCode::ParseError, None));
}

#[test]
#[cfg(unix)]
fn failure_count_is_reported() {
    let project = triangle_project();
    write_script(
        project.path(),
        "run.sh",
        "#!/bin/sh\necho \"2 failed, 2 passed\"\necho \"runtime: 0.30\"\nexit 1\n",
    );
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);

    let result = program
        .evaluate_patch(&Patch::new(), &TestSummaryFitness)
        .unwrap();
    assert_eq!(result, (StatusCode::Normal, Some(2)));
}

#[test]
#[cfg(unix)]
fn slow_command_times_out() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let mut cfg = config(&tmp, Granularity::Line);
    cfg.test_command = "sleep 10; echo runtime: 10".to_string();
    cfg.timeout_secs = Some(0.2);
    let program = Program::new(project.path(), cfg).unwrap();

    let started = std::time::Instant::now();
    let result = program
        .evaluate_patch(&Patch::new(), &TestSummaryFitness)
        .unwrap();
    assert_eq!(result, (StatusCode::Timeout, None));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
#[cfg(unix)]
fn evaluation_sees_the_variant() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = with_command(&project, &tmp, "grep -c tmp triangle.py");

    let count_lines = |_: Duration, stdout: &str, _: &str| {
        stdout
            .trim()
            .parse::<usize>()
            .map_err(|e| ParseError::new(e.to_string()))
    };

    let (status, count) = program.evaluate_patch(&Patch::new(), &count_lines).unwrap();
    assert_eq!((status, count), (StatusCode::Normal, Some(4)));

    // drop `tmp = a` (line 3) and `b = tmp` (line 5)
    let patch: Patch = [
        Edit::deletion(Location::new(triangle(), 2)),
        Edit::deletion(Location::new(triangle(), 4)),
    ]
    .into_iter()
    .collect();
    let (status, count) = program.evaluate_patch(&patch, &count_lines).unwrap();
    assert_eq!((status, count), (StatusCode::Normal, Some(2)));

    program.reset().unwrap();
    let (_, count) = program.evaluate_patch(&Patch::new(), &count_lines).unwrap();
    assert_eq!(count, Some(4));
}

#[test]
#[cfg(unix)]
fn conflicting_edits_still_evaluate() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Line);

    let patch: Patch = [
        Edit::deletion(Location::new(triangle(), 3)),
        Edit::deletion(Location::new(triangle(), 3)),
    ]
    .into_iter()
    .collect();
    let report = program.apply(&patch).unwrap();
    assert_eq!(report.conflicts(), 1);

    let result = program.evaluate_patch(&patch, &TestSummaryFitness).unwrap();
    assert_eq!(result, (StatusCode::Normal, Some(0)));
}
