use crate::fixtures::{config, triangle, triangle_project};
use gipatch::{
    CreateOptions, Direction, Edit, EditKind, EngineKind, Granularity, Location, Patch, Program,
    ProgramError, SelectionMethod,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// triangle.py at tree granularity next to a line-granularity notes file.
fn mixed_program(project: &TempDir, tmp: &TempDir) -> Program {
    fs::write(project.path().join("notes.txt"), "alpha\nbeta\ngamma\n").unwrap();
    let mut cfg = config(tmp, Granularity::Tree);
    cfg.target_files.push(PathBuf::from("notes.txt"));
    cfg.engines
        .insert(PathBuf::from("notes.txt"), Granularity::Line);
    Program::new(project.path(), cfg).unwrap()
}

fn notes() -> &'static Path {
    Path::new("notes.txt")
}

#[test]
fn mismatched_engines_rejected_on_apply() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = mixed_program(&project, &tmp);

    let edits = [
        Edit::replacement(Location::new(notes(), 0), Location::new(triangle(), 1)),
        Edit::insertion(
            Location::new(notes(), 0),
            Location::new(triangle(), 1),
            Direction::Before,
        ),
        Edit::moving(
            Location::new(triangle(), 0),
            Location::new(notes(), 1),
            Direction::After,
        ),
    ];
    for edit in edits {
        let patch: Patch = std::iter::once(edit.clone()).collect();
        let err = program.get_modified_contents(&patch).unwrap_err();
        assert!(
            matches!(err, ProgramError::EngineMismatch { .. }),
            "{edit}: {err}"
        );
    }
}

#[test]
fn mismatched_engines_rejected_on_create() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = mixed_program(&project, &tmp);
    let mut rng = StdRng::seed_from_u64(11);

    let options = CreateOptions::default()
        .target_file("notes.txt")
        .ingredient_file("triangle.py");
    for kind in [EditKind::Replacement, EditKind::Insertion, EditKind::Moving] {
        let err = Edit::create(kind, &program, &options, &mut rng).unwrap_err();
        match err {
            ProgramError::EngineMismatch {
                target_kind,
                ingredient_kind,
                ..
            } => {
                assert_eq!(target_kind, EngineKind::Line);
                assert!(matches!(ingredient_kind, EngineKind::Tree(_)));
            }
            other => panic!("expected mismatch, got {other}"),
        }
    }

    // deletion has no ingredient to check
    let edit = Edit::create(EditKind::Deletion, &program, &options, &mut rng).unwrap();
    assert_eq!(edit.target().file, notes());
}

#[test]
fn random_ingredient_shares_engine_kind() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = mixed_program(&project, &tmp);
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..32 {
        let kind = EditKind::random(&mut rng);
        let edit = Edit::create(kind, &program, &CreateOptions::default(), &mut rng).unwrap();
        if let Some(ingredient) = edit.ingredient() {
            assert_eq!(ingredient.file, edit.target().file);
        }
        let points = program.modification_points(&edit.target().file).unwrap();
        assert!(edit.target().index < points.len());
    }
}

#[test]
fn seeded_creation_is_reproducible() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = Program::new(project.path(), config(&tmp, Granularity::Tree)).unwrap();

    let draw = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..8)
            .map(|_| {
                let kind = EditKind::random(&mut rng);
                Edit::create(kind, &program, &CreateOptions::default(), &mut rng).unwrap()
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(draw(42), draw(42));
}

#[test]
fn weighted_target_selection_honours_weights() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let mut program = Program::new(project.path(), config(&tmp, Granularity::Tree)).unwrap();
    let count = program.modification_points(triangle()).unwrap().len();
    for index in 0..count {
        program.set_weight(triangle(), index, 0.0).unwrap();
    }
    program.set_weight(triangle(), 7, 2.5).unwrap();

    let mut rng = StdRng::seed_from_u64(9);
    let options = CreateOptions::default().method(SelectionMethod::Weighted);
    for _ in 0..16 {
        let edit = Edit::create(EditKind::Deletion, &program, &options, &mut rng).unwrap();
        assert_eq!(edit.target().index, 7);
    }

    // uniform selection ignores weights
    let options = CreateOptions::default().method(SelectionMethod::Random);
    let picked: std::collections::BTreeSet<usize> = (0..64)
        .map(|_| {
            Edit::create(EditKind::Deletion, &program, &options, &mut rng)
                .unwrap()
                .target()
                .index
        })
        .collect();
    assert!(picked.len() > 1);
}

#[test]
fn line_move_keeps_line_count() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = Program::new(project.path(), config(&tmp, Granularity::Line)).unwrap();
    let before = program.modification_points(triangle()).unwrap().len();

    let patch: Patch = [Edit::moving(
        Location::new(triangle(), 0),
        Location::new(triangle(), 11),
        Direction::After,
    )]
    .into_iter()
    .collect();
    let modified = program.get_modified_contents(&patch).unwrap();
    assert_eq!(modified.conflicts(), 0);

    let text = program.dump(&modified.working, triangle()).unwrap();
    assert_eq!(text.lines().count(), before);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[1], "    return \"SCALENE\"");
    assert_eq!(lines[before - 1], "        return \"INVALID\"");
}

#[test]
fn patch_serializes_and_reapplies() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = Program::new(project.path(), config(&tmp, Granularity::Tree)).unwrap();

    let patch: Patch = [
        Edit::deletion(Location::new(triangle(), 5)),
        Edit::replacement(Location::new(triangle(), 10), Location::new(triangle(), 11)),
    ]
    .into_iter()
    .collect();
    let json = serde_json::to_string(&patch).unwrap();
    let restored: Patch = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.to_string(), patch.to_string());

    let a = program.get_modified_contents(&patch).unwrap();
    let b = program.get_modified_contents(&restored).unwrap();
    assert_eq!(
        program.dump(&a.working, triangle()).unwrap(),
        program.dump(&b.working, triangle()).unwrap()
    );
}
