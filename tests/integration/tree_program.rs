use crate::fixtures::{load, sandboxed, triangle, triangle_project, TRIANGLE, TRIANGLE_POINTS};
use gipatch::{
    ApplyStatus, Direction, Edit, EngineKind, Granularity, Location, Patch, TreeLanguage,
};
use tempfile::TempDir;

#[test]
fn statement_points_of_triangle() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    assert_eq!(
        program.engine(triangle()).unwrap().kind(),
        EngineKind::Tree(TreeLanguage::Python)
    );
    let points = program.modification_points(triangle()).unwrap();
    assert_eq!(points.len(), TRIANGLE_POINTS);
    assert_eq!(points[0].kind, "function_definition");
    assert_eq!(points[1].kind, "if_statement");
    assert_eq!(points[1].line, 2);
    assert_eq!(points[10].kind, "return_statement");
    assert_eq!(
        program.get_source(triangle(), 10).unwrap(),
        "return \"INVALID\""
    );
}

#[test]
fn get_source_is_in_sandboxed_file() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);
    let contents = sandboxed(&program, triangle());

    for point in program.modification_points(triangle()).unwrap() {
        let source = program.get_source(triangle(), point.index).unwrap();
        assert!(!source.is_empty());
        assert!(contents.contains(&source), "point {}", point.index);
    }
}

#[test]
fn empty_patch_round_trips() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    let modified = program.get_modified_contents(&Patch::new()).unwrap();
    assert!(modified.statuses.is_empty());
    assert_eq!(program.dump(&modified.working, triangle()).unwrap(), TRIANGLE);
}

#[test]
fn insertion_after_lands_next_to_target() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    let mut patch = Patch::new();
    patch.add(Edit::insertion(
        Location::new(triangle(), 1),
        Location::new(triangle(), 10),
        Direction::After,
    ));
    let report = program.apply(&patch).unwrap();
    assert_eq!(report.statuses, vec![ApplyStatus::Applied]);

    let written = sandboxed(&program, triangle());
    let modified = program.get_modified_contents(&patch).unwrap();
    assert_eq!(written, program.dump(&modified.working, triangle()).unwrap());

    let target = program.get_source(triangle(), 1).unwrap();
    let ingredient = program.get_source(triangle(), 10).unwrap();
    assert!(written.contains(&format!("{target}\n    {ingredient}\n    if a > c:")));
}

#[test]
fn single_statement_move_keeps_point_count() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);
    let engine = program.engine(triangle()).unwrap();

    let mut patch = Patch::new();
    patch.add(Edit::moving(
        Location::new(triangle(), 2),
        Location::new(triangle(), 11),
        Direction::Before,
    ));
    let modified = program.get_modified_contents(&patch).unwrap();
    assert_eq!(modified.conflicts(), 0);

    let text = program.dump(&modified.working, triangle()).unwrap();
    assert!(text.starts_with("def classify_triangle(a, b, c):\n    if a > b:\n        return \"SCALENE\"\n        tmp = a\n"));
    assert!(text.trim_end().ends_with("return \"INVALID\""));

    let reparsed = engine.parse(triangle(), &text).unwrap();
    assert_eq!(reparsed.points.len(), TRIANGLE_POINTS);
}

#[test]
fn edits_use_original_numbering() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    // deleting the first if block swallows points 2..=4
    let patch: Patch = [
        Edit::deletion(Location::new(triangle(), 1)),
        Edit::deletion(Location::new(triangle(), 3)),
        Edit::deletion(Location::new(triangle(), 7)),
    ]
    .into_iter()
    .collect();
    let modified = program.get_modified_contents(&patch).unwrap();

    assert!(modified.statuses[0].is_applied());
    assert!(matches!(
        modified.statuses[1],
        ApplyStatus::Conflict { .. }
    ));
    assert!(modified.statuses[2].is_applied());

    let text = program.dump(&modified.working, triangle()).unwrap();
    assert!(!text.contains("if a > b:"));
    assert!(text.contains("    if a > c:\n        tmp = a\n        c = tmp\n"));
}

#[test]
fn deleting_only_statement_leaves_pass() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    let patch: Patch = [Edit::deletion(Location::new(triangle(), 10))]
        .into_iter()
        .collect();
    let modified = program.get_modified_contents(&patch).unwrap();
    let text = program.dump(&modified.working, triangle()).unwrap();
    assert!(text.contains("    if a + b <= c:\n        pass\n"));

    let reparsed = program
        .engine(triangle())
        .unwrap()
        .parse(triangle(), &text)
        .unwrap();
    assert_eq!(reparsed.points.len(), TRIANGLE_POINTS);
}

#[test]
fn out_of_range_index_is_an_error() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    let patch: Patch = [Edit::deletion(Location::new(triangle(), TRIANGLE_POINTS))]
        .into_iter()
        .collect();
    assert!(program.get_modified_contents(&patch).is_err());
}

#[test]
fn moving_a_block_into_itself_conflicts() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    // point 2 (`tmp = a`) sits inside point 1 (`if a > b:`)
    let patch: Patch = [
        Edit::moving(
            Location::new(triangle(), 2),
            Location::new(triangle(), 1),
            Direction::After,
        ),
        Edit::moving(
            Location::new(triangle(), 5),
            Location::new(triangle(), 5),
            Direction::Before,
        ),
    ]
    .into_iter()
    .collect();
    let modified = program.get_modified_contents(&patch).unwrap();

    assert!(matches!(modified.statuses[0], ApplyStatus::Conflict { .. }));
    assert!(matches!(modified.statuses[1], ApplyStatus::Conflict { .. }));
    let text = program.dump(&modified.working, triangle()).unwrap();
    assert_eq!(text, TRIANGLE);
}

#[test]
fn moving_a_nested_statement_out_of_its_block() {
    let project = triangle_project();
    let tmp = TempDir::new().unwrap();
    let program = load(&project, &tmp, Granularity::Tree);

    // the ingredient is inside the target, which is allowed
    let patch: Patch = [Edit::moving(
        Location::new(triangle(), 1),
        Location::new(triangle(), 4),
        Direction::Before,
    )]
    .into_iter()
    .collect();
    let modified = program.get_modified_contents(&patch).unwrap();
    assert_eq!(modified.conflicts(), 0);

    let text = program.dump(&modified.working, triangle()).unwrap();
    assert!(text.starts_with("def classify_triangle(a, b, c):\n    b = tmp\n    if a > b:\n        tmp = a\n        a = b\n    if a > c:"));
}
