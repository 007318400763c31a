//! Empty-patch round trips over generated sources.

use gipatch::engine::{Engine, LineEngine, TreeEngine};
use gipatch::TreeLanguage;
use proptest::prelude::*;
use std::path::Path;

#[derive(Debug, Clone)]
enum Stmt {
    Assign(u8),
    If(u8, Vec<u8>),
}

fn stmt() -> impl Strategy<Value = Stmt> {
    prop_oneof![
        any::<u8>().prop_map(Stmt::Assign),
        (any::<u8>(), prop::collection::vec(any::<u8>(), 1..4))
            .prop_map(|(cond, body)| Stmt::If(cond, body)),
    ]
}

/// Python source plus its expected statement count.
fn render(stmts: &[Stmt], blank_lines: bool) -> (String, usize) {
    let mut out = String::new();
    let mut count = 0;
    for stmt in stmts {
        match stmt {
            Stmt::Assign(n) => {
                out.push_str(&format!("v = {n}\n"));
                count += 1;
            }
            Stmt::If(cond, body) => {
                out.push_str(&format!("if v > {cond}:\n"));
                for n in body {
                    out.push_str(&format!("    v = v + {n}\n"));
                }
                count += 1 + body.len();
            }
        }
        if blank_lines {
            out.push('\n');
        }
    }
    (out, count)
}

proptest! {
    #[test]
    fn line_engine_round_trips(source in "[a-z =\\t\\n]{0,80}") {
        let path = Path::new("any.txt");
        let engine = LineEngine;
        let parsed = engine.parse(path, &source).unwrap();
        prop_assert_eq!(engine.dump(path, &parsed.contents).unwrap(), source.clone());
        for point in &parsed.points {
            let text = engine.get_source(path, &parsed.contents, point.index).unwrap();
            prop_assert!(source.contains(&text));
        }
    }

    #[test]
    fn tree_engine_round_trips(
        stmts in prop::collection::vec(stmt(), 1..12),
        blank_lines in any::<bool>(),
    ) {
        let (source, count) = render(&stmts, blank_lines);
        let path = Path::new("gen.py");
        let engine = TreeEngine::new(TreeLanguage::Python);
        let parsed = engine.parse(path, &source).unwrap();

        prop_assert_eq!(parsed.points.len(), count);
        prop_assert_eq!(engine.dump(path, &parsed.contents).unwrap(), source.clone());
        for point in &parsed.points {
            let text = engine.get_source(path, &parsed.contents, point.index).unwrap();
            prop_assert!(source.contains(&text));
        }
    }
}
