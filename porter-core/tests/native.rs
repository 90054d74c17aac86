use porter_ast::{
    Action, ActionDefKind, ActionDefinition, ActionKind, Binding, Expr, ExprKind, Position,
    Program, Sort,
};
use porter_core::visit::DEFAULT_MAX_DEPTH;
use porter_core::{PassError, RemapTable, rewrite_natives};

fn native_action(file: &str, line: u32, fmt: &str, args: Vec<Expr>) -> Action {
    Action::new(ActionKind::Native {
        lang: "c++".into(),
        fmt: fmt.into(),
        args,
    })
    .at(Position::new(file, line))
}

fn with_body(body: Action) -> Program {
    Program {
        actions: vec![Binding::new(
            "ext:push",
            ActionDefinition {
                pos: None,
                kind: ActionDefKind::Exported,
                formal_params: vec![Binding::new("v", Sort::int_sort())],
                formal_returns: vec![],
                body,
            },
        )],
        ..Program::default()
    }
}

#[test]
fn unmapped_fragment_reports_its_origin() {
    let prog = with_body(native_action("foo.spec", 42, "`0`++;", vec![Expr::constant("v")]));
    let table = RemapTable::builtin("java").expect("java table");
    assert_eq!(
        rewrite_natives(&prog, &table, DEFAULT_MAX_DEPTH),
        Err(PassError::MissingSplice {
            target: "java".into(),
            file: "foo.spec".into(),
            line: 42,
        })
    );
}

#[test]
fn fragments_are_looked_up_by_file_name_and_origin() {
    // Written at collections.ivy:939, instantiated from main.ivy:3.
    let pos = Position::new("main.ivy", 3)
        .with_reference(Position::new("/usr/lib/ivy/include/collections.ivy", 939));
    let body = Action::new(ActionKind::Native {
        lang: "c++".into(),
        fmt: "`0`.insert(`1`);".into(),
        args: vec![Expr::constant("s"), Expr::constant("v")],
    })
    .at(pos.clone());
    let prog = with_body(body);
    let table = RemapTable::builtin("java").expect("java table");

    let out = rewrite_natives(&prog, &table, DEFAULT_MAX_DEPTH).expect("rewrite");
    let body = &out.actions[0].decl.body;
    assert_eq!(body.pos.as_ref(), Some(&pos));
    assert_eq!(
        body.kind,
        ActionKind::Native {
            lang: "java".into(),
            fmt: "`0`.add(`1`)".into(),
            args: vec![Expr::constant("s"), Expr::constant("v")],
        }
    );
}

#[test]
fn every_native_node_is_rewritten() {
    let elem = Sort::Native {
        position: Position::new("collections_impl.ivy", 6),
        fmt: "std::vector<`0`>".into(),
        args: vec![Sort::int_sort()],
    };
    let set = Sort::Native {
        position: Position::new("collections.ivy", 923),
        fmt: "std::set<`0`>".into(),
        args: vec![elem],
    };
    let contains = Expr::new(ExprKind::Native {
        lang: "c++".into(),
        fmt: "`0`.count(`1`) > 0".into(),
        args: vec![Expr::constant("s"), Expr::constant("v")],
    })
    .at(Position::new("collections.ivy", 945))
    .with_sort(Sort::Bool);
    let body = Action::new(ActionKind::If {
        test: contains,
        then: Box::new(native_action(
            "collections_impl.ivy",
            44,
            "`1` = `0`.size();",
            vec![Expr::constant("s"), Expr::constant("n")],
        )),
        els: None,
    });

    let mut prog = with_body(body);
    prog.individuals.push(Binding::new("s", set));
    let table = RemapTable::builtin("java").expect("java table");
    let out = rewrite_natives(&prog, &table, DEFAULT_MAX_DEPTH).expect("rewrite");

    let Sort::Native { fmt, args, .. } = &out.individuals[0].decl else {
        panic!("expected a native sort");
    };
    assert_eq!(fmt, "HashSet<`0`>");
    assert!(matches!(&args[0], Sort::Native { fmt, .. } if fmt == "ArrayList<`0`>"));

    let ActionKind::If { test, then, .. } = &out.actions[0].decl.body.kind else {
        panic!("expected an if");
    };
    assert!(matches!(&test.kind, ExprKind::Native { fmt, lang, .. }
        if fmt == "`0`.contains(`1`)" && lang == "java"));
    assert!(matches!(&then.kind, ActionKind::Native { fmt, .. } if fmt == "`1` = `0`.size();"));
}

#[test]
fn custom_tables_replace_templates() {
    let prog = with_body(native_action("queue.ivy", 12, "`0`.pop();", vec![Expr::constant("q")]));
    let mut table = RemapTable::new("python", "python");
    table.insert("queue.ivy", 12, "`0`.popleft()");
    let out = rewrite_natives(&prog, &table, DEFAULT_MAX_DEPTH).expect("rewrite");
    assert!(matches!(&out.actions[0].decl.body.kind,
        ActionKind::Native { fmt, lang, .. } if fmt == "`0`.popleft()" && lang == "python"));
}
