use porter_ast::{
    Action, ActionDefKind, ActionDefinition, ActionKind, Binding, Expr, FunctionDefinition,
    Program, Sort,
};
use porter_core::visit::DEFAULT_MAX_DEPTH;
use porter_core::{Violation, non_extensionals};

fn node() -> Sort {
    Sort::Uninterpreted("node".into())
}

fn action(name: &str, params: Vec<Binding<Sort>>, body: Action) -> Binding<ActionDefinition> {
    Binding::new(
        name,
        ActionDefinition {
            pos: None,
            kind: ActionDefKind::from_name(name),
            formal_params: params,
            formal_returns: vec![],
            body,
        },
    )
}

/// A small lock server: a semaphore per node plus a connection counter.
fn lock_server() -> Program {
    let semaphore_init = Action::assign(
        Expr::apply("semaphore", vec![Expr::var("X")]),
        Expr::constant("true"),
    );
    let counts_init = Action::assign(
        Expr::apply("conn_counts", vec![Expr::var("X")]),
        Expr::constant("0"),
    );
    let connect = Action::sequence(vec![
        Action::new(ActionKind::Requires(Expr::apply(
            "semaphore",
            vec![Expr::constant("y")],
        ))),
        Action::assign(
            Expr::apply("semaphore", vec![Expr::constant("y")]),
            Expr::constant("false"),
        ),
        Action::assign(
            Expr::apply("conn_counts", vec![Expr::constant("x")]),
            Expr::constant("1"),
        ),
        Action::new(ActionKind::LogicalAssign {
            relsym: "link".into(),
            args: vec![Expr::constant("x"), Expr::var("Y")],
            rhs: Expr::constant("false"),
        }),
    ]);

    Program {
        sorts: [("node".to_string(), node())].into_iter().collect(),
        individuals: vec![
            Binding::new("semaphore", Sort::function(vec![node()], Sort::Bool)),
            Binding::new("conn_counts", Sort::function(vec![node()], Sort::nat_sort())),
            Binding::new("link", Sort::function(vec![node(), node()], Sort::Bool)),
            Binding::new("joined", Sort::function(vec![node()], Sort::Bool)),
        ],
        inits: vec![Action::sequence(vec![semaphore_init, counts_init])],
        actions: vec![action(
            "ext:connect",
            vec![Binding::new("x", node()), Binding::new("y", node())],
            connect,
        )],
        functions: vec![Binding::new(
            "joined",
            FunctionDefinition {
                pos: None,
                formal_params: vec![Binding::new("A", node())],
                body: Expr::apply("link", vec![Expr::var("A"), Expr::var("A")]),
            },
        )],
        conjectures: vec![],
    }
}

#[test]
fn lock_server_classification() {
    let found = non_extensionals(&lock_server(), DEFAULT_MAX_DEPTH).expect("classify");
    assert!(found.is_extensional("semaphore"));
    assert!(found.is_extensional("conn_counts"));
    assert_eq!(found.violation("link"), Some(Violation::NonPointUpdate));
    assert_eq!(found.violation("joined"), Some(Violation::Derived));
    assert_eq!(found.symbols().collect::<Vec<_>>(), vec!["joined", "link"]);
}

#[test]
fn first_violation_is_kept() {
    let body = Action::sequence(vec![
        Action::assign(
            Expr::apply("r", vec![Expr::var("X")]),
            Expr::apply("s", vec![Expr::var("X")]),
        ),
        Action::assign(
            Expr::apply("r", vec![Expr::var("X"), Expr::constant("c")]),
            Expr::constant("true"),
        ),
    ]);
    let prog = Program {
        actions: vec![action("step", vec![], body)],
        ..Program::default()
    };
    let found = non_extensionals(&prog, DEFAULT_MAX_DEPTH).expect("classify");
    assert_eq!(found.violation("r"), Some(Violation::NonConstantInit));
    assert_eq!(found.len(), 1);
}

#[test]
fn action_parameters_index_single_points() {
    // `p` is a formal parameter, so `r(p) := f(p)` updates one point.
    let body = Action::assign(
        Expr::apply("r", vec![Expr::var("p")]),
        Expr::apply("f", vec![Expr::var("p")]),
    );
    let prog = Program {
        actions: vec![action("ext:set", vec![Binding::new("p", node())], body)],
        ..Program::default()
    };
    let found = non_extensionals(&prog, DEFAULT_MAX_DEPTH).expect("classify");
    assert!(found.is_empty());
}

#[test]
fn violations_serialize_as_a_symbol_map() {
    let found = non_extensionals(&lock_server(), DEFAULT_MAX_DEPTH).expect("classify");
    let json = serde_json::to_value(&found).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!({ "joined": "derived", "link": "non_point_update" })
    );
}
