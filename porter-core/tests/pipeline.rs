use porter_ast::{ActionKind, Binding, Expr, Position, Program, Sort};
use porter_core::bounds::Bound;
use porter_core::visit::DEFAULT_MAX_DEPTH;
use porter_core::{
    BoundPlan, CheckedModule, NumericInterval, PassError, PorterConfig, Reduction, Violation,
    assemble_program, check_sorts_closed, run_pipeline,
};

/// A checked module as the front end hands it over: a set of nodes kept in a native
/// container, a link relation, a derived predicate and one invariant.
const MODULE: &str = r#"{
  "sorts": {
    "node": { "Uninterpreted": "node" },
    "set": { "Uninterpreted": "set" }
  },
  "native_types": {
    "set": {
      "Native": {
        "position": { "filename": "include/collections.ivy", "line": 923 },
        "fmt": "std::set<`0`>",
        "args": [{ "Uninterpreted": "node" }]
      }
    }
  },
  "symbols": [
    { "name": "members", "decl": { "Uninterpreted": "set" } },
    {
      "name": "link",
      "decl": {
        "Function": {
          "domain": [{ "Uninterpreted": "node" }, { "Uninterpreted": "node" }],
          "range": "Bool"
        }
      }
    }
  ],
  "initializers": [
    {
      "kind": {
        "Assign": {
          "lhs": {
            "kind": {
              "Apply": {
                "relsym": "link",
                "args": [{ "kind": { "Var": "X" } }, { "kind": { "Var": "Y" } }]
              }
            }
          },
          "rhs": { "kind": { "Constant": "false" } }
        }
      }
    }
  ],
  "actions": [
    {
      "name": "ext:join",
      "decl": {
        "formal_params": [{ "name": "n", "decl": { "Uninterpreted": "node" } }],
        "body": {
          "kind": {
            "Sequence": [
              {
                "pos": { "filename": "include/collections.ivy", "line": 939 },
                "kind": {
                  "Native": {
                    "lang": "c++",
                    "fmt": "`0`.insert(`1`);",
                    "args": [{ "kind": { "Constant": "members" } }, { "kind": { "Constant": "n" } }]
                  }
                }
              },
              {
                "kind": {
                  "Assign": {
                    "lhs": {
                      "kind": {
                        "Apply": {
                          "relsym": "link",
                          "args": [{ "kind": { "Constant": "n" } }, { "kind": { "Var": "Y" } }]
                        }
                      }
                    },
                    "rhs": { "kind": { "Constant": "true" } }
                  }
                }
              }
            ]
          }
        }
      }
    }
  ],
  "definitions": [
    {
      "lhs": {
        "kind": {
          "Apply": {
            "relsym": "connected",
            "args": [{ "kind": { "Var": "A" }, "sort": { "Uninterpreted": "node" } }]
          }
        }
      },
      "rhs": {
        "kind": {
          "Apply": {
            "relsym": "link",
            "args": [{ "kind": { "Var": "A" } }, { "kind": { "Var": "A" } }]
          }
        }
      }
    },
    {
      "lhs": {
        "kind": {
          "Apply": {
            "relsym": "<",
            "args": [{ "kind": { "Var": "A" } }, { "kind": { "Var": "B" } }]
          }
        }
      },
      "rhs": { "kind": { "Constant": "false" } }
    }
  ],
  "conjectures": [
    {
      "name": "small",
      "decl": {
        "kind": {
          "Forall": {
            "vars": [{ "name": "N", "decl": { "Number": { "name": "nat", "lo": 0, "hi": null } } }],
            "body": {
              "kind": {
                "BinOp": {
                  "lhs": {
                    "kind": {
                      "BinOp": {
                        "lhs": { "kind": { "Var": "N" } },
                        "op": "Le",
                        "rhs": { "kind": { "Constant": "5" } }
                      }
                    }
                  },
                  "op": "Implies",
                  "rhs": {
                    "kind": { "Apply": { "relsym": "ok", "args": [{ "kind": { "Var": "N" } }] } }
                  }
                }
              }
            }
          }
        }
      }
    }
  ]
}"#;

fn assembled() -> Program {
    let module = CheckedModule::from_json(MODULE).expect("module json");
    assemble_program(&module, DEFAULT_MAX_DEPTH).expect("assemble")
}

#[test]
fn assembly_resolves_sorts_and_definitions() {
    let prog = assembled();

    let native = prog.individual("members").expect("members");
    assert!(matches!(native, Sort::Native { fmt, .. } if fmt == "std::set<`0`>"));

    let join = prog.action("ext:join").expect("join");
    let ActionKind::Sequence(stmts) = &join.body.kind else {
        panic!("expected a sequence");
    };
    assert!(matches!(
        &stmts[1].kind,
        ActionKind::LogicalAssign { relsym, .. } if relsym == "link"
    ));

    assert_eq!(prog.functions.len(), 1);
    let connected = prog.function("connected").expect("connected");
    assert_eq!(
        connected.formal_params,
        vec![Binding::new("A", Sort::Uninterpreted("node".into()))]
    );
}

#[test]
fn pipeline_retargets_and_classifies() {
    let analysis = run_pipeline(assembled(), &PorterConfig::default()).expect("pipeline");

    let members = analysis.program.individual("members").expect("members");
    assert!(matches!(members, Sort::Native { fmt, .. } if fmt == "HashSet<`0`>"));

    let join = analysis.program.action("ext:join").expect("join");
    let ActionKind::Sequence(stmts) = &join.body.kind else {
        panic!("expected a sequence");
    };
    assert!(matches!(
        &stmts[0].kind,
        ActionKind::Native { lang, fmt, .. } if lang == "java" && fmt == "`0`.add(`1`)"
    ));

    let found = &analysis.non_extensionals;
    assert!(found.is_extensional("members"));
    assert_eq!(found.violation("link"), Some(Violation::NonPointUpdate));
    assert_eq!(found.violation("connected"), Some(Violation::Derived));

    let plans = analysis.quantifier_plans().expect("plans");
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].reduction, Reduction::All);
    assert_eq!(
        plans[0].vars[0].plan,
        BoundPlan::Interval(NumericInterval::new(Some(Bound::Lit(0)), Some(Bound::Lit(5))))
    );
}

#[test]
fn unknown_target_fails_only_when_natives_exist() {
    let config = PorterConfig {
        target: "cobol".into(),
        ..PorterConfig::default()
    };
    assert_eq!(
        run_pipeline(assembled(), &config).unwrap_err(),
        PassError::UnknownTarget {
            target: "cobol".into()
        }
    );

    let plain = Program {
        conjectures: assembled().conjectures,
        ..Program::default()
    };
    assert!(run_pipeline(plain, &config).is_ok());
}

/// A program whose only native is the sort annotation on a conjecture term.
fn annotated_only() -> Program {
    let vector = Sort::Native {
        position: Position::new("collections_impl.ivy", 6),
        fmt: "std::vector<`0`>".into(),
        args: vec![Sort::int_sort()],
    };
    Program {
        conjectures: vec![Binding::new(
            "typed",
            Expr::constant("v").with_sort(vector),
        )],
        ..Program::default()
    }
}

#[test]
fn native_annotations_are_retargeted() {
    let analysis = run_pipeline(annotated_only(), &PorterConfig::default()).expect("pipeline");
    assert_eq!(analysis.natives, 1);
    let typed = &analysis.program.conjectures[0].decl;
    assert!(matches!(
        &typed.sort,
        Some(Sort::Native { fmt, .. }) if fmt == "ArrayList<`0`>"
    ));
}

#[test]
fn native_annotations_need_a_known_target() {
    let config = PorterConfig {
        target: "cobol".into(),
        ..PorterConfig::default()
    };
    assert_eq!(
        run_pipeline(annotated_only(), &config).unwrap_err(),
        PassError::UnknownTarget {
            target: "cobol".into()
        }
    );
}

#[test]
fn undeclared_sorts_are_rejected() {
    let mut prog = assembled();
    prog.individuals
        .push(Binding::new("ghost", Sort::Uninterpreted("phantom".into())));
    assert!(matches!(
        check_sorts_closed(&prog, DEFAULT_MAX_DEPTH),
        Err(PassError::Invariant { .. })
    ));
}
