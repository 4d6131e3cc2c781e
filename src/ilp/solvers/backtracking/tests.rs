use std::collections::BTreeMap;

use crate::ilp::linexpr::Expr;
use crate::ilp::solvers::{SolveStatus, Solver as _};
use crate::ilp::{ObjectiveSense, ProblemBuilder, Variable};

use super::Solver;

fn no_hints() -> BTreeMap<String, i32> {
    BTreeMap::new()
}

#[test]
fn trivial_feasibility() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");

    let problem = ProblemBuilder::<String>::new()
        .set_variable("A", Variable::binary())
        .set_variable("B", Variable::binary())
        .add_constraint((&a + &b).leq(&Expr::constant(1)))
        .add_constraint((&a + &b).geq(&Expr::constant(1)))
        .build()
        .unwrap();

    let status = Solver::new().solve(&problem, &no_hints(), None);
    let solution = match status {
        SolveStatus::Optimal(s) => s,
        other => panic!("expected optimal, got {}", other.name()),
    };

    let a_val = solution.get(&String::from("A")).unwrap();
    let b_val = solution.get(&String::from("B")).unwrap();
    assert_eq!(a_val + b_val, 1);
}

#[test]
fn infeasible_model_is_detected() {
    let a = Expr::<String>::var("A");

    let problem = ProblemBuilder::<String>::new()
        .set_variable("A", Variable::binary())
        .add_constraint(a.geq(&Expr::constant(1)))
        .add_constraint(a.leq(&Expr::constant(0)))
        .build()
        .unwrap();

    let status = Solver::new().solve(&problem, &no_hints(), None);
    assert!(matches!(status, SolveStatus::Infeasible));
}

#[test]
fn minimization_reaches_the_optimum() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");

    let problem = ProblemBuilder::<String>::new()
        .set_variable("A", Variable::binary())
        .set_variable("B", Variable::binary())
        .add_constraint((&a + &b).geq(&Expr::constant(1)))
        .set_objective(&a + &b, ObjectiveSense::Minimize)
        .build()
        .unwrap();

    let status = Solver::new().solve(&problem, &no_hints(), None);
    let solution = match status {
        SolveStatus::Optimal(s) => s,
        other => panic!("expected optimal, got {}", other.name()),
    };
    assert_eq!(solution.objective_value(), 1);
}

#[test]
fn maximization_picks_the_heavier_variable() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");

    let problem = ProblemBuilder::<String>::new()
        .set_variable("A", Variable::binary())
        .set_variable("B", Variable::binary())
        .add_constraint((&a + &b).leq(&Expr::constant(1)))
        .set_objective(2 * &a + 3 * &b, ObjectiveSense::Maximize)
        .build()
        .unwrap();

    let status = Solver::new().solve(&problem, &no_hints(), None);
    let solution = match status {
        SolveStatus::Optimal(s) => s,
        other => panic!("expected optimal, got {}", other.name()),
    };
    assert_eq!(solution.objective_value(), 3);
    assert_eq!(solution.get(&String::from("A")), Some(0));
    assert_eq!(solution.get(&String::from("B")), Some(1));
}

#[test]
fn integer_variable_is_minimized_to_its_constraint() {
    let z = Expr::<String>::var("Z");

    let problem = ProblemBuilder::<String>::new()
        .set_variable("Z", Variable::integer().min(0).max(5))
        .add_constraint(z.geq(&Expr::constant(3)))
        .set_objective(z.clone(), ObjectiveSense::Minimize)
        .build()
        .unwrap();

    let status = Solver::new().solve(&problem, &no_hints(), None);
    let solution = match status {
        SolveStatus::Optimal(s) => s,
        other => panic!("expected optimal, got {}", other.name()),
    };
    assert_eq!(solution.get(&String::from("Z")), Some(3));
}

#[test]
fn hints_steer_value_ordering_without_binding() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");

    let build = || {
        ProblemBuilder::<String>::new()
            .set_variable("A", Variable::binary())
            .set_variable("B", Variable::binary())
            .add_constraint((&a + &b).eq(&Expr::constant(1)))
            .build()
            .unwrap()
    };

    // Binary default ordering tries 1 first, so A wins the slot.
    let problem = build();
    let status = Solver::new().solve(&problem, &no_hints(), None);
    let solution = status.solution().unwrap();
    assert_eq!(solution.get(&String::from("A")), Some(1));

    // Hinting A to 0 flips the preference to B.
    let problem = build();
    let hints = BTreeMap::from([(String::from("A"), 0)]);
    let status = Solver::new().solve(&problem, &hints, None);
    let solution = status.solution().unwrap();
    assert_eq!(solution.get(&String::from("A")), Some(0));
    assert_eq!(solution.get(&String::from("B")), Some(1));
}

#[test]
fn infeasible_hint_is_overridden() {
    let a = Expr::<String>::var("A");

    let problem = ProblemBuilder::<String>::new()
        .set_variable("A", Variable::binary())
        .add_constraint(a.geq(&Expr::constant(1)))
        .build()
        .unwrap();

    let hints = BTreeMap::from([(String::from("A"), 0)]);
    let status = Solver::new().solve(&problem, &hints, None);
    let solution = status.solution().unwrap();
    assert_eq!(solution.get(&String::from("A")), Some(1));
}

#[test]
fn indicator_encoding_is_exact_under_minimization() {
    // load ∈ {0, 1, 2} chosen by two binaries, cap = 2:
    // at_cap must be 1 exactly when both binaries are set.
    let x1 = Expr::<String>::var("x1");
    let x2 = Expr::<String>::var("x2");
    let max_load = Expr::<String>::var("zmax");
    let at_cap = Expr::<String>::var("zzcap");

    let problem = ProblemBuilder::<String>::new()
        .set_variable("x1", Variable::binary())
        .set_variable("x2", Variable::binary())
        .set_variable("zmax", Variable::integer().min(0).max(2))
        .set_variable("zzcap", Variable::binary())
        // both binaries forced on
        .add_constraint(x1.geq(&Expr::constant(1)))
        .add_constraint(x2.geq(&Expr::constant(1)))
        // max_load >= x1 + x2
        .add_constraint((&x1 + &x2 - &max_load).leq(&Expr::constant(0)))
        // guards: 2*at_cap <= max_load and max_load - 1 <= at_cap
        .add_constraint((2 * &at_cap - &max_load).leq(&Expr::constant(0)))
        .add_constraint((&max_load - 1 - &at_cap).leq(&Expr::constant(0)))
        .set_objective(at_cap.clone(), ObjectiveSense::Minimize)
        .build()
        .unwrap();

    let status = Solver::new().solve(&problem, &no_hints(), None);
    let solution = match status {
        SolveStatus::Optimal(s) => s,
        other => panic!("expected optimal, got {}", other.name()),
    };
    assert_eq!(solution.get(&String::from("zzcap")), Some(1));
    assert_eq!(solution.objective_value(), 1);
}
