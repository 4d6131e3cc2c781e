use super::*;

#[test]
fn var_and_constant() {
    let expr = Expr::<String>::var("A");
    assert_eq!(expr.get(&String::from("A")), Some(1));
    assert_eq!(expr.get_constant(), 0);

    let expr = Expr::<String>::constant(42);
    assert!(expr.variables().is_empty());
    assert_eq!(expr.get_constant(), 42);
}

#[test]
fn operator_combination() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");

    let expr = 2 * &a - 3 * &b + 5;

    assert_eq!(
        expr.variables(),
        BTreeSet::from([String::from("A"), String::from("B")])
    );
    assert_eq!(expr.get(&String::from("A")), Some(2));
    assert_eq!(expr.get(&String::from("B")), Some(-3));
    assert_eq!(expr.get_constant(), 5);
}

#[test]
fn zero_coefficients_are_kept_until_cleaned() {
    let a = Expr::<String>::var("A");
    let expr = &a - &a;

    assert_eq!(expr.get(&String::from("A")), Some(0));
    assert_eq!(expr.cleaned().get(&String::from("A")), None);
}

#[test]
fn constraint_normal_form() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");
    let one = Expr::constant(1);

    let c = (&a + &b).leq(&one);
    assert_eq!(c.get_sign(), Sign::LessThan);
    assert_eq!(c.get_var(&String::from("A")), Some(1));
    assert_eq!(c.get_var(&String::from("B")), Some(1));
    assert_eq!(c.get_constant(), -1);

    let c = a.geq(&one);
    assert_eq!(c.get_sign(), Sign::LessThan);
    assert_eq!(c.get_var(&String::from("A")), Some(-1));
    assert_eq!(c.get_constant(), 1);
}

#[test]
fn constraint_satisfaction() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");
    let c = (&a + &b).leq(&Expr::constant(1));

    let values = BTreeMap::from([(String::from("A"), 1), (String::from("B"), 0)]);
    assert!(c.is_satisfied(&values));

    let values = BTreeMap::from([(String::from("A"), 1), (String::from("B"), 1)]);
    assert!(!c.is_satisfied(&values));

    let e = a.eq(&b);
    let values = BTreeMap::from([(String::from("A"), 1), (String::from("B"), 1)]);
    assert!(e.is_satisfied(&values));
}

#[test]
fn display_format() {
    let a = Expr::<String>::var("A");
    let b = Expr::<String>::var("B");
    let c = (&a - 2 * &b + 3).leq(&Expr::constant(0));

    assert_eq!(format!("{}", c), "1*A + (-2)*B + 3 <= 0");
    assert_eq!(format!("{}", Expr::<String>::constant(0)), "0");
}
