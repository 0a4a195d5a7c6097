use super::*;
use modlink_ir::Signature;
use pretty_assertions::assert_eq;

fn version(major: i64, minor: i64) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert("major".to_string(), Value::Int(major));
    fields.insert("minor".to_string(), Value::Int(minor));
    Value::Record(fields)
}

fn set_a() -> Module {
    Module::new("Set_A", "Data.Set")
        .with_metadata("Author", "Quil")
        .with_metadata("version", version(2, 1))
        .with_metadata("compat", version(2, 0))
        .with_definition(Signature::function("has", 2))
}

fn set_b() -> Module {
    Module::new("Set_B", "Data.Set").with_definition(Signature::function("has", 2))
}

fn v(name: &str) -> VarName {
    VarName::new(name)
}

#[test]
fn test_id_equals() {
    assert!(evaluate(&ConstraintExpr::id_equals("Data.Set"), &set_a()));
    assert!(!evaluate(&ConstraintExpr::id_equals("Data.Map"), &set_a()));
}

#[test]
fn test_has_signature() {
    let has2 = ConstraintExpr::has(Signature::function("has", 2));
    let has3 = ConstraintExpr::has(Signature::function("has", 3));
    assert!(evaluate(&has2, &set_b()));
    assert!(!evaluate(&has3, &set_b()));
}

#[test]
fn test_meta_absent_is_false() {
    let expr = ConstraintExpr::meta(["Author"], Relation::True);
    assert!(evaluate(&expr, &set_a()));
    assert!(!evaluate(&expr, &set_b()));

    // Negating an absent leaf is true: absence is plain false, not unknown.
    assert!(evaluate(&ConstraintExpr::negate(expr), &set_b()));
}

#[test]
fn test_meta_shorthand_equality() {
    let quil = ConstraintExpr::meta(["Author"], Relation::is("Quil"));
    let nobody = ConstraintExpr::meta(["Author"], Relation::is("Nobody"));
    assert!(evaluate(&quil, &set_a()));
    assert!(!evaluate(&nobody, &set_a()));
}

#[test]
fn test_meta_nested_path_and_ordering() {
    let expr = ConstraintExpr::meta(["version", "minor"], Relation::gt(Term::it(), Term::lit(0)));
    assert!(evaluate(&expr, &set_a()));

    let expr = ConstraintExpr::meta(["version", "patch"], Relation::True);
    assert!(!evaluate(&expr, &set_a()));
}

#[test]
fn test_capture_binds_variable() {
    // version as v: v.major = 2
    let expr = ConstraintExpr::meta_as(
        ["version"],
        "v",
        Relation::eq(Term::var("v").field("major"), Term::lit(2)),
    );
    let bindings = evaluate_with(&expr, &set_a(), &EvalEnv::new(), Bindings::new()).unwrap();
    assert_eq!(bindings.get(&v("v")), Some(&version(2, 1)));
}

#[test]
fn test_equality_binds_free_variable() {
    let expr = ConstraintExpr::meta(
        ["version"],
        Relation::eq(Term::var("m"), Term::it().field("major")),
    );
    let bindings = evaluate_with(&expr, &set_a(), &EvalEnv::new(), Bindings::new()).unwrap();
    assert_eq!(bindings.get(&v("m")), Some(&Value::Int(2)));
}

#[test]
fn test_consistent_binding_across_conjuncts() {
    // version.major and compat.major must agree: both 2.
    let same_major = ConstraintExpr::and([
        ConstraintExpr::meta(["version", "major"], Relation::eq(Term::var("m"), Term::it())),
        ConstraintExpr::meta(["compat", "major"], Relation::eq(Term::var("m"), Term::it())),
    ]);
    assert!(evaluate(&same_major, &set_a()));

    // version.minor (1) and compat.minor (0) bind `m` inconsistently.
    let same_minor = ConstraintExpr::and([
        ConstraintExpr::meta_as(["version", "minor"], "m", Relation::True),
        ConstraintExpr::meta_as(["compat", "minor"], "m", Relation::True),
    ]);
    assert!(!evaluate(&same_minor, &set_a()));
}

#[test]
fn test_conjunct_order_does_not_matter() {
    let uses = ConstraintExpr::meta(
        ["compat", "major"],
        Relation::eq(Term::it(), Term::var("v").field("major")),
    );
    let binds = ConstraintExpr::meta_as(["version"], "v", Relation::True);

    let forward = ConstraintExpr::and([binds.clone(), uses.clone()]);
    let backward = ConstraintExpr::and([uses, binds]);
    assert!(evaluate(&forward, &set_a()));
    assert!(evaluate(&backward, &set_a()));
}

#[test]
fn test_branch_waits_for_later_conjunct() {
    // The second OR branch leaves `w` unbound, so `b > w` is only decidable
    // in the first branch. The `y > v` conjunct must still wait for `x as v`
    // in either position.
    let module = Module::new("Set_C", "Data.Set")
        .with_metadata("a", Value::Int(1))
        .with_metadata("z", true)
        .with_metadata("b", Value::Int(5))
        .with_metadata("x", Value::Int(2))
        .with_metadata("y", Value::Int(3));
    let choice = ConstraintExpr::or([
        ConstraintExpr::meta_as(["a"], "w", Relation::True),
        ConstraintExpr::meta(["z"], Relation::True),
    ]);
    let above_w = ConstraintExpr::meta(["b"], Relation::gt(Term::it(), Term::var("w")));
    let binds_v = ConstraintExpr::meta_as(["x"], "v", Relation::True);
    let above_v = ConstraintExpr::meta(["y"], Relation::gt(Term::it(), Term::var("v")));

    let forward = ConstraintExpr::and([
        choice.clone(),
        above_w.clone(),
        binds_v.clone(),
        above_v.clone(),
    ]);
    let backward = ConstraintExpr::and([choice, above_w, above_v, binds_v]);
    assert_eq!(evaluate(&forward, &module), evaluate(&backward, &module));
    assert!(evaluate(&forward, &module));

    let found = solutions(&backward, &module, &EvalEnv::new(), Bindings::new());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get(&v("w")), Some(&Value::Int(1)));
    assert_eq!(found[0].get(&v("v")), Some(&Value::Int(2)));
}

#[test]
fn test_negation_waits_for_binding() {
    // `NOT (Author = who)` cannot be decided before `who` is bound.
    let expr = ConstraintExpr::and([
        ConstraintExpr::negate(ConstraintExpr::meta(
            ["Author"],
            Relation::eq(Term::it(), Term::var("who")),
        )),
        ConstraintExpr::meta_as(["version", "major"], "who", Relation::True),
    ]);
    assert!(evaluate(&expr, &set_a()));

    // Never bound, the negation is undecidable and therefore false.
    let expr = ConstraintExpr::negate(ConstraintExpr::meta(
        ["Author"],
        Relation::eq(Term::it(), Term::var("who")),
    ));
    assert!(!evaluate(&expr, &set_a()));
}

#[test]
fn test_ordering_waits_for_binding() {
    // `m > 1` can only be decided once the second conjunct binds `m`.
    let expr = ConstraintExpr::and([
        ConstraintExpr::meta(["version", "minor"], Relation::gt(Term::var("m"), Term::lit(1))),
        ConstraintExpr::meta_as(["version", "major"], "m", Relation::True),
    ]);
    assert!(evaluate(&expr, &set_a()));
}

#[test]
fn test_disjunction_backtracks() {
    // Either branch binds `x`; only the branch binding "Quil" survives.
    let expr = ConstraintExpr::and([
        ConstraintExpr::or([
            ConstraintExpr::meta(["version", "major"], Relation::eq(Term::var("x"), Term::lit("Other"))),
            ConstraintExpr::meta(["Author"], Relation::eq(Term::var("x"), Term::it())),
        ]),
        ConstraintExpr::meta(["Author"], Relation::eq(Term::it(), Term::var("x"))),
    ]);
    let found = solutions(&expr, &set_a(), &EvalEnv::new(), Bindings::new());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get(&v("x")), Some(&Value::from("Quil")));
}

#[test]
fn test_negation_bindings_do_not_escape() {
    let expr = ConstraintExpr::and([
        ConstraintExpr::negate(ConstraintExpr::meta(["Author"], Relation::is("Nobody"))),
        ConstraintExpr::meta_as(["Author"], "a", Relation::True),
    ]);
    let bindings = evaluate_with(&expr, &set_a(), &EvalEnv::new(), Bindings::new()).unwrap();
    assert_eq!(bindings.len(), 1);
}

#[test]
fn test_unbindable_variable_is_false() {
    let expr = ConstraintExpr::meta(["version"], Relation::gt(Term::var("never"), Term::lit(0)));
    assert!(!evaluate(&expr, &set_a()));
}

#[test]
fn test_initial_bindings_respected() {
    let expr = ConstraintExpr::meta_as(["Author"], "who", Relation::True);
    let mut initial = Bindings::new();
    initial.insert(v("who"), Value::from("Someone"));
    assert_eq!(evaluate_with(&expr, &set_a(), &EvalEnv::new(), initial), None);
}

#[test]
fn test_peer_terms() {
    let ord = Module::new("Ord_Int", "Data.Ord").with_metadata("order", "total");
    let map = Module::new("Map_Tree", "Data.Map").with_metadata("key_order", "total");

    let expr = ConstraintExpr::meta(
        ["key_order"],
        Relation::eq(Term::it(), Term::peer(0, ["order"])),
    );
    let env = EvalEnv::new().with_peer(0, &ord);
    assert!(evaluate_in(&expr, &map, &env));

    // Without the peer bound the projection is absent.
    assert!(!evaluate(&expr, &map));
}

#[test]
fn test_empty_connectives() {
    assert!(evaluate(&ConstraintExpr::and([]), &set_b()));
    assert!(!evaluate(&ConstraintExpr::or([]), &set_b()));
}
