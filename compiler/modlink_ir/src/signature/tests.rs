use super::*;

#[test]
fn test_function_arity_matters() {
    assert!(Signature::function("has", 2).structurally_eq(&Signature::function("has", 2)));
    assert!(!Signature::function("has", 2).structurally_eq(&Signature::function("has", 1)));
}

#[test]
fn test_shape_text_is_opaque() {
    let a = Signature::Function {
        name: "map".into(),
        arity: 2,
        shape: "(a -> b, Set a) -> Set b".into(),
    };
    let b = Signature::function("map", 2);
    assert!(a.structurally_eq(&b));
    assert_ne!(a, b);
}

#[test]
fn test_kind_mismatch() {
    assert!(!Signature::define("empty").structurally_eq(&Signature::type_("empty")));
    assert!(!Signature::define("empty").structurally_eq(&Signature::function("empty", 0)));
}

#[test]
fn test_union_variants_compared_in_order() {
    let a = Signature::union("Tree", [("Leaf", 0), ("Node", 3)]);
    let b = Signature::union("Tree", [("Leaf", 0), ("Node", 3)]);
    let c = Signature::union("Tree", [("Leaf", 0), ("Node", 2)]);
    assert!(a.structurally_eq(&b));
    assert!(!a.structurally_eq(&c));
}

#[test]
fn test_record_keys_are_a_set() {
    let a = Signature::record("Point", ["x", "y"]);
    let b = Signature::record("Point", ["y", "x"]);
    let c = Signature::record("Point", ["x"]);
    assert!(a.structurally_eq(&b));
    assert!(!a.structurally_eq(&c));
}

#[test]
fn test_describe() {
    assert_eq!(Signature::function("has", 2).describe(), "function has/2");
    assert_eq!(
        Signature::union("Opt", [("None", 0), ("Some", 1)]).describe(),
        "union Opt [None/0 | Some/1]"
    );
    assert_eq!(
        Signature::record("P", ["y", "x"]).describe(),
        "record P {x, y}"
    );
    assert_eq!(Signature::define("empty").describe(), "define empty");
}

mod proptest_structural_eq {
    use super::*;
    use proptest::prelude::*;

    fn name() -> impl Strategy<Value = String> {
        prop_oneof![Just("has"), Just("empty"), Just("Tree"), Just("map")].prop_map(String::from)
    }

    fn shape() -> impl Strategy<Value = String> {
        "[a-z >()-]{0,12}"
    }

    fn signature() -> impl Strategy<Value = Signature> {
        prop_oneof![
            (name(), shape()).prop_map(|(name, shape)| Signature::Define { name, shape }),
            (name(), 0u32..4, shape())
                .prop_map(|(name, arity, shape)| Signature::Function { name, arity, shape }),
            (name(), proptest::collection::vec((name(), 0u32..3), 0..3))
                .prop_map(|(name, variants)| Signature::Union { name, variants }),
            (name(), proptest::collection::btree_set(name(), 0..3))
                .prop_map(|(name, keys)| Signature::Record { name, keys }),
            (name(), shape()).prop_map(|(name, shape)| Signature::Type { name, shape }),
        ]
    }

    /// The same signature with its opaque shape text replaced.
    fn reshaped(signature: &Signature, text: &str) -> Signature {
        let mut out = signature.clone();
        match &mut out {
            Signature::Define { shape, .. }
            | Signature::Function { shape, .. }
            | Signature::Type { shape, .. } => *shape = text.to_string(),
            Signature::Union { .. } | Signature::Record { .. } => {}
        }
        out
    }

    proptest! {
        #[test]
        fn reflexive(a in signature()) {
            prop_assert!(a.structurally_eq(&a));
        }

        #[test]
        fn symmetric(a in signature(), b in signature()) {
            prop_assert_eq!(a.structurally_eq(&b), b.structurally_eq(&a));
        }

        #[test]
        fn shape_text_is_ignored(a in signature(), b in signature(), text in shape()) {
            prop_assert!(a.structurally_eq(&reshaped(&a, &text)));
            prop_assert_eq!(a.structurally_eq(&b), reshaped(&a, &text).structurally_eq(&b));
        }

        #[test]
        fn implied_by_equality(a in signature(), b in signature()) {
            if a == b {
                prop_assert!(a.structurally_eq(&b));
            }
            if a.structurally_eq(&b) {
                prop_assert_eq!(a.name(), b.name());
                prop_assert_eq!(a.kind(), b.kind());
            }
        }
    }
}
