use super::*;
use crate::config::RefreshPolicy;
use crate::diagnostic::ErrorCode;
use crate::session::LinkSession;
use crate::space::{Restriction, SpaceId};
use modlink_ir::{Interface, Relation, Signature, Term};
use pretty_assertions::assert_eq;

fn set_interface() -> Interface {
    Interface::new("Data.Set")
        .with_signature(Signature::type_("Set"))
        .with_signature(Signature::function("has", 2))
}

fn set_module(name: &str) -> Module {
    Module::new(name, "Data.Set")
        .with_definition(Signature::type_("Set"))
        .with_definition(Signature::function("has", 2))
}

/// `Set_A` (annotated `Author = "Quil"`) and `Set_B` (unannotated).
fn set_a() -> Module {
    set_module("Set_A")
        .with_definition(Signature::union("Tree", [("Leaf", 0), ("Node", 3)]))
        .with_metadata("Author", "Quil")
}

fn set_b() -> Module {
    set_module("Set_B").with_definition(Signature::function("member", 2))
}

fn main_using(constraint: ConstraintExpr) -> Module {
    Module::new("Main", "App.Main")
        .with_dependency(Dependency::on("Data.Set").exposing(["has"]).with_constraint(constraint))
}

fn session_with(config: LinkConfig, cache: LinkCache, modules: Vec<Module>) -> LinkSession {
    let mut session = LinkSession::with_cache(config, cache);
    session.register_interface(set_interface()).unwrap();
    session.register_interface(Interface::new("App.Main")).unwrap();
    for module in modules {
        session.register_module(module, SpaceId::ROOT).unwrap();
    }
    session
}

fn session(modules: Vec<Module>) -> LinkSession {
    session_with(LinkConfig::new(), LinkCache::in_memory(), modules)
}

fn main_key() -> LinkKey {
    LinkKey::new("Main", 0)
}

fn is_quil() -> ConstraintExpr {
    ConstraintExpr::meta(["Author"], Relation::is("Quil"))
}

#[test]
fn test_scenario_ambiguous() {
    let session = session(vec![
        set_a(),
        set_b(),
        main_using(ConstraintExpr::id_equals("Data.Set")),
    ]);
    let err = session.linker().resolve(&main_key()).unwrap_err();
    assert_eq!(
        err,
        LinkError::Ambiguous {
            key: main_key(),
            interface: "Data.Set".into(),
            matches: vec!["Set_A".into(), "Set_B".into()],
        }
    );
}

#[test]
fn test_scenario_disambiguated_by_metadata() {
    let session = session(vec![
        set_a(),
        set_b(),
        main_using(ConstraintExpr::and([ConstraintExpr::id_equals("Data.Set"), is_quil()])),
    ]);
    let linker = session.linker();
    let module = linker.resolve(&main_key()).unwrap();
    assert_eq!(module.name.as_str(), "Set_A");
    assert_eq!(linker.state(&main_key()), DependencyState::Resolved("Set_A".into()));
}

#[test]
fn test_scenario_no_match() {
    let session = session(vec![
        set_a(),
        set_b(),
        main_using(ConstraintExpr::and([
            ConstraintExpr::id_equals("Data.Set"),
            ConstraintExpr::has(Signature::function("has", 2)),
            ConstraintExpr::meta(["Author"], Relation::is("Nobody")),
        ])),
    ]);
    let linker = session.linker();
    let err = linker.resolve(&main_key()).unwrap_err();
    assert!(matches!(err, LinkError::NoMatch { .. }), "got {err:?}");
    assert_eq!(linker.state(&main_key()), DependencyState::Unsatisfied);
}

#[test]
fn test_registration_order_irrelevant() {
    let constraint = ConstraintExpr::id_equals("Data.Set");
    let forward = session(vec![set_a(), set_b(), main_using(constraint.clone())]);
    let backward = session(vec![main_using(constraint), set_b(), set_a()]);
    assert_eq!(
        forward.linker().resolve(&main_key()).unwrap_err(),
        backward.linker().resolve(&main_key()).unwrap_err()
    );
}

#[test]
fn test_pin_survives_new_equal_candidate() {
    let constraint = ConstraintExpr::id_equals("Data.Set");
    let first = session_with(
        LinkConfig::new().with_pinning(true),
        LinkCache::in_memory(),
        vec![set_a(), main_using(constraint.clone())],
    );
    assert_eq!(first.linker().resolve(&main_key()).unwrap().name.as_str(), "Set_A");
    first.commit().unwrap();

    let second = session_with(
        LinkConfig::new(),
        first.into_cache(),
        vec![set_a(), set_b(), main_using(constraint)],
    );
    assert_eq!(second.linker().resolve(&main_key()).unwrap().name.as_str(), "Set_A");
}

#[test]
fn test_failed_revalidation_is_not_re_searched() {
    let first = session_with(
        LinkConfig::new().with_pinning(true),
        LinkCache::in_memory(),
        vec![set_a(), main_using(is_quil())],
    );
    first.linker().resolve(&main_key()).unwrap();
    first.commit().unwrap();

    // Set_A changed author; Set_B now qualifies.
    let cache = first.into_cache();
    let second = session_with(
        LinkConfig::new(),
        cache,
        vec![
            set_module("Set_A").with_metadata("Author", "Someone"),
            set_b().with_metadata("Author", "Quil"),
            main_using(is_quil()),
        ],
    );
    let linker = second.linker();
    let err = linker.resolve(&main_key()).unwrap_err();
    assert_eq!(
        err,
        LinkError::Cache(CacheError::StalePin {
            key: main_key(),
            module: "Set_A".into(),
            reason: StaleReason::ConstraintFailed,
        })
    );
    assert_eq!(linker.state(&main_key()), DependencyState::Stale);
    assert!(second.cache().get(&main_key()).is_some_and(|b| b.stale));
}

#[test]
fn test_refresh_re_resolves_and_keeps_pin() {
    let first = session_with(
        LinkConfig::new().with_pinning(true),
        LinkCache::in_memory(),
        vec![set_a(), main_using(is_quil())],
    );
    first.linker().resolve(&main_key()).unwrap();
    first.commit().unwrap();

    let second = session_with(
        LinkConfig::new().with_refresh(RefreshPolicy::Keys([main_key()].into())),
        first.into_cache(),
        vec![
            set_module("Set_A"),
            set_b().with_metadata("Author", "Quil"),
            main_using(is_quil()),
        ],
    );
    assert_eq!(second.linker().resolve(&main_key()).unwrap().name.as_str(), "Set_B");
    let binding = second.cache().get(&main_key()).unwrap();
    assert!(binding.pinned);
    assert!(!binding.stale);
}

#[test]
fn test_missing_pinned_module_is_stale() {
    let first = session_with(
        LinkConfig::new().with_pinning(true),
        LinkCache::in_memory(),
        vec![set_a(), main_using(ConstraintExpr::True)],
    );
    first.linker().resolve(&main_key()).unwrap();
    first.commit().unwrap();

    let second = session_with(
        LinkConfig::new(),
        first.into_cache(),
        vec![set_b(), main_using(ConstraintExpr::True)],
    );
    assert!(matches!(
        second.linker().resolve(&main_key()),
        Err(LinkError::Cache(CacheError::StalePin {
            reason: StaleReason::Missing,
            ..
        }))
    ));
}

#[test]
fn test_sibling_space_never_searched() {
    let mut session = LinkSession::with_cache(LinkConfig::new(), LinkCache::in_memory());
    session.register_interface(set_interface()).unwrap();
    session.register_interface(Interface::new("App.Main")).unwrap();
    let app = session
        .add_space("app", "trusted", SpaceId::ROOT, Restriction::none())
        .unwrap();
    let vendor = session
        .add_space("vendor", "third-party", SpaceId::ROOT, Restriction::none())
        .unwrap();
    session.register_module(set_b(), vendor).unwrap();
    session.register_module(main_using(ConstraintExpr::True), app).unwrap();

    let err = session.linker().resolve(&main_key()).unwrap_err();
    assert!(matches!(err, LinkError::NoMatch { .. }), "got {err:?}");
}

#[test]
fn test_restricted_space_hides_module() {
    let mut session = LinkSession::with_cache(LinkConfig::new(), LinkCache::in_memory());
    session.register_interface(set_interface()).unwrap();
    session.register_interface(Interface::new("App.Main")).unwrap();
    let sandbox = session
        .add_space(
            "sandbox",
            "sandboxed",
            SpaceId::ROOT,
            Restriction::none().deny_module("Set_A"),
        )
        .unwrap();
    session.register_module(set_a(), SpaceId::ROOT).unwrap();
    session.register_module(set_b(), SpaceId::ROOT).unwrap();
    session.register_module(main_using(ConstraintExpr::True), sandbox).unwrap();

    let linker = session.linker();
    assert_eq!(linker.resolve(&main_key()).unwrap().name.as_str(), "Set_B");
    assert_eq!(session.cache().get(&main_key()).unwrap().trust, "trusted");
}

#[test]
fn test_app_selector_picks_module() {
    let mut session = session(vec![set_a(), set_b(), main_using(ConstraintExpr::True)]);
    session
        .set_app(AppDescription::new().select("Data.Set", "Set_B"))
        .unwrap();
    assert_eq!(session.linker().resolve(&main_key()).unwrap().name.as_str(), "Set_B");
}

#[test]
fn test_app_clauses_are_anded() {
    let mut session = session(vec![set_a(), set_b(), main_using(ConstraintExpr::True)]);
    session
        .set_app(AppDescription::new().require("Data.Set", is_quil()))
        .unwrap();
    assert_eq!(session.linker().resolve(&main_key()).unwrap().name.as_str(), "Set_A");
}

#[test]
fn test_mutual_recursion_links() {
    let ping = Interface::new("Ping").with_signature(Signature::function("ping", 1));
    let pong = Interface::new("Pong").with_signature(Signature::function("pong", 1));
    let mut session = LinkSession::with_cache(LinkConfig::new(), LinkCache::in_memory());
    session.register_interface(ping).unwrap();
    session.register_interface(pong).unwrap();
    session
        .register_module(
            Module::new("PingImpl", "Ping")
                .with_definition(Signature::function("ping", 1))
                .with_dependency(Dependency::on("Pong")),
            SpaceId::ROOT,
        )
        .unwrap();
    session
        .register_module(
            Module::new("PongImpl", "Pong")
                .with_definition(Signature::function("pong", 1))
                .with_dependency(Dependency::on("Ping")),
            SpaceId::ROOT,
        )
        .unwrap();

    let report = session.link(Some(&["PingImpl".into()]));
    assert!(report.is_ok(), "{:?}", report.errors);
    assert_eq!(
        report.program.get(&LinkKey::new("PingImpl", 0)),
        Some(&ModuleName::new("PongImpl"))
    );
    assert_eq!(
        report.program.get(&LinkKey::new("PongImpl", 0)),
        Some(&ModuleName::new("PingImpl"))
    );
    assert_eq!(report.linked_modules.len(), 2);
}

#[test]
fn test_program_errors_are_batched() {
    let consumer = Module::new("Main", "App.Main")
        .with_dependency(Dependency::on("Data.Set"))
        .with_dependency(
            Dependency::on("Data.Set")
                .with_constraint(ConstraintExpr::meta(["Author"], Relation::is("Nobody"))),
        )
        .with_dependency(Dependency::on("Data.Set").with_constraint(is_quil()));
    let session = session(vec![set_a(), set_b(), consumer]);

    let report = session.link(None);
    let codes: Vec<_> = report.errors.iter().map(LinkError::error_code).collect();
    assert_eq!(codes, vec![ErrorCode::E4002, ErrorCode::E4001]);
    assert_eq!(
        report.program.get(&LinkKey::new("Main", 2)),
        Some(&ModuleName::new("Set_A"))
    );
}

#[test]
fn test_peer_constraint() {
    let ord = Interface::new("Data.Ord");
    let consumer = Module::new("Main", "App.Main")
        .with_dependency(Dependency::on("Data.Set").with_constraint(ConstraintExpr::meta(
            ["Author"],
            Relation::eq(Term::it(), Term::peer(1, ["Author"])),
        )))
        .with_dependency(Dependency::on("Data.Ord"));
    let mut session = session(vec![set_a(), set_b()]);
    session.register_interface(ord).unwrap();
    session
        .register_module(
            Module::new("Ord_Q", "Data.Ord").with_metadata("Author", "Quil"),
            SpaceId::ROOT,
        )
        .unwrap();
    session.register_module(consumer, SpaceId::ROOT).unwrap();

    let linker = session.linker();
    assert_eq!(linker.resolve(&main_key()).unwrap().name.as_str(), "Set_A");
    assert_eq!(
        linker.state(&LinkKey::new("Main", 1)),
        DependencyState::Resolved("Ord_Q".into())
    );
}

#[test]
fn test_cyclic_constraint() {
    let reads = |peer: u32| {
        Dependency::on("Data.Set").with_constraint(ConstraintExpr::meta(
            ["Author"],
            Relation::eq(Term::it(), Term::peer(peer, ["Author"])),
        ))
    };
    let consumer = Module::new("Main", "App.Main")
        .with_dependency(reads(1))
        .with_dependency(reads(0));
    let session = session(vec![set_a(), consumer]);

    let err = session.linker().resolve(&main_key()).unwrap_err();
    assert_eq!(
        err,
        LinkError::CyclicConstraint {
            key: main_key(),
            cycle: vec![0, 1, 0],
        }
    );
}

#[test]
fn test_unknown_slot_and_module() {
    let session = session(vec![set_a(), main_using(ConstraintExpr::True)]);
    let linker = session.linker();
    assert_eq!(
        linker.resolve(&LinkKey::new("Main", 5)).unwrap_err(),
        LinkError::UnknownSlot {
            key: LinkKey::new("Main", 5)
        }
    );
    assert_eq!(
        linker.resolve(&LinkKey::new("Ghost", 0)).unwrap_err(),
        LinkError::UnknownModule("Ghost".into())
    );
}

#[test]
fn test_cancelled_link_leaves_pins() {
    let first = session_with(
        LinkConfig::new().with_pinning(true),
        LinkCache::in_memory(),
        vec![set_a(), main_using(ConstraintExpr::True)],
    );
    first.linker().resolve(&main_key()).unwrap();
    first.commit().unwrap();

    let second = session_with(
        LinkConfig::new().with_pinning(true).with_refresh(RefreshPolicy::All),
        first.into_cache(),
        vec![set_b(), main_using(ConstraintExpr::True)],
    );
    second.cancel_token().cancel();
    let report = second.link(None);
    assert!(matches!(report.errors[0], LinkError::Cancelled { .. }));

    let pins = second.cache().pins();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].module.as_str(), "Set_A");
    assert_eq!(second.finish(&report), Ok(0));
}

#[test]
fn test_state_transitions() {
    use DependencyState::*;
    assert!(Unresolved.can_become(&Resolving));
    assert!(Resolving.can_become(&Ambiguous));
    assert!(Resolved("M".into()).can_become(&Stale));
    assert!(Stale.can_become(&Resolving));
    assert!(!Stale.can_become(&Resolved("M".into())));
    assert!(!Unresolved.can_become(&Resolved("M".into())));
}

#[test]
fn test_concurrent_requests_share_one_decision() {
    let session = session(vec![
        set_a(),
        set_b(),
        main_using(ConstraintExpr::and([ConstraintExpr::id_equals("Data.Set"), is_quil()])),
    ]);
    let linker = session.linker();
    let picks: Vec<_> = (0..16)
        .into_par_iter()
        .map(|_| linker.resolve(&main_key()).map(|m| m.name.clone()))
        .collect();
    assert!(picks.iter().all(|p| p == &Ok(ModuleName::new("Set_A"))));
    assert_eq!(session.cache().get(&main_key()).map(|b| b.module), Some("Set_A".into()));
}
