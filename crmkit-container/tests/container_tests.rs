use crmkit_container::{
    Constructor, Container, ContainerError, ImplementationCatalog, Injectable, Override,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Fixtures ──────────────────────────────────────────────────────

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

impl Injectable for English {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(English))]
    }
}

struct Norwegian;

impl Greeter for Norwegian {
    fn greet(&self) -> String {
        "hei".to_string()
    }
}

impl Injectable for Norwegian {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(Norwegian))]
    }
}

struct Fixed(&'static str);

impl Greeter for Fixed {
    fn greet(&self) -> String {
        self.0.to_string()
    }
}

/// Depends on a service and a plain value.
struct Welcome {
    greeter: Arc<dyn Greeter>,
    punctuation: Arc<String>,
}

impl Welcome {
    fn render(&self) -> String {
        format!("{}{}", self.greeter.greet(), self.punctuation)
    }
}

impl Injectable for Welcome {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| {
            Ok(Welcome {
                greeter: deps.resolve("greeter")?,
                punctuation: deps.resolve("punctuation")?,
            })
        })]
    }
}

/// Depends on `Welcome`, to check overrides are not transitive.
struct Banner {
    welcome: Arc<Welcome>,
}

impl Injectable for Banner {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|deps| {
            Ok(Banner {
                welcome: deps.resolve_concrete("welcome")?,
            })
        })]
    }
}

struct TwoWays;

impl Injectable for TwoWays {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::new(|_| Ok(TwoWays)),
            Constructor::new(|_| Ok(TwoWays)),
        ]
    }
}

fn make_container() -> Container {
    Container::with_catalog(Arc::new(ImplementationCatalog::new()))
}

// ── Registrations ─────────────────────────────────────────────────

#[test]
fn factory_registration_wins_over_catalog() {
    let container = make_container();
    container
        .catalog()
        .provide::<dyn Greeter, English>(|i| i);
    container
        .register_factory::<dyn Greeter, _>(|| Arc::new(Fixed("from factory")))
        .unwrap();

    for _ in 0..3 {
        assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "from factory");
    }
}

#[test]
fn factory_runs_on_every_resolve() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = make_container();
    let counter = Arc::clone(&calls);
    container
        .register_factory::<dyn Greeter, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(English)
        })
        .unwrap();

    container.resolve::<dyn Greeter>().unwrap();
    container.resolve::<dyn Greeter>().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn singleton_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = make_container();
    let counter = Arc::clone(&calls);
    container
        .register_singleton::<dyn Greeter, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(English)
        })
        .unwrap();

    let a = container.resolve::<dyn Greeter>().unwrap();
    let b = container.resolve::<dyn Greeter>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn instance_registration_returns_same_arc() {
    let container = make_container();
    let shared: Arc<dyn Greeter> = Arc::new(Norwegian);
    container.register_instance(Arc::clone(&shared)).unwrap();

    let resolved = container.resolve::<dyn Greeter>().unwrap();
    assert!(Arc::ptr_eq(&resolved, &shared));
    assert!(container.is_registered::<dyn Greeter>());
}

#[test]
fn implementation_registration_constructs() {
    let container = make_container();
    container
        .register_implementation::<dyn Greeter, Norwegian>(|i| i)
        .unwrap();
    assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hei");
}

#[test]
fn duplicate_registration_is_rejected() {
    let container = make_container();
    container.register_instance::<String>(Arc::new("a".into())).unwrap();
    let err = container
        .register_instance::<String>(Arc::new("b".into()))
        .unwrap_err();
    assert!(matches!(err, ContainerError::DuplicateRegistration { .. }));
}

#[test]
fn clear_drops_registrations() {
    let container = make_container();
    container.register_instance::<String>(Arc::new("a".into())).unwrap();
    container.clear();
    assert!(!container.is_registered::<String>());
}

// ── Catalog fallback ──────────────────────────────────────────────

#[test]
fn single_catalog_candidate_is_used() {
    let container = make_container();
    container
        .catalog()
        .provide::<dyn Greeter, Norwegian>(|i| i);
    assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hei");
    assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hei");
}

#[test]
fn providing_same_implementation_twice_is_not_ambiguous() {
    let catalog = Arc::new(ImplementationCatalog::new());
    catalog.provide::<dyn Greeter, English>(|i| i);
    catalog.provide::<dyn Greeter, English>(|i| i);
    assert_eq!(catalog.candidate_count::<dyn Greeter>(), 1);
}

#[test]
fn ambiguous_catalog_is_an_error() {
    let container = make_container();
    container
        .catalog()
        .provide::<dyn Greeter, English>(|i| i);
    container
        .catalog()
        .provide::<dyn Greeter, Norwegian>(|i| i);

    let err = container.resolve::<dyn Greeter>().err().unwrap();
    match err {
        ContainerError::AmbiguousImplementation { candidates, .. } => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn concurrent_first_lookups_settle_on_one_memoized_choice() {
    let catalog = Arc::new(ImplementationCatalog::new());
    catalog.provide::<dyn Greeter, Norwegian>(|i| i);
    assert_eq!(catalog.chosen::<dyn Greeter>(), None);

    let greetings: Vec<String> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                scope.spawn(move || {
                    let container = Container::with_catalog(catalog);
                    container.resolve::<dyn Greeter>().unwrap().greet()
                })
            })
            .collect();
        workers.into_iter().map(|worker| worker.join().unwrap()).collect()
    });

    assert_eq!(greetings, vec!["hei".to_string(); 8]);
    assert!(catalog.chosen::<dyn Greeter>().unwrap().ends_with("Norwegian"));
}

#[test]
fn providing_a_second_implementation_discards_the_memoized_choice() {
    let catalog = Arc::new(ImplementationCatalog::new());
    catalog.provide::<dyn Greeter, Norwegian>(|i| i);
    let container = Container::with_catalog(Arc::clone(&catalog));
    assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hei");
    assert!(catalog.chosen::<dyn Greeter>().is_some());

    catalog.provide::<dyn Greeter, English>(|i| i);
    assert_eq!(catalog.chosen::<dyn Greeter>(), None);

    let err = container.resolve::<dyn Greeter>().err().unwrap();
    match err {
        ContainerError::AmbiguousImplementation { candidates, .. } => {
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(catalog.chosen::<dyn Greeter>(), None);
}

#[test]
fn unknown_service_is_unresolvable() {
    let container = make_container();
    let err = container.resolve::<dyn Greeter>().err().unwrap();
    assert!(matches!(err, ContainerError::Unresolvable { .. }));
    assert!(err.to_string().contains("Greeter"));
}

// ── Construction ──────────────────────────────────────────────────

#[test]
fn two_constructors_is_a_configuration_error() {
    let container = make_container();
    let err = container.construct::<TwoWays>(&[]).err().unwrap();
    match &err {
        ContainerError::ConstructorCount { implementation, count } => {
            assert!(implementation.contains("TwoWays"));
            assert_eq!(*count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn concrete_types_are_constructed_directly() {
    let container = make_container();
    container
        .register_implementation::<dyn Greeter, English>(|i| i)
        .unwrap();
    container.register_instance(Arc::new("!".to_string())).unwrap();

    let welcome = container.resolve_concrete::<Welcome>(&[]).unwrap();
    assert_eq!(welcome.render(), "hello!");
}

#[test]
fn missing_parameter_names_the_parameter() {
    let container = make_container();
    container.register_instance(Arc::new("!".to_string())).unwrap();

    let err = container.construct::<Welcome>(&[]).err().unwrap();
    match &err {
        ContainerError::Dependency { parameter, .. } => assert_eq!(parameter, "greeter"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root_cause(), ContainerError::Unresolvable { .. }));
}

// ── Overrides ─────────────────────────────────────────────────────

#[test]
fn named_override_is_case_insensitive() {
    let container = make_container();
    container.register_instance(Arc::new("!".to_string())).unwrap();

    let greeter: Arc<dyn Greeter> = Arc::new(Fixed("howdy"));
    let welcome = container
        .construct::<Welcome>(&[Override::named("GREETER", greeter)])
        .unwrap();
    assert_eq!(welcome.render(), "howdy!");
}

#[test]
fn typed_override_replaces_registration() {
    let container = make_container();
    container
        .register_implementation::<dyn Greeter, English>(|i| i)
        .unwrap();
    container.register_instance(Arc::new("!".to_string())).unwrap();

    let welcome = container
        .construct::<Welcome>(&[Override::typed(Arc::new("?".to_string()))])
        .unwrap();
    assert_eq!(welcome.render(), "hello?");
}

#[test]
fn override_of_wrong_type_is_a_binding_error() {
    let container = make_container();
    container.register_instance(Arc::new("!".to_string())).unwrap();

    let err = container
        .construct::<Welcome>(&[Override::named("greeter", Arc::new(5_u32))])
        .err()
        .unwrap();
    assert!(matches!(err, ContainerError::ParameterBinding { ref parameter, .. } if parameter == "greeter"));
    assert!(err.to_string().starts_with("Could not resolve constructor parameter properly"));
}

#[test]
fn two_matching_overrides_is_a_binding_error() {
    let container = make_container();
    let err = container
        .construct::<Welcome>(&[
            Override::named("punctuation", Arc::new("!".to_string())),
            Override::typed(Arc::new("?".to_string())),
            Override::typed::<dyn Greeter>(Arc::new(English)),
        ])
        .err()
        .unwrap();
    assert!(matches!(err, ContainerError::ParameterBinding { .. }));
}

#[test]
fn overrides_do_not_reach_nested_constructors() {
    let container = make_container();
    container
        .register_implementation::<dyn Greeter, English>(|i| i)
        .unwrap();
    container.register_instance(Arc::new("!".to_string())).unwrap();

    let banner = container
        .construct::<Banner>(&[Override::typed::<dyn Greeter>(Arc::new(Fixed("ignored")))])
        .unwrap();
    assert_eq!(banner.welcome.render(), "hello!");
}

#[test]
fn overrides_flow_through_implementation_registrations() {
    struct Loud {
        inner: Arc<String>,
    }
    impl Greeter for Loud {
        fn greet(&self) -> String {
            self.inner.to_uppercase()
        }
    }
    impl Injectable for Loud {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|deps| Ok(Loud { inner: deps.resolve("inner")? }))]
        }
    }

    let container = make_container();
    container
        .register_implementation::<dyn Greeter, Loud>(|i| i)
        .unwrap();
    let greeter = container
        .resolve_with::<dyn Greeter>(&[Override::named("inner", Arc::new("quiet".to_string()))])
        .unwrap();
    assert_eq!(greeter.greet(), "QUIET");
}

// ── Weak handles ──────────────────────────────────────────────────

#[test]
fn weak_container_upgrades_while_alive() {
    let container = make_container();
    container.register_instance(Arc::new(7_u32)).unwrap();
    let weak = container.downgrade();

    assert_eq!(*weak.upgrade().unwrap().resolve::<u32>().unwrap(), 7);
    drop(container);
    assert!(matches!(weak.upgrade(), Err(ContainerError::Disposed)));
}
