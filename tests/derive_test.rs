//! `#[derive(Capability)]` and the declarative construction macros.

use std::sync::Arc;

use tola_compose::prelude::*;
use tola_compose::{compose, contracts, tags};

#[derive(Debug)]
struct Order {
    total: u64,
}

struct Ticket;

trait Priced: Send + Sync {
    fn price(&self) -> u64;
}

trait Audited: Send + Sync {
    fn label(&self) -> &'static str;
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum Stage {
    Pricing,
    Fulfilment,
}

// ============================================================================
// Derived capabilities
// ============================================================================

/// Generic over every subject; no hooks.
#[derive(Capability)]
struct Plain;

#[derive(Capability)]
#[capability(subject = Order, primary)]
struct Checkout;

#[derive(Capability)]
#[capability(subject = Order, order = -3, tags("audit", Stage::Pricing))]
struct Audit;

impl Audited for Audit {
    fn label(&self) -> &'static str {
        "audit"
    }
}

#[derive(Capability)]
#[capability(subject = Order, contracts(dyn Priced, dyn Audited))]
struct Standard {
    #[capability(order)]
    rank: i32,
    #[capability(tags)]
    tags: Vec<Tag>,
}

impl Priced for Standard {
    fn price(&self) -> u64 {
        10
    }
}

impl Audited for Standard {
    fn label(&self) -> &'static str {
        "standard"
    }
}

#[derive(Capability)]
#[capability(contracts(dyn Priced))]
struct Express(#[capability(order)] Option<i32>);

impl Priced for Express {
    fn price(&self) -> u64 {
        25
    }
}

#[derive(Capability)]
#[capability(subject = Order)]
#[capability(order = 7)]
enum Mode {
    Fast,
    #[allow(dead_code)]
    Slow,
}

#[test]
fn test_plain_has_default_hooks() {
    let plain: &dyn Capability<Order> = &Plain;
    assert_eq!(plain.order(), None);
    assert!(!plain.is_primary());
    assert!(plain.tags().is_empty());

    // Same type works for another subject.
    let other: &dyn Capability<Ticket> = &Plain;
    assert!(!other.is_primary());
}

#[test]
fn test_container_hooks() {
    assert!(Checkout.is_primary());
    assert_eq!(Capability::<Order>::order(&Audit), Some(-3));
    assert_eq!(Audit.tags(), &[Tag::new("audit"), Tag::new(Stage::Pricing)]);
    assert_eq!(Mode::Fast.order(), Some(7));
}

#[test]
fn test_static_tags_are_shared() {
    let first = Audit.tags().as_ptr();
    let second = Audit.tags().as_ptr();
    assert_eq!(first, second);
}

#[test]
fn test_field_hooks() {
    let standard = Standard {
        rank: 4,
        tags: tags![Stage::Fulfilment],
    };
    assert_eq!(standard.order(), Some(4));
    assert_eq!(standard.tags(), &[Tag::new(Stage::Fulfilment)]);

    assert_eq!(Capability::<Order>::order(&Express(Some(2))), Some(2));
    assert_eq!(Capability::<Order>::order(&Express(None)), None);
}

#[test]
fn test_derived_contracts_register() {
    let mut composer = Composer::new(Order { total: 0 });
    composer
        .add(Checkout)
        .unwrap()
        .add(Audit)
        .unwrap()
        .add_as_all(
            Standard { rank: 1, tags: tags!["audit"] },
            contracts![dyn Priced, dyn Audited],
        )
        .unwrap()
        .add_as::<dyn Priced, _>(Express(Some(0)))
        .unwrap();
    let composition = composer.build().unwrap();

    let prices: Vec<u64> = composition.get_all::<dyn Priced>().iter().map(|p| p.price()).collect();
    assert_eq!(prices, vec![25, 10]);
    assert_eq!(composition.get_all::<dyn Audited>()[0].label(), "standard");
    assert!(composition.try_get_primary_as::<Checkout>().is_some());

    let audited: Vec<&'static str> = composition
        .capabilities_by_tag(&Tag::new("audit"))
        .iter()
        .map(|r| r.type_name())
        .collect();
    assert_eq!(audited.len(), 2);
    assert!(audited[0].ends_with("Audit"));
}

#[test]
fn test_upcast_shares_allocation() {
    let standard = Arc::new(Standard { rank: 0, tags: Vec::new() });
    let priced = Implements::<dyn Priced>::upcast(standard.clone());
    assert_eq!(
        Arc::as_ptr(&standard) as *const (),
        Arc::as_ptr(&priced) as *const ()
    );
}

// ============================================================================
// Declarative macros
// ============================================================================

#[test]
fn test_contracts_macro_lists_keys() {
    let list: Contracts<Order, Standard> = contracts![dyn Priced, dyn Audited];
    assert_eq!(list.len(), 2);
    assert!(!list.contains_primary());

    let with_primary: Contracts<Order, Checkout> = contracts![Checkout; primary];
    assert_eq!(with_primary.len(), 2);
    assert!(with_primary.contains_primary());

    let empty: Contracts<Order, Checkout> = contracts![];
    assert!(empty.is_empty());
}

#[test]
fn test_compose_macro_builds() {
    let composition = compose!(Order { total: 99 } => {
        Audit,
        Standard { rank: 2, tags: Vec::new() } => [dyn Priced],
        Checkout,
    })
    .unwrap();

    assert_eq!(composition.subject().total, 99);
    assert_eq!(composition.len(), 3);
    assert!(composition.has::<Audit>());
    assert!(composition.has::<dyn Priced>());
    assert!(!composition.has::<Standard>());
    assert!(composition.has_primary());
}

#[test]
fn test_compose_macro_propagates_errors() {
    #[derive(Capability)]
    #[capability(subject = Order, primary)]
    struct Other;

    let result = compose!(Order { total: 1 } => { Checkout, Other });
    assert!(matches!(result, Err(ComposeError::DuplicatePrimary { .. })));
}

#[test]
fn test_tags_macro() {
    let tags = tags!["a", 1u8, Stage::Pricing];
    assert_eq!(tags.len(), 3);
    assert!(tags[1].is::<u8>());
    assert_eq!(tags[2].downcast_ref::<Stage>(), Some(&Stage::Pricing));
    assert!(tags![].is_empty());
}
