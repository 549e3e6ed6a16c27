//! Session lifecycle, globals, fact-handle filtering, and failure modes.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use flintlock_engine::{AgendaEvent, Rule, RuleSet, Session, SessionConfig, StatelessSession};
use flintlock_foundation::{Error, ErrorKind, Interner, KeywordId};
use flintlock_store::Fact;

use crate::support::MatchCounter;

type Sink = Arc<Mutex<Vec<String>>>;

// =============================================================================
// Discounts and Potential Customers
// =============================================================================

struct ShopWorld {
    purchase: KeywordId,
    customer: KeywordId,
    subtotal: KeywordId,
    payment: KeywordId,
    discount: KeywordId,
    cash: KeywordId,
    credit: KeywordId,
    debit: KeywordId,
    potential_customer: KeywordId,
    credit_limit: KeywordId,
}

fn shop_world(interner: &mut Interner) -> ShopWorld {
    ShopWorld {
        purchase: interner.intern_keyword("purchase"),
        customer: interner.intern_keyword("customer"),
        subtotal: interner.intern_keyword("subtotal"),
        payment: interner.intern_keyword("payment"),
        discount: interner.intern_keyword("discount"),
        cash: interner.intern_keyword("payment/cash"),
        credit: interner.intern_keyword("payment/credit"),
        debit: interner.intern_keyword("payment/debit"),
        potential_customer: interner.intern_keyword("potential-customer"),
        credit_limit: interner.intern_keyword("credit-limit"),
    }
}

fn purchase(world: &ShopWorld, customer: &str, subtotal: f64, payment: KeywordId) -> Fact {
    Fact::new(world.purchase)
        .with_field(world.customer, customer)
        .with_field(world.subtotal, subtotal)
        .with_field(world.payment, payment)
}

/// Card purchases earn a discount; a customer with two cash purchases
/// summing past the threshold becomes a potential customer and gets a
/// credit-card offer through the injected mailer.
fn shop_rules(world: &ShopWorld) -> RuleSet {
    let ShopWorld {
        payment,
        discount,
        credit,
        debit,
        customer,
        subtotal,
        cash,
        potential_customer,
        credit_limit,
        ..
    } = *world;

    let card_discount = |name: &str, method: KeywordId, rate: f64| {
        Rule::new(name, [world.purchase])
            .when(move |facts| Ok(facts[0].field_keyword(payment)? == method))
            .then(move |ctx| {
                let updated = ctx.fact(0)?.clone().with_field(discount, rate);
                ctx.update_slot(0, updated)
            })
            .with_no_loop(true)
    };

    RuleSet::new()
        .with_rule(card_discount("credit-card-discount", credit, 0.1))
        .unwrap()
        .with_rule(card_discount("debit-card-discount", debit, 0.05))
        .unwrap()
        .with_rule(
            Rule::new("identify-potential-customer", [world.purchase, world.purchase])
                .with_globals(["mailer"])
                .when(move |facts| {
                    let (a, b) = (&facts[0], &facts[1]);
                    Ok(a.field_keyword(payment)? == cash
                        && b.field_keyword(payment)? == cash
                        && a.field_str(customer)? == b.field_str(customer)?
                        && a.field_float(subtotal)? < b.field_float(subtotal)?
                        && a.field_float(subtotal)? + b.field_float(subtotal)? >= 700.0)
                })
                .then(move |ctx| {
                    let name = ctx.fact(0)?.field_str(customer)?.to_string();
                    ctx.insert(
                        Fact::new(potential_customer)
                            .with_field(customer, name.as_str())
                            .with_field(credit_limit, 3000.0),
                    );
                    let mailer = ctx.global::<Mutex<Vec<String>>>("mailer")?;
                    mailer.lock().unwrap().push(name);
                    Ok(())
                }),
        )
        .unwrap()
}

#[test]
fn discounts_and_potential_customers() {
    let mut interner = Interner::new();
    let world = shop_world(&mut interner);

    let session = Session::new(shop_rules(&world), &SessionConfig::new());
    let mailer: Sink = Arc::new(Mutex::new(Vec::new()));
    session.set_global("mailer", mailer.clone()).unwrap();

    session
        .insert(purchase(&world, "john", 350.0, world.cash))
        .unwrap();
    session
        .insert(purchase(&world, "mary", 250.0, world.cash))
        .unwrap();
    session
        .insert(purchase(&world, "john", 400.0, world.cash))
        .unwrap();
    let george = session
        .insert(purchase(&world, "george", 500.0, world.credit))
        .unwrap();
    let john_debit = session
        .insert(purchase(&world, "john", 500.0, world.debit))
        .unwrap();

    // Rules have not fired: no discounts, no potential customers.
    assert!(session.fact(george).unwrap().get(world.discount).is_none());
    assert!(
        session
            .fact_handles(Some(world.potential_customer))
            .unwrap()
            .is_empty()
    );

    let fired = session.fire_all_rules().unwrap();
    assert_eq!(fired, 3);

    // Card purchases earned their discounts.
    assert!(
        (session
            .fact(george)
            .unwrap()
            .field_float(world.discount)
            .unwrap()
            - 0.1)
            .abs()
            < f64::EPSILON
    );
    assert!(
        (session
            .fact(john_debit)
            .unwrap()
            .field_float(world.discount)
            .unwrap()
            - 0.05)
            .abs()
            < f64::EPSILON
    );

    // Exactly one potential customer was inserted, for john.
    let hits = session
        .fact_handles(Some(world.potential_customer))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        session
            .fact(hits[0])
            .unwrap()
            .field_str(world.customer)
            .unwrap(),
        "john"
    );
    assert_eq!(*mailer.lock().unwrap(), vec!["john"]);
    session.dispose();
}

// =============================================================================
// Globals
// =============================================================================

#[test]
fn declared_global_missing_fails_stateless_execute() {
    let mut interner = Interner::new();
    let world = shop_world(&mut interner);

    let session = StatelessSession::new(shop_rules(&world), &SessionConfig::new());
    // "mailer" was never supplied.
    let err = session
        .execute([purchase(&world, "john", 350.0, world.cash)])
        .unwrap_err();

    assert!(matches!(
        err.kind,
        ErrorKind::UnresolvedGlobal { ref name } if name == "mailer"
    ));
}

// =============================================================================
// Listener Failures
// =============================================================================

#[test]
fn listener_error_aborts_fire_cycle() {
    let mut interner = Interner::new();
    let text = interner.intern_keyword("text");

    let rules = RuleSet::new()
        .with_rule(Rule::new("noop", [text]))
        .unwrap();
    let session = Session::new(rules, &SessionConfig::new());
    session
        .add_listener(|event: &AgendaEvent| {
            if matches!(event, AgendaEvent::BeforeFire { .. }) {
                return Err(Error::internal("listener exploded"));
            }
            Ok(())
        })
        .unwrap();

    session.insert(Fact::new(text)).unwrap();

    let err = session.fire_all_rules().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Internal(_)));
    session.dispose();
}

#[test]
fn removed_listener_stops_receiving_events() {
    let mut interner = Interner::new();
    let text = interner.intern_keyword("text");

    let rules = RuleSet::new()
        .with_rule(Rule::new("noop", [text]))
        .unwrap();
    let session = Session::new(rules, &SessionConfig::new());

    let (listener, matches) = MatchCounter::new();
    let id = session.add_listener(listener).unwrap();
    session.remove_listener(id).unwrap();
    session.remove_listener(id).unwrap(); // idempotent

    session.insert(Fact::new(text)).unwrap();
    session.fire_all_rules().unwrap();

    assert_eq!(matches.load(Ordering::SeqCst), 0);
    session.dispose();
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn disposed_session_rejects_every_operation() {
    let mut interner = Interner::new();
    let text = interner.intern_keyword("text");

    let rules = RuleSet::new()
        .with_rule(Rule::new("noop", [text]))
        .unwrap();
    let session = Session::new(rules, &SessionConfig::new());
    let handle = session.insert(Fact::new(text)).unwrap();

    session.dispose();
    session.dispose(); // idempotent

    assert!(matches!(
        session.insert(Fact::new(text)).unwrap_err().kind,
        ErrorKind::SessionDisposed
    ));
    assert!(matches!(
        session.fact(handle).unwrap_err().kind,
        ErrorKind::SessionDisposed
    ));
    assert!(matches!(
        session.fact_handles(None).unwrap_err().kind,
        ErrorKind::SessionDisposed
    ));
    assert!(matches!(
        session.retract(handle).unwrap_err().kind,
        ErrorKind::SessionDisposed
    ));
    assert!(matches!(
        session.fire_all_rules().unwrap_err().kind,
        ErrorKind::SessionDisposed
    ));
}

#[test]
fn retracted_handle_is_invalid_through_the_session() {
    let mut interner = Interner::new();
    let text = interner.intern_keyword("text");

    let rules = RuleSet::new()
        .with_rule(Rule::new("noop", [text]))
        .unwrap();
    let session = Session::new(rules, &SessionConfig::new());

    let handle = session.insert(Fact::new(text)).unwrap();
    session.retract(handle).unwrap();

    assert!(matches!(
        session.retract(handle).unwrap_err().kind,
        ErrorKind::InvalidHandle(_)
    ));
    assert!(matches!(
        session.update(handle, Fact::new(text)).unwrap_err().kind,
        ErrorKind::InvalidHandle(_)
    ));
    session.dispose();
}

#[test]
fn stateless_execute_starts_from_fresh_memory_every_time() {
    let mut interner = Interner::new();
    let text = interner.intern_keyword("text");

    let rules = RuleSet::new()
        .with_rule(Rule::new("noop", [text]))
        .unwrap();
    let session = StatelessSession::new(rules, &SessionConfig::new());
    let (listener, matches) = MatchCounter::new();
    session.add_listener(listener);

    assert_eq!(session.execute([Fact::new(text)]).unwrap(), 1);
    assert_eq!(session.execute([Fact::new(text)]).unwrap(), 1);

    // Listeners persist across executes; working memory does not: each
    // run created exactly one match of its own.
    assert_eq!(matches.load(Ordering::SeqCst), 2);
}

#[test]
fn independent_sessions_share_nothing() {
    let mut interner = Interner::new();
    let text = interner.intern_keyword("text");
    let label = interner.intern_keyword("label");

    let rules = || {
        RuleSet::new()
            .with_rule(Rule::new("noop", [text]))
            .unwrap()
    };

    let a = Session::new(rules(), &SessionConfig::new());
    let b = Session::new(rules(), &SessionConfig::new());

    a.insert(Fact::new(text).with_field(label, "a")).unwrap();

    assert_eq!(a.fact_count().unwrap(), 1);
    assert_eq!(b.fact_count().unwrap(), 0);

    // Disposing one session leaves the other fully usable.
    a.dispose();
    b.insert(Fact::new(text).with_field(label, "b")).unwrap();
    assert_eq!(b.fire_all_rules().unwrap(), 1);
    b.dispose();
}
