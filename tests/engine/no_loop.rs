//! No-loop control attribute.
//!
//! A rule that updates a fact in its own matched tuple re-satisfies its
//! own condition. With no-loop the engine suppresses that self-inflicted
//! re-activation; without it the rule loops until stopped from outside.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use flintlock_engine::{Rule, RuleSet, Session, SessionConfig, StatelessSession};
use flintlock_foundation::{ErrorKind, Interner, KeywordId};
use flintlock_store::Fact;

use crate::support::MatchCounter;

struct GiftWorld {
    gift: KeywordId,
    description: KeywordId,
    recipient: KeywordId,
}

fn gift_world(interner: &mut Interner) -> GiftWorld {
    GiftWorld {
        gift: interner.intern_keyword("gift"),
        description: interner.intern_keyword("description"),
        recipient: interner.intern_keyword("recipient"),
    }
}

fn chocolates_for_john(world: &GiftWorld) -> Fact {
    Fact::new(world.gift)
        .with_field(world.description, "Chocolates")
        .with_field(world.recipient, "John")
}

/// The redirect rule: any chocolates gift gets its recipient set to "me".
/// The update re-satisfies the condition, so no-loop decides whether it
/// fires once or forever.
fn redirect_rule(world: &GiftWorld, no_loop: bool) -> Rule {
    let description = world.description;
    let recipient = world.recipient;
    Rule::new("keep-the-chocolates", [world.gift])
        .when(move |facts| Ok(facts[0].field_str(description)? == "Chocolates"))
        .then(move |ctx| {
            let updated = ctx.fact(0)?.clone().with_field(recipient, "me");
            ctx.update_slot(0, updated)
        })
        .with_no_loop(no_loop)
}

#[test]
fn no_loop_enabled_fires_exactly_once_stateless() {
    let mut interner = Interner::new();
    let world = gift_world(&mut interner);

    let rules = RuleSet::new()
        .with_rule(redirect_rule(&world, true))
        .unwrap();

    let session = StatelessSession::new(rules, &SessionConfig::new());
    let (listener, matches) = MatchCounter::new();
    session.add_listener(listener);

    let fired = session.execute([chocolates_for_john(&world)]).unwrap();

    assert_eq!(fired, 1);
    assert_eq!(matches.load(Ordering::SeqCst), 1);
}

#[test]
fn no_loop_enabled_fires_exactly_once_stateful() {
    let mut interner = Interner::new();
    let world = gift_world(&mut interner);

    let rules = RuleSet::new()
        .with_rule(redirect_rule(&world, true))
        .unwrap();

    let session = Session::new(rules, &SessionConfig::new());
    let (listener, matches) = MatchCounter::new();
    session.add_listener(listener).unwrap();

    let handle = session.insert(chocolates_for_john(&world)).unwrap();
    let fired = session.fire_all_rules().unwrap();

    assert_eq!(fired, 1);
    assert_eq!(matches.load(Ordering::SeqCst), 1);
    assert_eq!(
        session
            .fact(handle)
            .unwrap()
            .field_str(world.recipient)
            .unwrap(),
        "me"
    );
    session.dispose();
}

/// Without no-loop the rule keeps re-triggering itself. The session is
/// disposed from another thread, which stops the in-flight cycle at its
/// next loop check.
#[test]
fn no_loop_disabled_loops_until_disposed() {
    let mut interner = Interner::new();
    let world = gift_world(&mut interner);

    let rules = RuleSet::new()
        .with_rule(redirect_rule(&world, false))
        .unwrap();

    let session = Session::new(rules, &SessionConfig::new());
    let (listener, matches) = MatchCounter::new();
    session.add_listener(listener).unwrap();
    session.insert(chocolates_for_john(&world)).unwrap();

    let worker = {
        let session = session.clone();
        thread::spawn(move || session.fire_all_rules())
    };

    // Wait until the unbounded cycle has demonstrably re-triggered itself.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while matches.load(Ordering::SeqCst) <= 1 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(matches.load(Ordering::SeqCst) > 1);

    session.dispose();
    let fired = worker.join().expect("worker thread").unwrap();
    assert!(fired > 1);

    // The disposed session rejects everything afterwards.
    assert!(matches!(
        session.fact_count().unwrap_err().kind,
        ErrorKind::SessionDisposed
    ));
}

/// The same runaway rule under a configured activation cap: the cycle
/// aborts with a limit error instead of spinning forever.
#[test]
fn no_loop_disabled_trips_configured_cap() {
    let mut interner = Interner::new();
    let world = gift_world(&mut interner);

    let rules = RuleSet::new()
        .with_rule(redirect_rule(&world, false))
        .unwrap();

    let config = SessionConfig::new().with_max_activations(100);
    let session = StatelessSession::new(rules, &config);
    let (listener, matches) = MatchCounter::new();
    session.add_listener(listener);

    let err = session.execute([chocolates_for_john(&world)]).unwrap_err();

    assert!(matches!(
        err.kind,
        ErrorKind::ActivationLimitExceeded { limit: 100 }
    ));
    assert!(matches.load(Ordering::SeqCst) > 1);
}

/// An action that never tells working memory about a change does not
/// re-trigger anything: without an update there is no new match, so the
/// rule fires once even with no-loop disabled.
#[test]
fn no_update_means_no_loop_even_when_disabled() {
    let mut interner = Interner::new();
    let world = gift_world(&mut interner);
    let description = world.description;

    let rules = RuleSet::new()
        .with_rule(
            Rule::new("read-only", [world.gift])
                .when(move |facts| Ok(facts[0].field_str(description)? == "Chocolates"))
                .then(|ctx| {
                    // Builds a modified copy but never calls update.
                    let _ = ctx.fact(0)?.clone();
                    Ok(())
                }),
        )
        .unwrap();

    let session = Session::new(rules, &SessionConfig::new());
    let (listener, matches) = MatchCounter::new();
    session.add_listener(listener).unwrap();

    let handle = session.insert(chocolates_for_john(&world)).unwrap();
    let fired = session.fire_all_rules().unwrap();

    assert_eq!(fired, 1);
    assert_eq!(matches.load(Ordering::SeqCst), 1);
    // Working memory still holds the original value.
    assert_eq!(
        session
            .fact(handle)
            .unwrap()
            .field_str(world.recipient)
            .unwrap(),
        "John"
    );
    session.dispose();
}

/// No-loop only suppresses the rule's own re-match. An unrelated rule
/// updating the same fact still re-activates it.
#[test]
fn no_loop_does_not_shield_against_other_rules() {
    let mut interner = Interner::new();
    let world = gift_world(&mut interner);
    let description = world.description;
    let recipient = world.recipient;
    let wrapped = interner.intern_keyword("wrapped");

    let rules = RuleSet::new()
        .with_rule(redirect_rule(&world, true).with_salience(10))
        .unwrap()
        .with_rule(
            // Lower salience: runs after the redirect, updates the same
            // fact, and hands the redirect rule a fresh match.
            Rule::new("wrap-the-gift", [world.gift])
                .when(move |facts| {
                    Ok(facts[0].field_str(description)? == "Chocolates"
                        && facts[0].get(wrapped).is_none())
                })
                .then(move |ctx| {
                    let updated = ctx
                        .fact(0)?
                        .clone()
                        .with_field(recipient, "John")
                        .with_field(wrapped, true);
                    ctx.update_slot(0, updated)
                })
                .with_no_loop(true),
        )
        .unwrap();

    let session = Session::new(rules, &SessionConfig::new());
    let handle = session.insert(chocolates_for_john(&world)).unwrap();
    let fired = session.fire_all_rules().unwrap();

    // redirect, then wrap, then redirect again on the wrapped fact.
    assert_eq!(fired, 3);
    assert_eq!(
        session
            .fact(handle)
            .unwrap()
            .field_str(world.recipient)
            .unwrap(),
        "me"
    );
    session.dispose();
}
