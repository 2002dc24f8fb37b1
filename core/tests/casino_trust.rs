//! Casino-side trust engine tests: weight invariant, clamping, the fixed
//! event-to-category mapping, history bounds, explanations.

use std::sync::{Arc, Mutex};
use trust_core::{
    casino_trust::CasinoCategory,
    event::{EventPayload, EventType, LinkRisk},
    router::HistoryFilter,
    trust_engine::TrustEngine,
    EngineConfig, EventRouter,
};

fn build() -> (Arc<Mutex<TrustEngine>>, EventRouter) {
    let router = EventRouter::new();
    let engine = Arc::new(Mutex::new(
        TrustEngine::new(EngineConfig::default(), router.clone()).expect("build engine"),
    ));
    let subs = TrustEngine::attach(&engine, &router);
    // Subscriptions live for the whole test.
    std::mem::forget(subs);
    (engine, router)
}

fn weighted(categories: &trust_core::casino_trust::CategoryScores) -> f64 {
    CasinoCategory::ALL
        .iter()
        .map(|c| c.weight() * categories.get(*c))
        .sum::<f64>()
        .round()
}

/// score == round(Σ weight_i * category_i) after any sequence of updates.
#[test]
fn weight_invariant_holds_across_updates() {
    let (engine, _router) = build();
    let mut engine = engine.lock().unwrap();

    let updates = [
        (CasinoCategory::Fairness, -12.0),
        (CasinoCategory::Payout, 7.0),
        (CasinoCategory::Bonus, -25.5),
        (CasinoCategory::UserReport, 3.2),
        (CasinoCategory::Freespin, -90.0),
        (CasinoCategory::Compliance, 40.0),
        (CasinoCategory::Support, -4.0),
        (CasinoCategory::Fairness, 200.0),
    ];
    for (category, delta) in updates {
        engine.update_casino_score("Rollbit", category, delta, "test update", None);
        let record = engine.casino_record("rollbit").expect("record exists");
        assert_eq!(
            record.score,
            weighted(&record.categories),
            "weight invariant broken after {category:?} {delta:+}"
        );
        assert!((0.0..=100.0).contains(&record.score));
        for c in CasinoCategory::ALL {
            let v = record.categories.get(c);
            assert!((0.0..=100.0).contains(&v), "{c:?} out of range: {v}");
        }
    }
}

/// A 25% bonus nerf on a fresh casino strictly decreases the score from 75
/// and publishes trust.casino.updated.
#[test]
fn bonus_nerf_decreases_score() {
    let (engine, router) = build();

    router.publish(
        "bonus-tracker",
        EventPayload::BonusNerfDetected {
            casino_name: "stake".into(),
            bonus_type: "daily-reload".into(),
            previous_value: 100.0,
            new_value: 75.0,
            percent_drop: 0.25,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    let record = engine.casino_record("stake").expect("record created");
    assert!(
        record.score < 75.0,
        "score did not decrease: {}",
        record.score
    );
    // 25% drop -> severity 3 -> penalty 6 on the 0.15-weight bonus category.
    assert_eq!(record.categories.bonus, 69.0);
    assert_eq!(record.score, 74.0);

    let updates = router.history(&HistoryFilter {
        event_type: Some(EventType::CasinoTrustUpdated),
        ..HistoryFilter::default()
    });
    assert_eq!(updates.len(), 1);
    match &updates[0].data {
        EventPayload::CasinoTrustUpdated {
            previous_score,
            new_score,
            severity,
            ..
        } => {
            assert_eq!(*previous_score, 75.0);
            assert_eq!(*new_score, 74.0);
            assert_eq!(*severity, Some(3));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn link_flagged_hits_freespin_category() {
    let (engine, router) = build();

    router.publish(
        "link-scanner",
        EventPayload::LinkFlagged {
            url: "https://www.shadyspins.io/claim".into(),
            risk: LinkRisk::Critical,
            casino_name: None,
        },
        None,
        None,
    );
    router.publish(
        "link-scanner",
        EventPayload::LinkFlagged {
            url: "https://shadyspins.io/other".into(),
            risk: LinkRisk::Medium,
            casino_name: None,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    let record = engine.casino_record("shadyspins.io").expect("record");
    // -10 (critical) then -5.
    assert_eq!(record.categories.freespin, 60.0);
}

/// An unparseable URL is logged and dropped; no record appears.
#[test]
fn invalid_link_url_is_dropped() {
    let (engine, router) = build();

    router.publish(
        "link-scanner",
        EventPayload::LinkFlagged {
            url: "not a url at all".into(),
            risk: LinkRisk::Critical,
            casino_name: None,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    assert_eq!(engine.stats().casino_records, 0);
}

#[test]
fn casino_rollup_is_dampened_and_clamped() {
    let (engine, router) = build();

    // avg_delta 20 -> 20/2 = 10, clamped to +5 on bonus.
    router.publish(
        "aggregator",
        EventPayload::CasinoRollup {
            casino_name: "stake".into(),
            event_count: 40,
            avg_delta: 20.0,
            external_data: None,
        },
        None,
        None,
    );
    {
        let engine = engine.lock().unwrap();
        assert_eq!(
            engine.casino_record("stake").unwrap().categories.bonus,
            80.0
        );
    }

    // External per-category deltas apply directly.
    router.publish(
        "aggregator",
        EventPayload::CasinoRollup {
            casino_name: "stake".into(),
            event_count: 12,
            avg_delta: 0.0,
            external_data: Some(vec![("payout".into(), -4.0), ("support".into(), 2.0)]),
        },
        None,
        None,
    );
    let engine = engine.lock().unwrap();
    let record = engine.casino_record("stake").unwrap();
    assert_eq!(record.categories.payout, 71.0);
    assert_eq!(record.categories.support, 77.0);
}

#[test]
fn domain_rollup_hits_compliance() {
    let (engine, router) = build();

    // avg_delta -30 -> -10, clamped to -8 on compliance.
    router.publish(
        "aggregator",
        EventPayload::DomainRollup {
            domain: "stake.com".into(),
            event_count: 55,
            avg_delta: -30.0,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    let record = engine.casino_record("stake.com").unwrap();
    assert_eq!(record.categories.compliance, 67.0);
}

/// After >100 updates the history holds exactly the 100 most recent
/// entries in chronological order.
#[test]
fn history_is_bounded_and_chronological() {
    let (engine, _router) = build();
    let mut engine = engine.lock().unwrap();

    for i in 0..120 {
        let delta = if i % 2 == 0 { -1.0 } else { 1.0 };
        engine.update_casino_score("bc.game", CasinoCategory::Payout, delta, &format!("update {i}"), None);
    }

    let record = engine.casino_record("bc.game").unwrap();
    assert_eq!(record.history.len(), 100);
    assert_eq!(record.history.back().unwrap().reason, "update 119");
    assert_eq!(record.history.front().unwrap().reason, "update 20");
    let timestamps: Vec<i64> = record.history.iter().map(|e| e.timestamp).collect();
    let mut sorted = timestamps.clone();
    sorted.sort_unstable();
    assert_eq!(timestamps, sorted, "history out of chronological order");
}

#[test]
fn explanations_are_pure_views() {
    let (engine, _router) = build();
    let mut engine = engine.lock().unwrap();

    engine.update_casino_score("stake", CasinoCategory::Fairness, -60.0, "rigged RTP", Some(5));
    let before = engine.casino_record("stake").unwrap().score;

    let reasons = engine.explain_casino_score("stake");
    assert!(!reasons.is_empty());
    assert!(
        reasons.iter().any(|r| r.contains("fairness")),
        "no fairness reason in {reasons:?}"
    );

    assert_eq!(engine.casino_record("stake").unwrap().score, before);
    assert_eq!(
        engine.explain_casino_score("never-seen").len(),
        1,
        "unknown casinos get a default explanation"
    );
}
