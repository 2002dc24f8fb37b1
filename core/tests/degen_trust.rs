//! Degen-side trust engine tests: component formula, event mapping,
//! tilt recovery, cross-domain isolation.

use std::sync::{Arc, Mutex};
use trust_core::{
    degen_trust::DegenCategory,
    event::{EventPayload, EventType},
    router::HistoryFilter,
    trust_engine::TrustEngine,
    AnomalySeverity, EngineConfig, EventRouter,
};

fn build() -> (Arc<Mutex<TrustEngine>>, EventRouter) {
    let router = EventRouter::new();
    let engine = Arc::new(Mutex::new(
        TrustEngine::new(EngineConfig::default(), router.clone()).expect("build engine"),
    ));
    let subs = TrustEngine::attach(&engine, &router);
    std::mem::forget(subs);
    (engine, router)
}

#[test]
fn tip_rewards_both_sides() {
    let (engine, router) = build();

    router.publish(
        "tip-bot",
        EventPayload::TipCompleted {
            from_user: "alice".into(),
            to_user: "bob".into(),
            amount: 150.0,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    let alice = engine.degen_record("alice").expect("sender record");
    let bob = engine.degen_record("bob").expect("recipient record");

    // Sender: +1 behavior, plus +2 accountability for a tip over 100.
    assert_eq!(alice.behavior_score, 71.0);
    assert_eq!(alice.accountability_bonus, 2.0);
    assert_eq!(alice.score, 73.0);

    // Recipient: +0.5 behavior only.
    assert_eq!(bob.behavior_score, 70.5);
    assert_eq!(bob.score, 70.5);
}

#[test]
fn small_tip_grants_no_accountability() {
    let (engine, router) = build();

    router.publish(
        "tip-bot",
        EventPayload::TipCompleted {
            from_user: "alice".into(),
            to_user: "bob".into(),
            amount: 20.0,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    assert_eq!(engine.degen_record("alice").unwrap().accountability_bonus, 0.0);
}

#[test]
fn tilt_event_schedules_recovery() {
    let (engine, router) = build();

    router.publish(
        "tilt-watch",
        EventPayload::TiltDetected {
            user_id: "carol".into(),
            severity: 3,
            indicators: vec!["loss-chasing".into(), "stake-escalation".into()],
        },
        Some("carol".into()),
        None,
    );

    let engine = engine.lock().unwrap();
    let carol = engine.degen_record("carol").unwrap();
    assert_eq!(carol.tilt_indicators, 3.0);
    assert_eq!(carol.score, 55.0); // 70 - min(30, 3*5)
    let scheduled = carol.recovery_scheduled_at.expect("recovery scheduled");
    assert_eq!(scheduled, carol.last_updated + 4 * 3_600_000);
}

/// tiltIndicators=3, recoveryRate=0.5/h, 6h idle -> fully recovered.
#[test]
fn recovery_sweep_decays_tilt() {
    let (engine, router) = build();

    router.publish(
        "tilt-watch",
        EventPayload::TiltDetected {
            user_id: "carol".into(),
            severity: 3,
            indicators: vec![],
        },
        Some("carol".into()),
        None,
    );

    let mut engine = engine.lock().unwrap();
    let last_updated = engine.degen_record("carol").unwrap().last_updated;

    // Before the 4h recovery window opens: nothing happens.
    assert_eq!(engine.recovery_sweep(last_updated + 3_600_000), 0);
    assert_eq!(engine.degen_record("carol").unwrap().tilt_indicators, 3.0);

    // 6h later: min(3, 0.5 * 6) = 3 recovered, floored at 0.
    assert_eq!(engine.recovery_sweep(last_updated + 6 * 3_600_000), 1);
    let carol = engine.degen_record("carol").unwrap();
    assert_eq!(carol.tilt_indicators, 0.0);
    assert_eq!(carol.score, 70.0);
    assert_eq!(carol.history.back().unwrap().reason, "Natural tilt recovery");
}

#[test]
fn cooldown_violation_penalizes_behavior() {
    let (engine, router) = build();

    router.publish(
        "cooldown-guard",
        EventPayload::CooldownViolated {
            user_id: "dave".into(),
            severity: 2,
        },
        Some("dave".into()),
        None,
    );

    let engine = engine.lock().unwrap();
    assert_eq!(engine.degen_record("dave").unwrap().behavior_score, 66.0);
}

#[test]
fn verified_scam_report_flags_accused() {
    let (engine, router) = build();

    router.publish(
        "scam-desk",
        EventPayload::ScamReported {
            accused_id: "mallory".into(),
            reporter_id: "alice".into(),
            verified: true,
            false_report: false,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    let mallory = engine.degen_record("mallory").unwrap();
    assert_eq!(mallory.scam_flags, 1);
    assert_eq!(mallory.score, 55.0); // 70 - 15
    assert!(engine.degen_record("alice").is_none(), "reporter untouched");
}

#[test]
fn false_scam_report_penalizes_reporter() {
    let (engine, router) = build();

    router.publish(
        "scam-desk",
        EventPayload::ScamReported {
            accused_id: "bob".into(),
            reporter_id: "trudy".into(),
            verified: false,
            false_report: true,
        },
        None,
        None,
    );

    let engine = engine.lock().unwrap();
    assert_eq!(engine.degen_record("trudy").unwrap().behavior_score, 60.0);
    assert_eq!(engine.degen_record("bob").unwrap().community_reports, -3.0);
}

#[test]
fn accountability_actions_use_bonus_table() {
    let (engine, router) = build();

    for (action, expected_total) in [
        ("vault-used", 3.0),
        ("smart-withdrawal", 7.0),
        ("cooldown-accepted", 9.0),
        ("something-new", 10.0), // default +1
    ] {
        router.publish(
            "accountability",
            EventPayload::AccountabilitySuccess {
                user_id: "alice".into(),
                action: action.into(),
            },
            Some("alice".into()),
            None,
        );
        let engine = engine.lock().unwrap();
        assert_eq!(
            engine.degen_record("alice").unwrap().accountability_bonus,
            expected_total,
            "after action {action}"
        );
    }
}

/// Gameplay anomaly events must never move a user's trust record, even
/// when the user is named on the event.
#[test]
fn fairness_events_leave_degen_records_alone() {
    let (engine, router) = build();

    // Give the user a record first so we can observe "unchanged".
    router.publish(
        "tip-bot",
        EventPayload::TipCompleted {
            from_user: "alice".into(),
            to_user: "bob".into(),
            amount: 10.0,
        },
        None,
        None,
    );
    let score_before = engine.lock().unwrap().degen_record("alice").unwrap().score;

    router.publish(
        "gameplay-analyzer",
        EventPayload::PumpDetected {
            user_id: "alice".into(),
            casino_id: "stake".into(),
            observed_rtp: 1.4,
            deviation_ratio: 0.45,
            confidence: 0.95,
            severity: AnomalySeverity::Critical,
        },
        Some("alice".into()),
        None,
    );

    let engine = engine.lock().unwrap();
    assert_eq!(
        engine.degen_record("alice").unwrap().score,
        score_before,
        "degen score moved on a casino fairness event"
    );
    let stake = engine.casino_record("stake").expect("casino penalized");
    assert!(stake.categories.fairness < 75.0);

    // The engine republished a casino update, not a degen update.
    let degen_updates = engine
        .degen_record("alice")
        .unwrap()
        .history
        .iter()
        .filter(|e| e.category != "behavior")
        .count();
    assert_eq!(degen_updates, 0);
}

#[test]
fn degen_updates_publish_events() {
    let (engine, router) = build();

    engine.lock().unwrap().update_degen_score(
        "alice",
        DegenCategory::Behavior,
        -5.0,
        "test penalty",
        None,
    );

    let updates = router.history(&HistoryFilter {
        event_type: Some(EventType::DegenTrustUpdated),
        ..HistoryFilter::default()
    });
    assert_eq!(updates.len(), 1);
    match &updates[0].data {
        EventPayload::DegenTrustUpdated {
            previous_score,
            new_score,
            category,
            ..
        } => {
            assert_eq!(*previous_score, 70.0);
            assert_eq!(*new_score, 65.0);
            assert_eq!(category, "behavior");
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}
