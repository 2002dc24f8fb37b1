//! Gameplay anomaly analyzer tests: detector boundaries, insufficient-data
//! behavior, aggregation, event publishing.

use std::sync::{Arc, Mutex};
use trust_core::{
    analyzer::{GameplayAnalyzer, SpinResult},
    event::EventType,
    router::HistoryFilter,
    trust_engine::TrustEngine,
    AnalyzerConfig, AnomalySeverity, EngineConfig, EventRouter,
};

fn spin(user: &str, casino: &str, wager: f64, payout: f64) -> SpinResult {
    SpinResult::new(user, casino, "slots", wager, payout)
}

fn analyzer() -> GameplayAnalyzer {
    GameplayAnalyzer::new(AnalyzerConfig::default(), EventRouter::new())
}

/// baseline 0.96, threshold 0.10, 100 spins at RTP 1.15: the deviation
/// ratio (~0.198) sits on the doubled-threshold boundary and grades as
/// critical.
#[test]
fn pump_boundary_at_doubled_threshold() {
    let mut analyzer = analyzer();
    for _ in 0..100 {
        analyzer.record_spin(spin("alice", "stake", 1.0, 1.15));
    }

    let report = analyzer.latest_report("alice").expect("report");
    let pump = &report.pump_analysis;
    assert!(pump.detected);
    assert_eq!(pump.severity, AnomalySeverity::Critical);
    assert!((pump.deviation_ratio - 0.19792).abs() < 0.001);
    // Full window and deviation beyond threshold: full confidence.
    assert!((pump.confidence - 1.0).abs() < 1e-9);
}

#[test]
fn pump_warning_between_thresholds() {
    let mut analyzer = analyzer();
    for _ in 0..100 {
        analyzer.record_spin(spin("alice", "stake", 1.0, 1.10));
    }

    let pump = &analyzer.latest_report("alice").unwrap().pump_analysis;
    assert!(pump.detected);
    assert_eq!(pump.severity, AnomalySeverity::Warning);
}

#[test]
fn pump_ignores_below_baseline_sessions() {
    let mut analyzer = analyzer();
    for _ in 0..100 {
        analyzer.record_spin(spin("alice", "stake", 1.0, 0.5));
    }

    let pump = &analyzer.latest_report("alice").unwrap().pump_analysis;
    assert!(!pump.detected);
    assert_eq!(pump.severity, AnomalySeverity::None);
    assert!(pump.deviation_ratio < 0.0);
}

/// Below min_spins_required nothing is analyzed at all.
#[test]
fn sparse_sessions_produce_no_reports() {
    let mut analyzer = analyzer();
    for _ in 0..19 {
        assert!(analyzer
            .record_spin(spin("alice", "stake", 1.0, 2.0))
            .is_none());
    }
    assert!(analyzer.latest_report("alice").is_none());
}

#[test]
fn win_cluster_detected_on_improbable_streak() {
    let mut analyzer = analyzer();
    // 15 straight wins then 45 losses: win rate 0.25 over 60 spins gives
    // an expected max streak of ~3; a streak of 15 is wildly improbable.
    let mut spins = Vec::new();
    for _ in 0..15 {
        spins.push(spin("bob", "duelbits", 1.0, 2.0));
    }
    for _ in 0..45 {
        spins.push(spin("bob", "duelbits", 1.0, 0.0));
    }
    analyzer.record_spin_batch(spins);

    let cluster = &analyzer.latest_report("bob").unwrap().cluster_analysis;
    assert!(cluster.detected);
    assert_eq!(cluster.severity, AnomalySeverity::Critical);
    assert_eq!(cluster.max_streak, 15);
    assert_eq!(cluster.cluster_score, 1.0); // capped
    assert!(cluster.z_score > 3.0);
}

/// An all-win sequence has no streak signal (win rate 1.0 is degenerate).
#[test]
fn cluster_skips_degenerate_win_rates() {
    let mut analyzer = analyzer();
    for _ in 0..40 {
        analyzer.record_spin(spin("bob", "duelbits", 1.0, 2.0));
    }

    let cluster = &analyzer.latest_report("bob").unwrap().cluster_analysis;
    assert!(!cluster.detected);
    assert_eq!(cluster.win_rate, 1.0);
}

#[test]
fn drift_requires_consistent_trend() {
    let mut analyzer = analyzer();
    // RTP declining linearly 0.9 -> 0.5 over 120 spins: sustained
    // deviation with near-perfect trend consistency.
    let spins: Vec<SpinResult> = (0..120)
        .map(|i| {
            let rtp = 0.9 - 0.4 * (i as f64 / 119.0);
            spin("carol", "shuffle", 1.0, rtp)
        })
        .collect();
    analyzer.record_spin_batch(spins);

    let drift = &analyzer.latest_report("carol").unwrap().drift_analysis;
    assert!(drift.detected);
    assert_eq!(drift.severity, AnomalySeverity::Critical);
    assert!(drift.slope < 0.0);
    assert!(drift.correlation < -0.6);
}

/// A one-off payout spike in the middle of a flat session must not
/// register as drift.
#[test]
fn drift_ignores_single_spike() {
    let mut analyzer = analyzer();
    let spins: Vec<SpinResult> = (0..120)
        .map(|i| {
            let payout = if (55..65).contains(&i) { 3.0 } else { 0.96 };
            spin("carol", "shuffle", 1.0, payout)
        })
        .collect();
    analyzer.record_spin_batch(spins);

    let drift = &analyzer.latest_report("carol").unwrap().drift_analysis;
    assert!(!drift.detected, "spike misread as drift: {drift:?}");
}

#[test]
fn drift_needs_double_the_sample_floor() {
    let mut analyzer = analyzer();
    for _ in 0..30 {
        analyzer.record_spin(spin("carol", "shuffle", 1.0, 0.5));
    }

    let drift = &analyzer.latest_report("carol").unwrap().drift_analysis;
    assert!(!drift.detected);
    assert_eq!(drift.window_count, 0);
}

/// overall = round(0.4*sev*conf + 0.3*sev*conf + 0.3*sev*conf).
#[test]
fn overall_risk_weights_detectors() {
    let mut analyzer = analyzer();
    // Flat elevated RTP: pump critical at confidence 1, cluster degenerate
    // (all wins), drift deviation present but with zero trend.
    for _ in 0..100 {
        analyzer.record_spin(spin("alice", "stake", 1.0, 1.15));
    }

    let report = analyzer.latest_report("alice").unwrap();
    assert_eq!(report.pump_analysis.severity, AnomalySeverity::Critical);
    assert!(!report.cluster_analysis.detected);
    assert!(!report.drift_analysis.detected);
    assert_eq!(report.overall_risk_score, 40); // 0.4 * 100 * 1.0

    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("above baseline")));
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("moderate")));
}

#[test]
fn report_history_is_bounded() {
    let mut analyzer = analyzer();
    // Standard mode analyzes every spin from the 20th on; 100 spins
    // produce 81 reports, trimmed to the most recent 50.
    for _ in 0..100 {
        analyzer.record_spin(spin("alice", "stake", 1.0, 0.9));
    }
    assert_eq!(analyzer.reports_for("alice").len(), 50);
}

#[test]
fn mobile_mode_batches_analysis() {
    let config = AnalyzerConfig {
        mobile_optimized: true,
        ..AnalyzerConfig::default()
    };
    let mut analyzer = GameplayAnalyzer::new(config, EventRouter::new());

    let mut reports = 0;
    for _ in 0..75 {
        if analyzer.record_spin(spin("alice", "stake", 1.0, 0.9)).is_some() {
            reports += 1;
        }
    }
    assert_eq!(reports, 3, "one report per 25-spin batch");
}

#[test]
fn sessions_are_keyed_per_user_casino() {
    let mut analyzer = analyzer();
    analyzer.record_spin(spin("alice", "stake", 2.0, 1.0));
    analyzer.record_spin(spin("alice", "Duelbits", 1.0, 3.0));
    analyzer.record_spin(spin("bob", "stake", 1.0, 0.0));

    assert_eq!(analyzer.stats().sessions, 3);
    let session = analyzer.session("alice", "duelbits").expect("canonical key");
    assert_eq!(session.spins.len(), 1);
    assert_eq!(session.session_rtp, 3.0);
}

/// End-to-end: spins on a pumped casino produce a fairness event that
/// lowers the casino's trust while the player's record stays untouched.
#[test]
fn pump_event_reaches_trust_engine() {
    let router = EventRouter::new();
    let engine = Arc::new(Mutex::new(
        TrustEngine::new(EngineConfig::default(), router.clone()).expect("build engine"),
    ));
    let subs = TrustEngine::attach(&engine, &router);
    std::mem::forget(subs);

    let mut analyzer = GameplayAnalyzer::new(AnalyzerConfig::default(), router.clone());
    for _ in 0..30 {
        analyzer.record_spin(spin("alice", "stake", 1.0, 1.4));
    }

    let pumps = router.history(&HistoryFilter {
        event_type: Some(EventType::PumpDetected),
        ..HistoryFilter::default()
    });
    assert!(!pumps.is_empty());

    let engine = engine.lock().unwrap();
    let stake = engine.casino_record("stake").expect("casino record");
    assert!(stake.categories.fairness < 75.0);
    assert!(engine.degen_record("alice").is_none());
}
