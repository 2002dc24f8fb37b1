//! Gameplay anomaly analyzer.
//!
//! Ingests per-spin wager/payout telemetry into sessions keyed by
//! (user, casino) and runs three independent detectors over each session:
//!
//!   1. Pump          — RTP running suspiciously above baseline
//!   2. Win clustering — improbable runs of consecutive wins
//!   3. RTP drift     — sustained, trend-consistent deviation over time
//!
//! Detections are graded by confidence so sparse sessions do not produce
//! false positives: every detector reports "insufficient data" below its
//! sample floor instead of erroring.
//!
//! Only pump and cluster detections map to published events. Drift is
//! recorded in the report but has no event type yet; consumers act on the
//! report directly.

use crate::{
    config::AnalyzerConfig,
    event::{AnomalySeverity, EventPayload},
    router::EventRouter,
    types::{canonical_casino, CasinoId, TimestampMs, UserId},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

pub const MODULE_ID: &str = "gameplay-analyzer";

/// Bounded per-user report history length.
pub const REPORT_HISTORY_CAP: usize = 50;

/// Aggregation weights: pump dominates, cluster and drift split the rest.
const PUMP_WEIGHT: f64 = 0.4;
const CLUSTER_WEIGHT: f64 = 0.3;
const DRIFT_WEIGHT: f64 = 0.3;

// ── Telemetry ────────────────────────────────────────────────────────────

/// One spin, immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinResult {
    pub spin_id: String,
    pub user_id: UserId,
    pub casino_id: CasinoId,
    pub game_id: String,
    pub wager: f64,
    pub payout: f64,
    pub timestamp: TimestampMs,
    #[serde(default)]
    pub is_bonus: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SpinResult {
    pub fn new(user_id: &str, casino_id: &str, game_id: &str, wager: f64, payout: f64) -> Self {
        Self {
            spin_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            casino_id: canonical_casino(casino_id),
            game_id: game_id.to_string(),
            wager,
            payout,
            timestamp: Utc::now().timestamp_millis(),
            is_bonus: false,
            session_id: None,
        }
    }
}

/// Append-only spin list per (user, casino). Owned exclusively by the
/// analyzer — no external mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameplaySession {
    pub user_id: UserId,
    pub casino_id: CasinoId,
    pub spins: Vec<SpinResult>,
    pub total_wagered: f64,
    pub total_payout: f64,
    pub session_rtp: f64,
    pub is_active: bool,
    pub started_at: TimestampMs,
    pub last_spin_at: TimestampMs,
}

impl GameplaySession {
    fn new(user_id: &str, casino_id: &str, now: TimestampMs) -> Self {
        Self {
            user_id: user_id.to_string(),
            casino_id: casino_id.to_string(),
            spins: Vec::new(),
            total_wagered: 0.0,
            total_payout: 0.0,
            session_rtp: 0.0,
            is_active: true,
            started_at: now,
            last_spin_at: now,
        }
    }

    fn push(&mut self, spin: SpinResult) {
        self.total_wagered += spin.wager;
        self.total_payout += spin.payout;
        self.session_rtp = if self.total_wagered > 0.0 {
            self.total_payout / self.total_wagered
        } else {
            0.0
        };
        self.last_spin_at = spin.timestamp;
        self.spins.push(spin);
    }
}

// ── Detector results ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtpStats {
    pub spin_count: usize,
    pub total_wagered: f64,
    pub total_payout: f64,
    pub rtp: f64,
    pub window_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpAnalysis {
    pub detected: bool,
    pub observed_rtp: f64,
    pub deviation_ratio: f64,
    pub confidence: f64,
    pub severity: AnomalySeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAnalysis {
    pub detected: bool,
    pub max_streak: u32,
    pub expected_max_streak: f64,
    pub win_rate: f64,
    pub cluster_score: f64,
    pub z_score: f64,
    pub confidence: f64,
    pub severity: AnomalySeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAnalysis {
    pub detected: bool,
    pub slope: f64,
    pub correlation: f64,
    pub mean_deviation_ratio: f64,
    pub window_count: usize,
    pub confidence: f64,
    pub severity: AnomalySeverity,
}

/// Derived snapshot of one analysis pass. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub user_id: UserId,
    pub casino_id: CasinoId,
    pub analyzed_at: TimestampMs,
    pub window: RtpStats,
    pub pump_analysis: PumpAnalysis,
    pub cluster_analysis: ClusterAnalysis,
    pub drift_analysis: DriftAnalysis,
    /// 0–100, weighted over detector severity and confidence.
    pub overall_risk_score: u32,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerStats {
    pub sessions: usize,
    pub total_spins: usize,
    pub users_with_reports: usize,
}

// ── Analyzer ─────────────────────────────────────────────────────────────

pub struct GameplayAnalyzer {
    config: AnalyzerConfig,
    sessions: HashMap<(UserId, CasinoId), GameplaySession>,
    reports: HashMap<UserId, VecDeque<AnalysisReport>>,
    router: EventRouter,
}

impl GameplayAnalyzer {
    pub fn new(config: AnalyzerConfig, router: EventRouter) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            reports: HashMap::new(),
            router,
        }
    }

    /// Append one spin to its session and run analysis when the trigger
    /// condition for the current mode is met.
    pub fn record_spin(&mut self, spin: SpinResult) -> Option<AnalysisReport> {
        let key = (spin.user_id.clone(), spin.casino_id.clone());
        let session = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| GameplaySession::new(&spin.user_id, &spin.casino_id, spin.timestamp));
        session.push(spin);
        let count = session.spins.len();

        let should_analyze = if self.config.mobile_optimized {
            count % self.config.mobile_batch_size == 0
        } else {
            count >= self.config.min_spins_required
        };
        if !should_analyze {
            return None;
        }
        self.analyze_session(&key.0, &key.1)
    }

    /// Convenience loop for uplink batches.
    pub fn record_spin_batch(&mut self, spins: Vec<SpinResult>) -> Vec<AnalysisReport> {
        spins.into_iter().filter_map(|s| self.record_spin(s)).collect()
    }

    /// Run all three detectors over a session, aggregate the risk score,
    /// store the report and publish any pump/cluster detections.
    pub fn analyze_session(&mut self, user_id: &str, casino_id: &str) -> Option<AnalysisReport> {
        let key = (user_id.to_string(), canonical_casino(casino_id));
        let session = self.sessions.get(&key)?;
        let spins = &session.spins;
        if spins.is_empty() {
            return None;
        }

        let window_spins: &[SpinResult] = if spins.len() > self.config.window_size {
            &spins[spins.len() - self.config.window_size..]
        } else {
            spins
        };
        let window = window_stats(window_spins, self.config.window_size);

        let pump = detect_pump(&window, &self.config);
        let cluster = detect_cluster(spins, &self.config);
        let drift = detect_drift(spins, &self.config);

        let overall_risk_score = overall_risk(&pump, &cluster, &drift);
        let recommendations = recommendations(&pump, &cluster, &drift, overall_risk_score);

        let report = AnalysisReport {
            user_id: key.0.clone(),
            casino_id: key.1.clone(),
            analyzed_at: Utc::now().timestamp_millis(),
            window,
            pump_analysis: pump,
            cluster_analysis: cluster,
            drift_analysis: drift,
            overall_risk_score,
            recommendations,
        };

        self.publish_detections(&report);

        let history = self.reports.entry(key.0).or_default();
        if history.len() == REPORT_HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(report.clone());

        if overall_risk_score >= 40 {
            log::warn!(
                "anomaly risk {overall_risk_score} for {user_id} @ {casino_id}"
            );
        } else {
            log::debug!(
                "analysis pass for {user_id} @ {casino_id}: risk {overall_risk_score}"
            );
        }
        Some(report)
    }

    fn publish_detections(&self, report: &AnalysisReport) {
        if report.pump_analysis.detected {
            self.router.publish(
                MODULE_ID,
                EventPayload::PumpDetected {
                    user_id: report.user_id.clone(),
                    casino_id: report.casino_id.clone(),
                    observed_rtp: report.pump_analysis.observed_rtp,
                    deviation_ratio: report.pump_analysis.deviation_ratio,
                    confidence: report.pump_analysis.confidence,
                    severity: report.pump_analysis.severity,
                },
                Some(report.user_id.clone()),
                None,
            );
        }
        if report.cluster_analysis.detected {
            self.router.publish(
                MODULE_ID,
                EventPayload::ClusterDetected {
                    user_id: report.user_id.clone(),
                    casino_id: report.casino_id.clone(),
                    max_streak: report.cluster_analysis.max_streak,
                    cluster_score: report.cluster_analysis.cluster_score,
                    z_score: report.cluster_analysis.z_score,
                    confidence: report.cluster_analysis.confidence,
                    severity: report.cluster_analysis.severity,
                },
                Some(report.user_id.clone()),
                None,
            );
        }
        // Drift stays report-only: no event type exists for it.
    }

    // ── Read APIs ────────────────────────────────────────────────────────

    pub fn session(&self, user_id: &str, casino_id: &str) -> Option<&GameplaySession> {
        self.sessions
            .get(&(user_id.to_string(), canonical_casino(casino_id)))
    }

    pub fn latest_report(&self, user_id: &str) -> Option<&AnalysisReport> {
        self.reports.get(user_id).and_then(|h| h.back())
    }

    pub fn latest_report_for(&self, user_id: &str, casino_id: &str) -> Option<&AnalysisReport> {
        let key = canonical_casino(casino_id);
        self.reports
            .get(user_id)?
            .iter()
            .rev()
            .find(|r| r.casino_id == key)
    }

    pub fn reports_for(&self, user_id: &str) -> Vec<&AnalysisReport> {
        self.reports
            .get(user_id)
            .map(|h| h.iter().collect())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn stats(&self) -> AnalyzerStats {
        AnalyzerStats {
            sessions: self.sessions.len(),
            total_spins: self.sessions.values().map(|s| s.spins.len()).sum(),
            users_with_reports: self.reports.len(),
        }
    }
}

// ── Detectors ────────────────────────────────────────────────────────────

fn window_stats(spins: &[SpinResult], window_size: usize) -> RtpStats {
    let total_wagered: f64 = spins.iter().map(|s| s.wager).sum();
    let total_payout: f64 = spins.iter().map(|s| s.payout).sum();
    RtpStats {
        spin_count: spins.len(),
        total_wagered,
        total_payout,
        rtp: if total_wagered > 0.0 {
            total_payout / total_wagered
        } else {
            0.0
        },
        window_size,
    }
}

/// Detector 1 — artificially elevated returns over the recent window.
/// Severity boundaries are graded at whole-percent resolution, so a
/// deviation of 19.8% against a 10% threshold counts as the doubled
/// (critical) boundary.
fn detect_pump(window: &RtpStats, config: &AnalyzerConfig) -> PumpAnalysis {
    let deviation_ratio = if config.baseline_rtp > 0.0 {
        (window.rtp - config.baseline_rtp) / config.baseline_rtp
    } else {
        0.0
    };

    // Below-baseline sessions are never a pump.
    if deviation_ratio <= 0.0 || window.total_wagered <= 0.0 {
        return PumpAnalysis {
            detected: false,
            observed_rtp: window.rtp,
            deviation_ratio,
            confidence: 0.0,
            severity: AnomalySeverity::None,
        };
    }

    let sample_confidence = (window.spin_count as f64 / window.window_size as f64).min(1.0);
    let deviation_confidence = (deviation_ratio.abs() / config.pump_threshold).min(1.0);
    let confidence = sample_confidence * deviation_confidence;

    let graded = (deviation_ratio * 100.0).round() / 100.0;
    let severity = if graded >= 2.0 * config.pump_threshold {
        AnomalySeverity::Critical
    } else if graded >= config.pump_threshold {
        AnomalySeverity::Warning
    } else {
        AnomalySeverity::None
    };

    PumpAnalysis {
        detected: severity != AnomalySeverity::None,
        observed_rtp: window.rtp,
        deviation_ratio,
        confidence,
        severity,
    }
}

/// Detector 2 — win clustering. Wins are modeled as a Bernoulli sequence;
/// the observed longest win streak is compared to the expected maximum
/// streak `ln(n) / -ln(win_rate)` for a random sequence of the same
/// length and win probability.
fn detect_cluster(spins: &[SpinResult], config: &AnalyzerConfig) -> ClusterAnalysis {
    let n = spins.len();
    let insufficient = ClusterAnalysis {
        detected: false,
        max_streak: 0,
        expected_max_streak: 0.0,
        win_rate: 0.0,
        cluster_score: 0.0,
        z_score: 0.0,
        confidence: 0.0,
        severity: AnomalySeverity::None,
    };
    if n < config.min_spins_required {
        return insufficient;
    }

    let mut wins = 0usize;
    let mut max_streak = 0u32;
    let mut streak = 0u32;
    for spin in spins {
        if spin.payout > spin.wager {
            wins += 1;
            streak += 1;
            max_streak = max_streak.max(streak);
        } else {
            streak = 0;
        }
    }
    let win_rate = wins as f64 / n as f64;
    // All-win or all-loss sessions carry no streak signal.
    if win_rate <= 0.0 || win_rate >= 1.0 {
        return ClusterAnalysis {
            win_rate,
            max_streak,
            ..insufficient
        };
    }

    let expected = (n as f64).ln() / -win_rate.ln();
    let cluster_score = ((max_streak as f64 - expected) / expected).clamp(0.0, 1.0);
    let z_score = (max_streak as f64 - expected) * (n as f64).sqrt() / expected;

    let severity = if cluster_score >= 1.2 * config.cluster_threshold || z_score.abs() > 3.0 {
        AnomalySeverity::Critical
    } else if cluster_score >= config.cluster_threshold || z_score.abs() > 2.0 {
        AnomalySeverity::Warning
    } else {
        AnomalySeverity::None
    };

    let sample_confidence = (n as f64 / config.window_size as f64).min(1.0);
    let strength_confidence = (cluster_score / config.cluster_threshold).min(1.0);

    ClusterAnalysis {
        detected: severity != AnomalySeverity::None,
        max_streak,
        expected_max_streak: expected,
        win_rate,
        cluster_score,
        z_score,
        confidence: sample_confidence * strength_confidence,
        severity,
    }
}

/// Detector 3 — RTP drift. The session is partitioned into overlapping
/// windows stepped by half a window; a linear trend is fit across the
/// per-window RTPs. Detection requires BOTH a sustained deviation and
/// trend consistency — a one-off spike never triggers drift.
fn detect_drift(spins: &[SpinResult], config: &AnalyzerConfig) -> DriftAnalysis {
    let n = spins.len();
    let insufficient = DriftAnalysis {
        detected: false,
        slope: 0.0,
        correlation: 0.0,
        mean_deviation_ratio: 0.0,
        window_count: 0,
        confidence: 0.0,
        severity: AnomalySeverity::None,
    };
    if n < 2 * config.min_spins_required {
        return insufficient;
    }

    let window = (n / 3).min(50).max(1);
    let step = (window / 2).max(1);
    let mut rtps: Vec<f64> = Vec::new();
    let mut start = 0;
    while start + window <= n {
        let slice = &spins[start..start + window];
        let wagered: f64 = slice.iter().map(|s| s.wager).sum();
        let payout: f64 = slice.iter().map(|s| s.payout).sum();
        if wagered > 0.0 {
            rtps.push(payout / wagered);
        }
        start += step;
    }
    if rtps.len() < 3 {
        return insufficient;
    }

    let (slope, correlation) = linear_trend(&rtps);
    let mean_rtp = rtps.iter().sum::<f64>() / rtps.len() as f64;
    let mean_deviation_ratio = if config.baseline_rtp > 0.0 {
        (mean_rtp - config.baseline_rtp) / config.baseline_rtp
    } else {
        0.0
    };

    let deviation = mean_deviation_ratio.abs();
    let consistency = correlation.abs();
    let severity = if deviation >= 2.0 * config.drift_threshold && consistency > 0.6 {
        AnomalySeverity::Critical
    } else if deviation >= config.drift_threshold && consistency > 0.4 {
        AnomalySeverity::Warning
    } else {
        AnomalySeverity::None
    };

    DriftAnalysis {
        detected: severity != AnomalySeverity::None,
        slope,
        correlation,
        mean_deviation_ratio,
        window_count: rtps.len(),
        confidence: consistency.min(1.0),
        severity,
    }
}

/// Least-squares slope and Pearson correlation of a series against its
/// index.
fn linear_trend(series: &[f64]) -> (f64, f64) {
    let k = series.len() as f64;
    let mean_x = (k - 1.0) / 2.0;
    let mean_y = series.iter().sum::<f64>() / k;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (i, y) in series.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return (0.0, 0.0);
    }
    (cov / var_x, cov / (var_x.sqrt() * var_y.sqrt()))
}

// ── Aggregation ──────────────────────────────────────────────────────────

fn severity_score(severity: AnomalySeverity) -> f64 {
    match severity {
        AnomalySeverity::Critical => 100.0,
        AnomalySeverity::Warning => 50.0,
        AnomalySeverity::None => 0.0,
    }
}

fn overall_risk(pump: &PumpAnalysis, cluster: &ClusterAnalysis, drift: &DriftAnalysis) -> u32 {
    let score = PUMP_WEIGHT * severity_score(pump.severity) * pump.confidence
        + CLUSTER_WEIGHT * severity_score(cluster.severity) * cluster.confidence
        + DRIFT_WEIGHT * severity_score(drift.severity) * drift.confidence;
    score.round().clamp(0.0, 100.0) as u32
}

fn recommendations(
    pump: &PumpAnalysis,
    cluster: &ClusterAnalysis,
    drift: &DriftAnalysis,
    overall: u32,
) -> Vec<String> {
    let mut out = Vec::new();

    match pump.severity {
        AnomalySeverity::Critical => out.push(
            "RTP is running far above baseline. Elevated returns like this are often reversed abruptly — treat current winnings as temporary.".to_string(),
        ),
        AnomalySeverity::Warning => out.push(
            "RTP is noticeably above baseline for this session. Keep stakes steady and watch for a sudden reversal.".to_string(),
        ),
        AnomalySeverity::None => {}
    }
    match cluster.severity {
        AnomalySeverity::Critical => out.push(
            "Win streaks in this session are statistically improbable for a fair game. Consider cashing out.".to_string(),
        ),
        AnomalySeverity::Warning => out.push(
            "Consecutive wins are clustering more than expected. Avoid raising stakes on the streak.".to_string(),
        ),
        AnomalySeverity::None => {}
    }
    match drift.severity {
        AnomalySeverity::Critical => out.push(
            "Session RTP shows a strong sustained trend away from baseline — the game's behavior appears to be changing over time.".to_string(),
        ),
        AnomalySeverity::Warning => out.push(
            "Session RTP is drifting from baseline with a consistent trend. Worth monitoring over the next sessions.".to_string(),
        ),
        AnomalySeverity::None => {}
    }

    if overall >= 70 {
        out.push("Overall anomaly risk is high — take a break from this casino.".to_string());
    } else if overall >= 40 {
        out.push("Overall anomaly risk is moderate — exercise caution.".to_string());
    } else {
        out.push("No significant anomalies detected.".to_string());
    }
    out
}
