//! Low-bandwidth mobile surface: packed anomaly summaries, the compressed
//! spin uplink format and battery-aware polling.

use crate::analyzer::{AnalysisReport, GameplayAnalyzer, SpinResult};
use crate::error::{TrustError, TrustResult};
use crate::event::AnomalySeverity;
use crate::types::TimestampMs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const FLAG_PUMP: u8 = 1;
pub const FLAG_CLUSTER: u8 = 2;
pub const FLAG_DRIFT: u8 = 4;

/// Compact per-session verdict for uplink-constrained clients.
///
/// `anomaly_flags` is a bitmask over the three detectors; `severity` is
/// 0 (none) / 1 (warning) / 2 (critical), the worst across detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileSummary {
    pub session_id: String,
    pub timestamp: TimestampMs,
    pub anomaly_flags: u8,
    /// 0–100, strongest detected detector.
    pub confidence: u8,
    /// Session RTP as a percentage, one decimal.
    pub rtp_percent: f64,
    pub spin_count: u32,
    pub severity: u8,
}

impl MobileSummary {
    pub fn from_report(report: &AnalysisReport) -> Self {
        let mut flags = 0u8;
        let mut confidence = 0.0f64;
        if report.pump_analysis.detected {
            flags |= FLAG_PUMP;
            confidence = confidence.max(report.pump_analysis.confidence);
        }
        if report.cluster_analysis.detected {
            flags |= FLAG_CLUSTER;
            confidence = confidence.max(report.cluster_analysis.confidence);
        }
        if report.drift_analysis.detected {
            flags |= FLAG_DRIFT;
            confidence = confidence.max(report.drift_analysis.confidence);
        }
        let severity = [
            report.pump_analysis.severity,
            report.cluster_analysis.severity,
            report.drift_analysis.severity,
        ]
        .into_iter()
        .map(severity_rank)
        .max()
        .unwrap_or(0);

        Self {
            session_id: format!("{}:{}", report.user_id, report.casino_id),
            timestamp: report.analyzed_at,
            anomaly_flags: flags,
            confidence: (confidence * 100.0).round().clamp(0.0, 100.0) as u8,
            rtp_percent: (report.window.rtp * 1000.0).round() / 10.0,
            spin_count: report.window.spin_count as u32,
            severity,
        }
    }

    pub fn pump_flagged(&self) -> bool {
        self.anomaly_flags & FLAG_PUMP != 0
    }

    pub fn cluster_flagged(&self) -> bool {
        self.anomaly_flags & FLAG_CLUSTER != 0
    }

    pub fn drift_flagged(&self) -> bool {
        self.anomaly_flags & FLAG_DRIFT != 0
    }
}

fn severity_rank(severity: AnomalySeverity) -> u8 {
    match severity {
        AnomalySeverity::None => 0,
        AnomalySeverity::Warning => 1,
        AnomalySeverity::Critical => 2,
    }
}

impl GameplayAnalyzer {
    /// Packed summary of the newest report for (user, casino), if any.
    pub fn mobile_summary(&self, user_id: &str, casino_id: &str) -> Option<MobileSummary> {
        self.latest_report_for(user_id, casino_id)
            .map(MobileSummary::from_report)
    }
}

/// Decode the `"wager|payout|ts;..."` uplink format into spin records.
/// The whole batch is rejected on the first malformed record — a partial
/// batch would skew session RTP silently.
pub fn parse_compressed_spins(
    data: &str,
    user_id: &str,
    casino_id: &str,
    game_id: &str,
) -> TrustResult<Vec<SpinResult>> {
    let mut spins = Vec::new();
    for record in data.split(';').filter(|r| !r.trim().is_empty()) {
        let malformed = || TrustError::MalformedSpinRecord {
            raw: record.to_string(),
        };
        let mut fields = record.trim().split('|');
        let wager: f64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(malformed)?;
        let payout: f64 = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(malformed)?;
        let timestamp: TimestampMs = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(malformed)?;
        if fields.next().is_some() || wager < 0.0 || payout < 0.0 {
            return Err(malformed());
        }
        let mut spin = SpinResult::new(user_id, casino_id, game_id, wager, payout);
        spin.timestamp = timestamp;
        spins.push(spin);
    }
    Ok(spins)
}

/// Poll backoff for mobile clients: 30 s baseline, stretched on low
/// battery unless the device is charging.
pub fn mobile_poll_interval(battery_level: Option<u8>, is_charging: Option<bool>) -> Duration {
    if is_charging == Some(true) {
        return Duration::from_secs(30);
    }
    match battery_level {
        Some(level) if level < 20 => Duration::from_secs(120),
        Some(level) if level < 50 => Duration::from_secs(60),
        _ => Duration::from_secs(30),
    }
}
