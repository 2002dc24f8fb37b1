//! The event vocabulary — all inter-module communication.
//!
//! RULE: Producers and consumers talk ONLY through the router.
//! Payloads are a closed tagged union keyed by the event type, decoded at
//! the subscription boundary. No module inspects another module's state.

use crate::types::{ModuleId, TimestampMs, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of event types, dotted-namespace on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // ── Consumed by the trust engine ───────────────
    #[serde(rename = "link.flagged")]
    LinkFlagged,
    #[serde(rename = "bonus.nerf.detected")]
    BonusNerfDetected,
    #[serde(rename = "trust.casino.rollup")]
    CasinoRollup,
    #[serde(rename = "trust.domain.rollup")]
    DomainRollup,
    #[serde(rename = "tip.completed")]
    TipCompleted,
    #[serde(rename = "tilt.detected")]
    TiltDetected,
    #[serde(rename = "cooldown.violated")]
    CooldownViolated,
    #[serde(rename = "scam.reported")]
    ScamReported,
    #[serde(rename = "accountability.success")]
    AccountabilitySuccess,

    // ── Produced by this core ──────────────────────
    #[serde(rename = "trust.casino.updated")]
    CasinoTrustUpdated,
    #[serde(rename = "trust.degen.updated")]
    DegenTrustUpdated,
    #[serde(rename = "fairness.pump.detected")]
    PumpDetected,
    #[serde(rename = "fairness.cluster.detected")]
    ClusterDetected,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkFlagged => "link.flagged",
            Self::BonusNerfDetected => "bonus.nerf.detected",
            Self::CasinoRollup => "trust.casino.rollup",
            Self::DomainRollup => "trust.domain.rollup",
            Self::TipCompleted => "tip.completed",
            Self::TiltDetected => "tilt.detected",
            Self::CooldownViolated => "cooldown.violated",
            Self::ScamReported => "scam.reported",
            Self::AccountabilitySuccess => "accountability.success",
            Self::CasinoTrustUpdated => "trust.casino.updated",
            Self::DegenTrustUpdated => "trust.degen.updated",
            Self::PumpDetected => "fairness.pump.detected",
            Self::ClusterDetected => "fairness.cluster.detected",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk grade carried by `link.flagged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRisk {
    Low,
    Medium,
    High,
    Critical,
}

/// Detector severity carried by fairness events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    None,
    Warning,
    Critical,
}

/// One payload shape per event type.
/// Variants are added per event — never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    LinkFlagged {
        url: String,
        risk: LinkRisk,
        casino_name: Option<String>,
    },
    BonusNerfDetected {
        casino_name: String,
        bonus_type: String,
        previous_value: f64,
        new_value: f64,
        percent_drop: f64,
    },
    CasinoRollup {
        casino_name: String,
        event_count: u32,
        avg_delta: f64,
        /// Optional per-category deltas supplied by an external aggregator.
        external_data: Option<Vec<(String, f64)>>,
    },
    DomainRollup {
        domain: String,
        event_count: u32,
        avg_delta: f64,
    },
    TipCompleted {
        from_user: UserId,
        to_user: UserId,
        amount: f64,
    },
    TiltDetected {
        user_id: UserId,
        severity: u8,
        indicators: Vec<String>,
    },
    CooldownViolated {
        user_id: UserId,
        severity: u8,
    },
    ScamReported {
        accused_id: UserId,
        reporter_id: UserId,
        verified: bool,
        false_report: bool,
    },
    AccountabilitySuccess {
        user_id: UserId,
        action: String,
    },
    CasinoTrustUpdated {
        casino_name: String,
        previous_score: f64,
        new_score: f64,
        delta: f64,
        severity: Option<u8>,
        reason: String,
        source: ModuleId,
    },
    DegenTrustUpdated {
        user_id: UserId,
        previous_score: f64,
        new_score: f64,
        delta: f64,
        category: String,
        reason: String,
    },
    PumpDetected {
        user_id: UserId,
        casino_id: String,
        observed_rtp: f64,
        deviation_ratio: f64,
        confidence: f64,
        severity: AnomalySeverity,
    },
    ClusterDetected {
        user_id: UserId,
        casino_id: String,
        max_streak: u32,
        cluster_score: f64,
        z_score: f64,
        confidence: f64,
        severity: AnomalySeverity,
    },
}

impl EventPayload {
    /// The event type is implied by the payload shape — the two can never
    /// disagree.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::LinkFlagged { .. } => EventType::LinkFlagged,
            Self::BonusNerfDetected { .. } => EventType::BonusNerfDetected,
            Self::CasinoRollup { .. } => EventType::CasinoRollup,
            Self::DomainRollup { .. } => EventType::DomainRollup,
            Self::TipCompleted { .. } => EventType::TipCompleted,
            Self::TiltDetected { .. } => EventType::TiltDetected,
            Self::CooldownViolated { .. } => EventType::CooldownViolated,
            Self::ScamReported { .. } => EventType::ScamReported,
            Self::AccountabilitySuccess { .. } => EventType::AccountabilitySuccess,
            Self::CasinoTrustUpdated { .. } => EventType::CasinoTrustUpdated,
            Self::DegenTrustUpdated { .. } => EventType::DegenTrustUpdated,
            Self::PumpDetected { .. } => EventType::PumpDetected,
            Self::ClusterDetected { .. } => EventType::ClusterDetected,
        }
    }
}

/// The immutable envelope constructed at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: TimestampMs,
    pub source: ModuleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub data: EventPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Event {
    pub fn new(
        source: &str,
        data: EventPayload,
        user_id: Option<UserId>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: data.event_type(),
            timestamp: Utc::now().timestamp_millis(),
            source: source.to_string(),
            user_id,
            data,
            metadata,
        }
    }
}
