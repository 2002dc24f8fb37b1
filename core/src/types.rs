//! Shared primitive types used across the scoring core.

use serde::{Deserialize, Serialize};

/// Stable identifier of the module that produced an event.
pub type ModuleId = String;

/// A Discord-style user identifier.
pub type UserId = String;

/// Canonicalized casino name (lowercased, trimmed).
pub type CasinoId = String;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Derived trust band. Never stored — always recomputed from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustLevel {
    VeryHigh,
    High,
    Neutral,
    Low,
    HighRisk,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            Self::VeryHigh
        } else if score >= 80.0 {
            Self::High
        } else if score >= 60.0 {
            Self::Neutral
        } else if score >= 40.0 {
            Self::Low
        } else {
            Self::HighRisk
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryHigh => "very-high",
            Self::High => "high",
            Self::Neutral => "neutral",
            Self::Low => "low",
            Self::HighRisk => "high-risk",
        }
    }
}

/// Map the magnitude of a negative signal (e.g. a bonus value drop expressed
/// as a fraction) onto the 1–5 severity scale.
pub fn compute_severity(magnitude: f64) -> u8 {
    let m = magnitude.abs();
    if m >= 0.50 {
        5
    } else if m >= 0.35 {
        4
    } else if m >= 0.20 {
        3
    } else if m >= 0.10 {
        2
    } else {
        1
    }
}

/// Look up the score penalty for a severity on the configured scale.
/// Severities outside 1–5 clamp to the nearest table entry.
pub fn penalty_for_severity(severity: u8, scale: &[f64; 5]) -> f64 {
    let idx = (severity.clamp(1, 5) - 1) as usize;
    scale[idx]
}

/// Canonical form of a casino name: the map key for trust records.
pub fn canonical_casino(name: &str) -> CasinoId {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_level_bands() {
        assert_eq!(TrustLevel::from_score(95.0), TrustLevel::VeryHigh);
        assert_eq!(TrustLevel::from_score(94.9), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(80.0), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(60.0), TrustLevel::Neutral);
        assert_eq!(TrustLevel::from_score(40.0), TrustLevel::Low);
        assert_eq!(TrustLevel::from_score(39.9), TrustLevel::HighRisk);
    }

    #[test]
    fn severity_scale_lookup() {
        let scale = [2.0, 4.0, 6.0, 8.0, 12.0];
        assert_eq!(penalty_for_severity(1, &scale), 2.0);
        assert_eq!(penalty_for_severity(5, &scale), 12.0);
        assert_eq!(penalty_for_severity(0, &scale), 2.0);
        assert_eq!(penalty_for_severity(9, &scale), 12.0);
    }

    #[test]
    fn severity_from_magnitude() {
        assert_eq!(compute_severity(0.05), 1);
        assert_eq!(compute_severity(0.25), 3);
        assert_eq!(compute_severity(-0.6), 5);
    }
}
