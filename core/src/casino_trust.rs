//! Casino-side trust records.
//!
//! A record holds seven category sub-scores plus the weighted aggregate.
//! RULE: the aggregate is never mutated directly — every change goes
//! through `apply()`, which clamps the touched category and recomputes
//! the aggregate from the fixed weights.

use crate::types::{compute_severity, penalty_for_severity, TimestampMs, TrustLevel};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bounded per-record history length.
pub const HISTORY_CAP: usize = 100;

/// History entries below this |delta| are noise for explanations.
const EXPLAIN_MIN_DELTA: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasinoCategory {
    Fairness,
    Payout,
    Bonus,
    UserReport,
    Freespin,
    Compliance,
    Support,
}

impl CasinoCategory {
    /// Fixed weights, summing to 1.0.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Fairness => 0.30,
            Self::Payout => 0.20,
            Self::Bonus => 0.15,
            Self::UserReport => 0.15,
            Self::Freespin => 0.10,
            Self::Compliance => 0.05,
            Self::Support => 0.05,
        }
    }

    pub const ALL: [CasinoCategory; 7] = [
        Self::Fairness,
        Self::Payout,
        Self::Bonus,
        Self::UserReport,
        Self::Freespin,
        Self::Compliance,
        Self::Support,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fairness => "fairness",
            Self::Payout => "payout",
            Self::Bonus => "bonus",
            Self::UserReport => "user_report",
            Self::Freespin => "freespin",
            Self::Compliance => "compliance",
            Self::Support => "support",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fairness" => Some(Self::Fairness),
            "payout" => Some(Self::Payout),
            "bonus" => Some(Self::Bonus),
            "user_report" | "userReport" => Some(Self::UserReport),
            "freespin" => Some(Self::Freespin),
            "compliance" => Some(Self::Compliance),
            "support" => Some(Self::Support),
            _ => None,
        }
    }
}

/// The seven sub-scores, each independently clamped to [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScores {
    pub fairness: f64,
    pub payout: f64,
    pub bonus: f64,
    pub user_report: f64,
    pub freespin: f64,
    pub compliance: f64,
    pub support: f64,
}

impl CategoryScores {
    pub fn uniform(value: f64) -> Self {
        Self {
            fairness: value,
            payout: value,
            bonus: value,
            user_report: value,
            freespin: value,
            compliance: value,
            support: value,
        }
    }

    pub fn get(&self, category: CasinoCategory) -> f64 {
        match category {
            CasinoCategory::Fairness => self.fairness,
            CasinoCategory::Payout => self.payout,
            CasinoCategory::Bonus => self.bonus,
            CasinoCategory::UserReport => self.user_report,
            CasinoCategory::Freespin => self.freespin,
            CasinoCategory::Compliance => self.compliance,
            CasinoCategory::Support => self.support,
        }
    }

    fn set(&mut self, category: CasinoCategory, value: f64) {
        let slot = match category {
            CasinoCategory::Fairness => &mut self.fairness,
            CasinoCategory::Payout => &mut self.payout,
            CasinoCategory::Bonus => &mut self.bonus,
            CasinoCategory::UserReport => &mut self.user_report,
            CasinoCategory::Freespin => &mut self.freespin,
            CasinoCategory::Compliance => &mut self.compliance,
            CasinoCategory::Support => &mut self.support,
        };
        *slot = value;
    }

    /// `round(Σ weight_i * category_i)` — the only way aggregate scores
    /// are produced.
    pub fn weighted_score(&self) -> f64 {
        let sum: f64 = CasinoCategory::ALL
            .iter()
            .map(|c| c.weight() * self.get(*c))
            .sum();
        sum.round()
    }
}

/// One applied adjustment, kept for explanation queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustEvent {
    pub timestamp: TimestampMs,
    /// Actual aggregate delta — may differ from the requested delta due to
    /// clamping and weighting.
    pub delta: f64,
    pub reason: String,
    pub severity: Option<u8>,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasinoTrustRecord {
    pub name: String,
    pub score: f64,
    pub categories: CategoryScores,
    pub history: VecDeque<TrustEvent>,
    pub last_updated: TimestampMs,
}

impl CasinoTrustRecord {
    pub fn new(name: &str, starting_score: f64, now: TimestampMs) -> Self {
        Self {
            name: name.to_string(),
            score: starting_score,
            categories: CategoryScores::uniform(starting_score),
            history: VecDeque::new(),
            last_updated: now,
        }
    }

    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.score)
    }

    /// Apply a category delta: clamp the category, recompute the aggregate
    /// from the weights, record the actual delta. Returns (previous, new)
    /// aggregate scores.
    pub fn apply(
        &mut self,
        category: CasinoCategory,
        delta: f64,
        reason: &str,
        severity: Option<u8>,
        now: TimestampMs,
    ) -> (f64, f64) {
        let previous = self.score;
        let old_value = self.categories.get(category);
        self.categories.set(category, (old_value + delta).clamp(0.0, 100.0));
        self.score = self.categories.weighted_score();
        self.last_updated = now;

        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(TrustEvent {
            timestamp: now,
            delta: self.score - previous,
            reason: reason.to_string(),
            severity,
            category: category.as_str().to_string(),
        });

        (previous, self.score)
    }

    /// Human-readable reasons behind the current score. Pure view.
    pub fn explain(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        for category in CasinoCategory::ALL {
            let value = self.categories.get(category);
            if value < 50.0 {
                reasons.push(format!(
                    "Weak {} score: {value:.0}/100",
                    category.as_str()
                ));
            } else if value >= 90.0 {
                reasons.push(format!(
                    "Strong {} score: {value:.0}/100",
                    category.as_str()
                ));
            }
        }

        let recent: Vec<&TrustEvent> = self
            .history
            .iter()
            .rev()
            .filter(|e| e.delta.abs() >= EXPLAIN_MIN_DELTA)
            .take(5)
            .collect();
        for entry in recent {
            reasons.push(format!(
                "{}{:.0} ({}): {}",
                if entry.delta >= 0.0 { "+" } else { "" },
                entry.delta,
                entry.category,
                entry.reason
            ));
        }

        if reasons.is_empty() {
            reasons.push(format!(
                "Score {:.0}/100 ({}) with no significant recent movement",
                self.score,
                self.trust_level().as_str()
            ));
        }
        reasons
    }
}

/// Delta rule for `bonus.nerf.detected`: severity from the drop magnitude,
/// penalty from the configured scale.
pub fn nerf_penalty(percent_drop: f64, scale: &[f64; 5]) -> (f64, u8) {
    let severity = compute_severity(percent_drop);
    (-penalty_for_severity(severity, scale), severity)
}
