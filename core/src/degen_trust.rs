//! User-side ("degen") trust records.
//!
//! Five components feed one derived score:
//!   score = clamp(behavior + accountability + community
//!                 - min(30, tilt * 5) - scam_flags * 15, 0, 100)
//! Components are clamped individually; the score is recomputed after
//! every mutation, never adjusted in place.

use crate::casino_trust::{TrustEvent, HISTORY_CAP};
use crate::types::{TimestampMs, TrustLevel, UserId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const EXPLAIN_MIN_DELTA: f64 = 5.0;

/// Cap on the tilt deduction: heavy tilting cannot sink the score alone.
const MAX_TILT_DEDUCTION: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenCategory {
    Tilt,
    Behavior,
    Scam,
    Accountability,
    Community,
}

impl DegenCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tilt => "tilt",
            Self::Behavior => "behavior",
            Self::Scam => "scam",
            Self::Accountability => "accountability",
            Self::Community => "community",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegenTrustRecord {
    pub user_id: UserId,
    pub score: f64,
    pub behavior_score: f64,
    pub accountability_bonus: f64,
    pub community_reports: f64,
    /// Unbounded accumulator, decayed by the recovery sweep.
    pub tilt_indicators: f64,
    /// Monotonic count of verified scam reports.
    pub scam_flags: u32,
    pub history: VecDeque<TrustEvent>,
    /// When natural tilt decay may resume.
    pub recovery_scheduled_at: Option<TimestampMs>,
    pub last_updated: TimestampMs,
}

impl DegenTrustRecord {
    pub fn new(user_id: &str, starting_behavior: f64, now: TimestampMs) -> Self {
        let mut record = Self {
            user_id: user_id.to_string(),
            score: 0.0,
            behavior_score: starting_behavior,
            accountability_bonus: 0.0,
            community_reports: 0.0,
            tilt_indicators: 0.0,
            scam_flags: 0,
            history: VecDeque::new(),
            recovery_scheduled_at: None,
            last_updated: now,
        };
        record.score = record.compute_score();
        record
    }

    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_score(self.score)
    }

    fn compute_score(&self) -> f64 {
        let tilt_deduction = (self.tilt_indicators * 5.0).min(MAX_TILT_DEDUCTION);
        let scam_deduction = self.scam_flags as f64 * 15.0;
        (self.behavior_score + self.accountability_bonus + self.community_reports
            - tilt_deduction
            - scam_deduction)
            .clamp(0.0, 100.0)
    }

    /// Mutate exactly one component, then recompute the score.
    /// The scam category ignores `delta` and increments the flag count.
    /// Returns (previous, new) scores.
    pub fn apply(
        &mut self,
        category: DegenCategory,
        delta: f64,
        reason: &str,
        severity: Option<u8>,
        now: TimestampMs,
    ) -> (f64, f64) {
        let previous = self.score;

        match category {
            DegenCategory::Tilt => {
                self.tilt_indicators = (self.tilt_indicators + delta).max(0.0);
            }
            DegenCategory::Behavior => {
                self.behavior_score = (self.behavior_score + delta).clamp(0.0, 100.0);
            }
            DegenCategory::Scam => {
                self.scam_flags += 1;
            }
            DegenCategory::Accountability => {
                self.accountability_bonus =
                    (self.accountability_bonus + delta).clamp(0.0, 20.0);
            }
            DegenCategory::Community => {
                self.community_reports = (self.community_reports + delta).clamp(-20.0, 10.0);
            }
        }

        self.score = self.compute_score();
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

        if self.scam_flags > 0 {
            reasons.push(format!(
                "{} verified scam flag(s), -{} points",
                self.scam_flags,
                self.scam_flags as f64 * 15.0
            ));
        }
        if self.tilt_indicators > 0.0 {
            reasons.push(format!(
                "Active tilt indicators: {:.1} (-{:.0} points)",
                self.tilt_indicators,
                (self.tilt_indicators * 5.0).min(MAX_TILT_DEDUCTION)
            ));
        }
        if self.accountability_bonus > 0.0 {
            reasons.push(format!(
                "Accountability bonus: +{:.1}",
                self.accountability_bonus
            ));
        }
        if self.community_reports < 0.0 {
            reasons.push(format!(
                "Negative community reports: {:.1}",
                self.community_reports
            ));
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
