//! The trust engine — translates domain events into bounded, explainable
//! score adjustments on casino and user records.
//!
//! RULES:
//!   - Aggregate scores are only produced by the record recompute paths
//!     (`CasinoTrustRecord::apply`, `DegenTrustRecord::apply`).
//!   - Fairness anomaly events adjust CASINO records only. A pump detected
//!     on casino X never penalizes the player who happened to be there.
//!   - Persistence and file logging are best-effort: failures are logged
//!     and execution continues on in-memory state.

use crate::{
    casino_trust::{nerf_penalty, CasinoCategory, CasinoTrustRecord},
    config::EngineConfig,
    degen_trust::{DegenCategory, DegenTrustRecord},
    error::{TrustError, TrustResult},
    event::{AnomalySeverity, Event, EventPayload, EventType, LinkRisk},
    logfile::RotatingLog,
    persist::SnapshotStore,
    router::{EventRouter, SubscriptionHandle},
    types::{canonical_casino, penalty_for_severity, CasinoId, TimestampMs, TrustLevel, UserId},
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

pub const MODULE_ID: &str = "trust-engine";

/// Tilt recovery may resume this long after the last tilt event.
const RECOVERY_DELAY_MS: i64 = 4 * 3_600_000;

const MS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub casino_records: usize,
    pub degen_records: usize,
    pub persistent: bool,
}

pub struct TrustEngine {
    config: EngineConfig,
    casinos: HashMap<CasinoId, CasinoTrustRecord>,
    degens: HashMap<UserId, DegenTrustRecord>,
    store: SnapshotStore,
    file_log: RotatingLog,
    router: EventRouter,
}

impl TrustEngine {
    /// Build an engine, loading any prior snapshots from the persist dir.
    pub fn new(config: EngineConfig, router: EventRouter) -> TrustResult<Self> {
        let store = SnapshotStore::open(config.persist_dir.clone())?;
        let file_log = RotatingLog::open(
            config.log_dir.clone(),
            config.max_log_size_bytes,
            config.max_log_files,
        )?;
        let casinos = store.load_casinos().unwrap_or_else(|err| {
            log::warn!("casino snapshot load failed, starting empty: {err}");
            HashMap::new()
        });
        let degens = store.load_degens().unwrap_or_else(|err| {
            log::warn!("degen snapshot load failed, starting empty: {err}");
            HashMap::new()
        });
        if !casinos.is_empty() || !degens.is_empty() {
            log::info!(
                "trust engine resumed: {} casino / {} degen records",
                casinos.len(),
                degens.len()
            );
        }
        Ok(Self {
            config,
            casinos,
            degens,
            store,
            file_log,
            router,
        })
    }

    /// Subscribe the engine to every event type it consumes. Delivery goes
    /// through the engine mutex, so each score update is one critical
    /// section — handlers never observe a half-applied record.
    pub fn attach(
        engine: &Arc<Mutex<TrustEngine>>,
        router: &EventRouter,
    ) -> Vec<SubscriptionHandle> {
        const CONSUMED: [EventType; 11] = [
            EventType::LinkFlagged,
            EventType::BonusNerfDetected,
            EventType::CasinoRollup,
            EventType::DomainRollup,
            EventType::TipCompleted,
            EventType::TiltDetected,
            EventType::CooldownViolated,
            EventType::ScamReported,
            EventType::AccountabilitySuccess,
            EventType::PumpDetected,
            EventType::ClusterDetected,
        ];
        CONSUMED
            .iter()
            .map(|event_type| {
                let engine = Arc::clone(engine);
                router.subscribe(*event_type, MODULE_ID, move |event| {
                    engine
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .handle_event(event)
                })
            })
            .collect()
    }

    // ── Casino side ──────────────────────────────────────────────────────

    /// Fetch-or-create the record, clamp the category, recompute the
    /// weighted aggregate, record history, publish, persist.
    pub fn update_casino_score(
        &mut self,
        casino_name: &str,
        category: CasinoCategory,
        delta: f64,
        reason: &str,
        severity: Option<u8>,
    ) -> (f64, f64) {
        let now = Utc::now().timestamp_millis();
        let key = canonical_casino(casino_name);
        let starting = self.config.starting_casino_score;
        let record = self
            .casinos
            .entry(key.clone())
            .or_insert_with(|| CasinoTrustRecord::new(&key, starting, now));

        let (previous, new_score) = record.apply(category, delta, reason, severity, now);
        let actual_delta = new_score - previous;

        if actual_delta.abs() >= 5.0 {
            log::warn!(
                "casino '{key}' trust moved {previous:.0} -> {new_score:.0} ({reason})"
            );
        } else {
            log::debug!("casino '{key}' trust {previous:.0} -> {new_score:.0} ({reason})");
        }
        self.file_log_entry(
            "info",
            "casino score updated",
            json!({
                "casino": key.as_str(),
                "category": category.as_str(),
                "previous": previous,
                "new": new_score,
                "reason": reason,
            }),
        );

        self.router.publish(
            MODULE_ID,
            EventPayload::CasinoTrustUpdated {
                casino_name: key,
                previous_score: previous,
                new_score,
                delta: actual_delta,
                severity,
                reason: reason.to_string(),
                source: MODULE_ID.to_string(),
            },
            None,
            None,
        );

        self.persist_casinos();
        (previous, new_score)
    }

    // ── Degen side ───────────────────────────────────────────────────────

    pub fn update_degen_score(
        &mut self,
        user_id: &str,
        category: DegenCategory,
        delta: f64,
        reason: &str,
        severity: Option<u8>,
    ) -> (f64, f64) {
        self.update_degen_score_at(user_id, category, delta, reason, severity, Utc::now().timestamp_millis())
    }

    fn update_degen_score_at(
        &mut self,
        user_id: &str,
        category: DegenCategory,
        delta: f64,
        reason: &str,
        severity: Option<u8>,
        now: TimestampMs,
    ) -> (f64, f64) {
        let starting = self.config.starting_user_score;
        let record = self
            .degens
            .entry(user_id.to_string())
            .or_insert_with(|| DegenTrustRecord::new(user_id, starting, now));

        let (previous, new_score) = record.apply(category, delta, reason, severity, now);
        if category == DegenCategory::Tilt && delta > 0.0 {
            record.recovery_scheduled_at = Some(now + RECOVERY_DELAY_MS);
        }
        let actual_delta = new_score - previous;

        log::debug!("degen '{user_id}' trust {previous:.0} -> {new_score:.0} ({reason})");
        self.file_log_entry(
            "info",
            "degen score updated",
            json!({
                "user": user_id,
                "category": category.as_str(),
                "previous": previous,
                "new": new_score,
                "reason": reason,
            }),
        );

        self.router.publish(
            MODULE_ID,
            EventPayload::DegenTrustUpdated {
                user_id: user_id.to_string(),
                previous_score: previous,
                new_score,
                delta: actual_delta,
                category: category.as_str().to_string(),
                reason: reason.to_string(),
            },
            Some(user_id.to_string()),
            None,
        );

        self.persist_degens();
        (previous, new_score)
    }

    /// Hourly sweep: decay tilt indicators on every user whose recovery
    /// window has opened, through the same invariant-preserving update
    /// path as any other adjustment. Returns the number of users touched.
    pub fn recovery_sweep(&mut self, now: TimestampMs) -> usize {
        let rate = self.config.recovery_rate_per_hour;
        let due: Vec<(UserId, f64)> = self
            .degens
            .iter()
            .filter(|(_, r)| r.tilt_indicators > 0.0)
            .filter(|(_, r)| r.recovery_scheduled_at.map_or(true, |at| now >= at))
            .map(|(user, r)| {
                let hours = (now - r.last_updated).max(0) as f64 / MS_PER_HOUR;
                (user.clone(), r.tilt_indicators.min(rate * hours))
            })
            .filter(|(_, amount)| *amount > 0.0)
            .collect();

        for (user, amount) in &due {
            self.update_degen_score_at(
                user,
                DegenCategory::Tilt,
                -amount,
                "Natural tilt recovery",
                None,
                now,
            );
        }
        if !due.is_empty() {
            log::info!("recovery sweep decayed tilt for {} user(s)", due.len());
        }
        due.len()
    }

    // ── Event consumption ────────────────────────────────────────────────

    fn handle_event(&mut self, event: &Event) -> TrustResult<()> {
        match &event.data {
            EventPayload::LinkFlagged {
                url,
                risk,
                casino_name,
            } => {
                let casino = match casino_name {
                    Some(name) => canonical_casino(name),
                    // Invalid URLs error out here; the router logs and the
                    // event is dropped.
                    None => extract_hostname(url)?,
                };
                let (delta, severity) = if *risk == LinkRisk::Critical {
                    (-10.0, 4)
                } else {
                    (-5.0, 2)
                };
                self.update_casino_score(
                    &casino,
                    CasinoCategory::Freespin,
                    delta,
                    &format!("Flagged link: {url}"),
                    Some(severity),
                );
            }

            EventPayload::BonusNerfDetected {
                casino_name,
                bonus_type,
                percent_drop,
                ..
            } => {
                let (delta, severity) = nerf_penalty(*percent_drop, &self.config.severity_scale);
                self.update_casino_score(
                    casino_name,
                    CasinoCategory::Bonus,
                    delta,
                    &format!(
                        "Bonus nerf: {bonus_type} down {:.0}%",
                        percent_drop.abs() * 100.0
                    ),
                    Some(severity),
                );
            }

            EventPayload::CasinoRollup {
                casino_name,
                event_count,
                avg_delta,
                external_data,
            } => match external_data {
                Some(deltas) => {
                    for (category_name, delta) in deltas {
                        match CasinoCategory::parse(category_name) {
                            Some(category) => {
                                self.update_casino_score(
                                    casino_name,
                                    category,
                                    *delta,
                                    &format!("Hourly rollup ({event_count} events)"),
                                    None,
                                );
                            }
                            None => {
                                log::warn!("rollup for unknown category '{category_name}', skipped")
                            }
                        }
                    }
                }
                None => {
                    // Dampened so one noisy hour cannot swing the score.
                    let delta = (avg_delta / 2.0).clamp(-5.0, 5.0);
                    self.update_casino_score(
                        casino_name,
                        CasinoCategory::Bonus,
                        delta,
                        &format!("Hourly rollup ({event_count} events)"),
                        None,
                    );
                }
            },

            EventPayload::DomainRollup {
                domain,
                event_count,
                avg_delta,
            } => {
                let delta = (avg_delta / 3.0).clamp(-8.0, 3.0);
                self.update_casino_score(
                    domain,
                    CasinoCategory::Compliance,
                    delta,
                    &format!("Domain rollup ({event_count} events)"),
                    None,
                );
            }

            // Fairness detections touch the casino fairness category only.
            EventPayload::PumpDetected {
                casino_id,
                severity,
                deviation_ratio,
                ..
            } => {
                if let Some(sev) = anomaly_severity_rank(*severity) {
                    let delta = -penalty_for_severity(sev, &self.config.severity_scale);
                    self.update_casino_score(
                        casino_id,
                        CasinoCategory::Fairness,
                        delta,
                        &format!("RTP pump detected ({:+.1}% deviation)", deviation_ratio * 100.0),
                        Some(sev),
                    );
                }
            }

            EventPayload::ClusterDetected {
                casino_id,
                severity,
                max_streak,
                ..
            } => {
                if let Some(sev) = anomaly_severity_rank(*severity) {
                    let delta = -penalty_for_severity(sev, &self.config.severity_scale);
                    self.update_casino_score(
                        casino_id,
                        CasinoCategory::Fairness,
                        delta,
                        &format!("Win clustering detected (streak of {max_streak})"),
                        Some(sev),
                    );
                }
            }

            EventPayload::TipCompleted {
                from_user,
                to_user,
                amount,
            } => {
                self.update_degen_score(from_user, DegenCategory::Behavior, 1.0, "Tip sent", None);
                self.update_degen_score(
                    to_user,
                    DegenCategory::Behavior,
                    0.5,
                    "Tip received",
                    None,
                );
                if *amount > 100.0 {
                    self.update_degen_score(
                        from_user,
                        DegenCategory::Accountability,
                        2.0,
                        "Large tip sent",
                        None,
                    );
                }
            }

            EventPayload::TiltDetected {
                user_id, severity, ..
            } => {
                self.update_degen_score(
                    user_id,
                    DegenCategory::Tilt,
                    *severity as f64,
                    "Tilt detected",
                    Some(*severity),
                );
            }

            EventPayload::CooldownViolated { user_id, severity } => {
                self.update_degen_score(
                    user_id,
                    DegenCategory::Behavior,
                    -(*severity as f64) * 2.0,
                    "Cooldown violated",
                    Some(*severity),
                );
            }

            EventPayload::ScamReported {
                accused_id,
                reporter_id,
                verified,
                false_report,
            } => {
                if *verified {
                    self.update_degen_score(
                        accused_id,
                        DegenCategory::Scam,
                        0.0,
                        "Verified scam report",
                        Some(5),
                    );
                } else if *false_report {
                    self.update_degen_score(
                        reporter_id,
                        DegenCategory::Behavior,
                        -10.0,
                        "Filed a false scam report",
                        Some(3),
                    );
                    self.update_degen_score(
                        accused_id,
                        DegenCategory::Community,
                        -3.0,
                        "Named in an unverified scam report",
                        Some(1),
                    );
                }
                // Pending reports adjust nothing until resolved.
            }

            EventPayload::AccountabilitySuccess { user_id, action } => {
                let bonus = match action.as_str() {
                    "cooldown-accepted" => 2.0,
                    "vault-used" => 3.0,
                    "phone-a-friend" => 2.0,
                    "smart-withdrawal" => 4.0,
                    _ => 1.0,
                };
                self.update_degen_score(
                    user_id,
                    DegenCategory::Accountability,
                    bonus,
                    &format!("Accountability action: {action}"),
                    None,
                );
            }

            // Produced by this engine; nothing to consume.
            EventPayload::CasinoTrustUpdated { .. } | EventPayload::DegenTrustUpdated { .. } => {}
        }
        Ok(())
    }

    // ── Read APIs ────────────────────────────────────────────────────────

    pub fn casino_record(&self, casino_name: &str) -> Option<&CasinoTrustRecord> {
        self.casinos.get(&canonical_casino(casino_name))
    }

    pub fn degen_record(&self, user_id: &str) -> Option<&DegenTrustRecord> {
        self.degens.get(user_id)
    }

    pub fn casino_trust_level(&self, casino_name: &str) -> TrustLevel {
        self.casino_record(casino_name)
            .map(|r| r.trust_level())
            .unwrap_or_else(|| TrustLevel::from_score(self.config.starting_casino_score))
    }

    pub fn degen_trust_level(&self, user_id: &str) -> TrustLevel {
        self.degen_record(user_id)
            .map(|r| r.trust_level())
            .unwrap_or_else(|| TrustLevel::from_score(self.config.starting_user_score))
    }

    pub fn explain_casino_score(&self, casino_name: &str) -> Vec<String> {
        match self.casino_record(casino_name) {
            Some(record) => record.explain(),
            None => vec![format!(
                "No record for '{casino_name}' — would start at {:.0}/100",
                self.config.starting_casino_score
            )],
        }
    }

    pub fn explain_degen_score(&self, user_id: &str) -> Vec<String> {
        match self.degen_record(user_id) {
            Some(record) => record.explain(),
            None => vec![format!(
                "No record for '{user_id}' — would start at {:.0}/100",
                self.config.starting_user_score
            )],
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            casino_records: self.casinos.len(),
            degen_records: self.degens.len(),
            persistent: self.store.is_persistent(),
        }
    }

    /// Flush both snapshots and note the shutdown in the file log.
    pub fn shutdown(&mut self) {
        self.persist_casinos();
        self.persist_degens();
        self.file_log_entry("info", "trust engine shut down", json!({}));
        log::info!("trust engine shut down cleanly");
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn persist_casinos(&self) {
        if let Err(err) = self.store.save_casinos(&self.casinos) {
            log::warn!("casino snapshot write failed, continuing in-memory: {err}");
        }
    }

    fn persist_degens(&self) {
        if let Err(err) = self.store.save_degens(&self.degens) {
            log::warn!("degen snapshot write failed, continuing in-memory: {err}");
        }
    }

    fn file_log_entry(&self, level: &str, msg: &str, meta: serde_json::Value) {
        if let Err(err) = self.file_log.append(level, msg, Some(meta)) {
            log::warn!("file log append failed: {err}");
        }
    }
}

fn anomaly_severity_rank(severity: AnomalySeverity) -> Option<u8> {
    match severity {
        AnomalySeverity::None => None,
        AnomalySeverity::Warning => Some(2),
        AnomalySeverity::Critical => Some(4),
    }
}

/// Pull a hostname out of a flagged link, canonicalized as a casino key.
/// Rejects anything without a plausible dotted host.
fn extract_hostname(url: &str) -> TrustResult<CasinoId> {
    let rest = match url.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => rest,
        _ => url,
    };
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .rsplit('@')
        .next()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);

    let plausible = host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !plausible {
        return Err(TrustError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(canonical_casino(host))
}
