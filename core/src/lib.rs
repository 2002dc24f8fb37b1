//! Trust & fairness scoring core.
//!
//! An in-process event router plus two stateful scoring engines (casino and
//! user trust) and a statistical gameplay-anomaly analyzer that feeds the
//! casino side.
//!
//! RULES:
//!   - Modules communicate ONLY through router events.
//!   - Gameplay anomalies adjust casino records, never user records.
//!   - Scoring is best-effort: a failure here never blocks the business
//!     event that triggered it.

pub mod analyzer;
pub mod casino_trust;
pub mod config;
pub mod degen_trust;
pub mod error;
pub mod event;
pub mod logfile;
pub mod mobile;
pub mod persist;
pub mod router;
pub mod trust_engine;
pub mod types;

pub use analyzer::{AnalysisReport, GameplayAnalyzer, SpinResult};
pub use config::{AnalyzerConfig, EngineConfig};
pub use error::{TrustError, TrustResult};
pub use event::{AnomalySeverity, Event, EventPayload, EventType, LinkRisk};
pub use router::{EventRouter, HistoryFilter};
pub use trust_engine::TrustEngine;
pub use types::TrustLevel;
