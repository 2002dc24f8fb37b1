//! Configuration for both engines and the analyzer.
//!
//! Every knob has a stated default; constructing a config via `Default`
//! yields a fully working in-memory setup (no persistence, no file log).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Score given to a casino record on first sight.
    pub starting_casino_score: f64,
    /// Behavior score given to a user record on first sight.
    pub starting_user_score: f64,
    /// Penalty per severity 1–5.
    pub severity_scale: [f64; 5],
    /// Directory for the flat-file snapshots. None = in-memory only.
    pub persist_dir: Option<PathBuf>,
    /// Directory for the rotating JSON-line log. None = log crate only.
    pub log_dir: Option<PathBuf>,
    pub max_log_size_bytes: u64,
    pub max_log_files: u32,
    /// Tilt indicators recovered per hour of inactivity.
    pub recovery_rate_per_hour: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_casino_score: 75.0,
            starting_user_score: 70.0,
            severity_scale: [2.0, 4.0, 6.0, 8.0, 12.0],
            persist_dir: None,
            log_dir: None,
            max_log_size_bytes: 256 * 1024,
            max_log_files: 3,
            recovery_rate_per_hour: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Expected long-run return-to-player of a fair game.
    pub baseline_rtp: f64,
    /// Spins considered by the pump detector's sliding window.
    pub window_size: usize,
    /// Relative RTP deviation that counts as a pump warning.
    pub pump_threshold: f64,
    /// Sustained relative deviation that counts as drift.
    pub drift_threshold: f64,
    /// Cluster score that counts as a win-clustering warning.
    pub cluster_threshold: f64,
    /// Minimum spins before any detector reports a finding.
    pub min_spins_required: usize,
    /// In mobile-optimized mode, analyze every N spins instead.
    pub mobile_batch_size: usize,
    /// Batch-triggered analysis for low-bandwidth clients.
    pub mobile_optimized: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            baseline_rtp: 0.96,
            window_size: 100,
            pump_threshold: 0.10,
            drift_threshold: 0.05,
            cluster_threshold: 0.75,
            min_spins_required: 20,
            mobile_batch_size: 25,
            mobile_optimized: false,
        }
    }
}
