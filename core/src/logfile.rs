//! Rotating JSON-line log for the trust engines.
//!
//! One JSON object per line: `{ts, level, msg, meta}`. When the active file
//! exceeds the byte threshold it rotates into `.1`, `.2`, … — oldest
//! discarded once the rotated-file count is reached. Without a directory
//! the log is a no-op and entries only reach the `log` crate facade.

use crate::error::TrustResult;
use chrono::Utc;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const LOG_FILE: &str = "trust-engines.log";

pub struct RotatingLog {
    dir: Option<PathBuf>,
    max_size_bytes: u64,
    max_files: u32,
}

impl RotatingLog {
    pub fn open(dir: Option<PathBuf>, max_size_bytes: u64, max_files: u32) -> TrustResult<Self> {
        if let Some(d) = &dir {
            fs::create_dir_all(d)?;
        }
        Ok(Self {
            dir,
            max_size_bytes,
            max_files: max_files.max(1),
        })
    }

    pub fn disabled() -> Self {
        Self {
            dir: None,
            max_size_bytes: 0,
            max_files: 1,
        }
    }

    /// Append one entry. Failures surface as a result so the caller can
    /// log-and-continue — never propagate up the dispatch chain.
    pub fn append(
        &self,
        level: &str,
        msg: &str,
        meta: Option<serde_json::Value>,
    ) -> TrustResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let path = dir.join(LOG_FILE);

        let mut entry = json!({
            "ts": Utc::now().timestamp_millis(),
            "level": level,
            "msg": msg,
        });
        if let Some(meta) = meta {
            entry["meta"] = meta;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{entry}")?;

        if file.metadata()?.len() > self.max_size_bytes {
            drop(file);
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&self) -> TrustResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let rotated = |n: u32| dir.join(format!("{LOG_FILE}.{n}"));

        let oldest = rotated(self.max_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for n in (1..self.max_files).rev() {
            let from = rotated(n);
            if from.exists() {
                fs::rename(&from, rotated(n + 1))?;
            }
        }
        fs::rename(dir.join(LOG_FILE), rotated(1))?;
        Ok(())
    }
}
