//! Flat-file snapshot persistence.
//!
//! RULE: Only this module touches the snapshot files. Engines call store
//! methods — they never do file I/O directly.
//!
//! Layout: two JSON files, each an array of `[key, record]` pairs,
//! rewritten in full on every mutation. A store without a directory is a
//! no-op (in-memory only), which is also the test default.

use crate::casino_trust::CasinoTrustRecord;
use crate::degen_trust::DegenTrustRecord;
use crate::error::TrustResult;
use crate::types::{CasinoId, UserId};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const CASINO_FILE: &str = "casino-trust.json";
const DEGEN_FILE: &str = "degen-trust.json";

pub struct SnapshotStore {
    dir: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn open(dir: Option<PathBuf>) -> TrustResult<Self> {
        if let Some(d) = &dir {
            fs::create_dir_all(d)?;
        }
        Ok(Self { dir })
    }

    /// A store that never writes. Used in tests and pure in-memory setups.
    pub fn in_memory() -> Self {
        Self { dir: None }
    }

    pub fn is_persistent(&self) -> bool {
        self.dir.is_some()
    }

    pub fn save_casinos(&self, records: &HashMap<CasinoId, CasinoTrustRecord>) -> TrustResult<()> {
        self.save_map(CASINO_FILE, records)
    }

    pub fn load_casinos(&self) -> TrustResult<HashMap<CasinoId, CasinoTrustRecord>> {
        self.load_map(CASINO_FILE)
    }

    pub fn save_degens(&self, records: &HashMap<UserId, DegenTrustRecord>) -> TrustResult<()> {
        self.save_map(DEGEN_FILE, records)
    }

    pub fn load_degens(&self) -> TrustResult<HashMap<UserId, DegenTrustRecord>> {
        self.load_map(DEGEN_FILE)
    }

    fn save_map<V: Serialize>(&self, file: &str, map: &HashMap<String, V>) -> TrustResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        // Stable key order keeps snapshots diffable.
        let mut entries: Vec<(&String, &V)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let json = serde_json::to_string_pretty(&entries)?;
        fs::write(dir.join(file), json)?;
        Ok(())
    }

    fn load_map<V: DeserializeOwned>(&self, file: &str) -> TrustResult<HashMap<String, V>> {
        let Some(dir) = &self.dir else {
            return Ok(HashMap::new());
        };
        let path = dir.join(file);
        if !Path::new(&path).exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(path)?;
        let entries: Vec<(String, V)> = serde_json::from_str(&raw)?;
        Ok(entries.into_iter().collect())
    }
}
