// src/store/cold.rs
// Cold tier (spec §4.3): append-only, partitioned by (userId, year-month).
// Per SPEC_FULL.md §4.3, compression is a pluggable `ColdCodec` — pulling a
// real columnar/snappy dependency is out of scope for the core pipeline;
// the crate ships an uncompressed JSON-lines codec and a sidecar manifest
// per partition listing ids and content hashes for dedupe (spec §6).

use crate::error::CoreError;
use crate::types::Observation;
use chrono::Datelike;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait ColdCodec: Send + Sync {
    fn encode(&self, obs: &Observation) -> anyhow::Result<String>;
    fn decode(&self, line: &str) -> anyhow::Result<Observation>;
}

pub struct JsonLinesCodec;

impl ColdCodec for JsonLinesCodec {
    fn encode(&self, obs: &Observation) -> anyhow::Result<String> {
        Ok(serde_json::to_string(obs)?)
    }

    fn decode(&self, line: &str) -> anyhow::Result<Observation> {
        Ok(serde_json::from_str(line)?)
    }
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Manifest {
    ids: HashSet<String>,
    content_hashes: HashSet<String>,
}

pub struct ColdStore {
    root: PathBuf,
    codec: Box<dyn ColdCodec>,
}

impl ColdStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            codec: Box::new(JsonLinesCodec),
        }
    }

    fn partition_dir(&self, user_id: &str, ym: &str) -> PathBuf {
        self.root.join(user_id).join(ym)
    }

    fn ym_for(ts: chrono::DateTime<chrono::Utc>) -> String {
        format!("{:04}{:02}", ts.year(), ts.month())
    }

    /// Appends `obs` to its (userId, yyyymm) partition file, updating the
    /// sidecar manifest. Never overwrites a partition's existing content —
    /// cold storage is append-only and read-only except during compaction.
    pub fn append(&self, obs: &Observation) -> Result<(), CoreError> {
        let ym = Self::ym_for(obs.timestamp);
        let dir = self.partition_dir(&obs.user_id, &ym);
        std::fs::create_dir_all(&dir).map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        let line = self
            .codec
            .encode(obs)
            .map_err(|e| CoreError::StoragePermanent {
                item_id: obs.id.clone(),
                reason: e.to_string(),
            })?;

        let data_path = dir.join("part.jsonl");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&data_path)
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        let manifest_path = dir.join("manifest.json");
        let mut manifest = load_manifest(&manifest_path).unwrap_or_default();
        manifest.ids.insert(obs.id.clone());
        manifest.content_hashes.insert(obs.content_hash.clone());
        save_manifest(&manifest_path, &manifest)
            .map_err(|e| CoreError::StorageTransient(e.to_string()))?;

        Ok(())
    }

    pub fn get(&self, user_id: &str, id: &str) -> Result<Option<Observation>, CoreError> {
        let user_dir = self.root.join(user_id);
        if !user_dir.exists() {
            return Ok(None);
        }
        let entries = std::fs::read_dir(&user_dir).map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        for entry in entries.flatten() {
            let part = entry.path().join("part.jsonl");
            if let Some(obs) = self.scan_partition_for_id(&part, id)? {
                return Ok(Some(obs));
            }
        }
        Ok(None)
    }

    fn scan_partition_for_id(&self, path: &Path, id: &str) -> Result<Option<Observation>, CoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::StorageTransient(e.to_string()))?;
        for line in content.lines() {
            if let Ok(obs) = self.codec.decode(line) {
                if obs.id == id {
                    return Ok(Some(obs));
                }
            }
        }
        Ok(None)
    }

    pub fn contains_hash(&self, user_id: &str, content_hash: &str) -> bool {
        let ym_dirs = match std::fs::read_dir(self.root.join(user_id)) {
            Ok(d) => d,
            Err(_) => return false,
        };
        for entry in ym_dirs.flatten() {
            let manifest_path = entry.path().join("manifest.json");
            if let Ok(manifest) = load_manifest(&manifest_path) {
                if manifest.content_hashes.contains(content_hash) {
                    return true;
                }
            }
        }
        false
    }
}

fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn save_manifest(path: &Path, manifest: &Manifest) -> anyhow::Result<()> {
    let content = serde_json::to_string(manifest)?;
    std::fs::write(path, content)?;
    Ok(())
}
