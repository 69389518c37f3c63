//! Per-store guide cache: in-memory with disk-backed snapshots.
//!
//! Every `put` writes an immutable snapshot file (`{store}_{millis}.json`)
//! before publishing the entry to memory, so a crash right after a refresh
//! never loses data - the disk copy is authoritative for `restore`. Memory
//! holds at most one live entry per store; a refresh replaces, never merges.
//!
//! Snapshot filenames are the index: store name plus unix-millis timestamp.
//! Files that do not parse under that convention are silently skipped, by
//! contract (see `parse_snapshot_name` tests).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::{GuideRecord, STORE_FIELD};

/// Age after which an in-memory entry is evicted. The disk snapshot remains.
const MEMORY_TTL: Duration = Duration::hours(1);
/// Age after which a disk snapshot is deleted.
const DISK_RETENTION: Duration = Duration::hours(24);

struct CacheEntry {
    data: Vec<GuideRecord>,
    timestamp: DateTime<Utc>,
}

/// Per-store stats for the `/guides/cache/stats` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub count: usize,
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
    #[serde(rename = "ageInMinutes")]
    pub age_in_minutes: i64,
}

/// TTL-bound cache of decoded guide records, one entry per store.
pub struct GuideCache {
    cache_dir: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl GuideCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Reload memory from disk snapshots at process start.
    ///
    /// For each store, only the newest snapshot is considered, and only when
    /// it is still within the in-memory TTL and newer than whatever is
    /// already loaded for that store.
    pub fn restore(&self) -> Result<usize> {
        fs::create_dir_all(&self.cache_dir).context("Failed to create cache directory")?;
        let now = Utc::now();
        let mut restored = 0;

        for entry in fs::read_dir(&self.cache_dir).context("Failed to read cache directory")? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some((store, timestamp)) = parse_snapshot_name(&file_name.to_string_lossy())
            else {
                continue;
            };
            if now - timestamp > MEMORY_TTL {
                continue;
            }

            let data: Vec<GuideRecord> = match fs::read(entry.path())
                .map_err(anyhow::Error::from)
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(Into::into))
            {
                Ok(data) => data,
                Err(e) => {
                    warn!(file = %entry.path().display(), error = %e, "Skipping unreadable snapshot");
                    continue;
                }
            };

            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            let newer_loaded = entries
                .get(&store)
                .map(|existing| existing.timestamp >= timestamp)
                .unwrap_or(false);
            if !newer_loaded {
                info!(store = %store, records = data.len(), "Cache restored from disk");
                entries.insert(store, CacheEntry { data, timestamp });
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Replace a store's records, persisting the snapshot to disk first.
    pub fn put(&self, store: &str, records: Vec<GuideRecord>) -> Result<()> {
        self.put_at(store, records, Utc::now())
    }

    /// `put` with an explicit timestamp. Exposed so tests can age entries.
    pub fn put_at(
        &self,
        store: &str,
        records: Vec<GuideRecord>,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).context("Failed to create cache directory")?;

        // Write-then-serve: the snapshot hits disk before memory sees it.
        let file_name = format!("{}_{}.json", store, timestamp.timestamp_millis());
        let path = self.cache_dir.join(&file_name);
        let tmp = self.cache_dir.join(format!("{file_name}.tmp"));
        let bytes = serde_json::to_vec_pretty(&records).context("Failed to encode snapshot")?;
        fs::write(&tmp, bytes).context("Failed to write snapshot")?;
        fs::rename(&tmp, &path).context("Failed to publish snapshot")?;
        debug!(file = %path.display(), records = records.len(), "Snapshot written");

        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                store.to_string(),
                CacheEntry {
                    data: records,
                    timestamp,
                },
            );
        Ok(())
    }

    /// Records for one store, or for all stores when `store` is `None`.
    /// Every returned record carries a `_store` tag.
    pub fn get(&self, store: Option<&str>) -> Vec<GuideRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut records = Vec::new();
        match store {
            Some(name) => {
                if let Some(entry) = entries.get(name) {
                    records.extend(entry.data.iter().map(|r| tag_store(r, name)));
                }
            }
            None => {
                for (name, entry) in entries.iter() {
                    records.extend(entry.data.iter().map(|r| tag_store(r, name)));
                }
            }
        }
        records
    }

    pub fn stores(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut stores: Vec<String> = entries.keys().cloned().collect();
        stores.sort();
        stores
    }

    /// Most recent refresh instant across all stores.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.values().map(|e| e.timestamp).max()
    }

    pub fn stats(&self) -> HashMap<String, StoreStats> {
        let now = Utc::now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|(store, entry)| {
                (
                    store.clone(),
                    StoreStats {
                        count: entry.data.len(),
                        last_update: entry.timestamp.to_rfc3339(),
                        age_in_minutes: (now - entry.timestamp).num_minutes(),
                    },
                )
            })
            .collect()
    }

    /// Sorted union of field names, sampled from each store's first record.
    pub fn available_fields(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut fields: Vec<String> = entries
            .values()
            .filter_map(|entry| entry.data.first())
            .flat_map(|record| record.keys().cloned())
            .collect();
        fields.sort();
        fields.dedup();
        fields
    }

    /// Evict expired memory entries and delete aged-out disk snapshots.
    ///
    /// Safe to run repeatedly; a second pass with no intervening `put` is a
    /// no-op. Driven every 10 minutes by the scheduler.
    pub fn sweep(&self) -> (usize, usize) {
        let now = Utc::now();

        let evicted = {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            let before = entries.len();
            entries.retain(|store, entry| {
                let keep = now - entry.timestamp <= MEMORY_TTL;
                if !keep {
                    info!(store = %store, "Expired cache entry evicted from memory");
                }
                keep
            });
            before - entries.len()
        };

        let mut deleted = 0;
        match fs::read_dir(&self.cache_dir) {
            Ok(dir) => {
                for entry in dir.flatten() {
                    let file_name = entry.file_name();
                    let Some((_, timestamp)) = parse_snapshot_name(&file_name.to_string_lossy())
                    else {
                        continue;
                    };
                    if now - timestamp > DISK_RETENTION {
                        if let Err(e) = fs::remove_file(entry.path()) {
                            warn!(file = %entry.path().display(), error = %e, "Failed to delete old snapshot");
                        } else {
                            debug!(file = %entry.path().display(), "Old snapshot deleted");
                            deleted += 1;
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "Cache directory not readable during sweep"),
        }
        (evicted, deleted)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

fn tag_store(record: &GuideRecord, store: &str) -> GuideRecord {
    let mut tagged = record.clone();
    tagged.insert(
        STORE_FIELD.to_string(),
        serde_json::Value::String(store.to_string()),
    );
    tagged
}

/// Parse `{store}_{unix_millis}.json`. Store names may themselves contain
/// underscores; the timestamp is whatever follows the last one. Anything
/// else - wrong extension, missing underscore, non-numeric timestamp - is
/// not a snapshot and is ignored.
fn parse_snapshot_name(name: &str) -> Option<(String, DateTime<Utc>)> {
    let stem = name.strip_suffix(".json")?;
    let (store, millis) = stem.rsplit_once('_')?;
    if store.is_empty() {
        return None;
    }
    let millis: i64 = millis.parse().ok()?;
    let timestamp = Utc.timestamp_millis_opt(millis).single()?;
    Some((store.to_string(), timestamp))
}
