//! LCD aging and scratch purging.
//!
//! Each aged LCD is claimed on the derivative coordinator for the whole
//! delete-and-reset, so a concurrent LCD generation either finishes first
//! or waits and observes the removal.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::derivative::{AssetDerivativeRequest, DerivativeClass, DerivativeKey, DerivativeKind};
use crate::metadata::{LcdCandidate, MetadataError, MetadataStore};
use crate::pipeline::DerivativeCoordinator;
use crate::store::{tiny_key, DerivativeStore, KvStore, EX_DIR};
use crate::time::age_of;

use super::{AgingPolicy, AgingResult};

/// Runs LCD aging and scratch purges against one media root.
pub struct AgingEvictionManager {
    store: DerivativeStore,
    metadata: Arc<dyn MetadataStore>,
    kv: Option<Arc<dyn KvStore>>,
    coordinator: Arc<DerivativeCoordinator>,
    policy: AgingPolicy,
}

impl AgingEvictionManager {
    pub fn new(
        store: DerivativeStore,
        metadata: Arc<dyn MetadataStore>,
        coordinator: Arc<DerivativeCoordinator>,
        policy: AgingPolicy,
    ) -> Self {
        Self {
            store,
            metadata,
            kv: None,
            coordinator,
            policy,
        }
    }

    /// Attach the key-value store so `purge_assets` also drops tiny entries.
    pub fn with_kv(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn policy(&self) -> &AgingPolicy {
        &self.policy
    }

    /// One full aging pass: trim LCDs, then purge scratch directories.
    pub fn run(&self) -> Result<AgingResult, MetadataError> {
        let start = Instant::now();
        let mut result = AgingResult::default();
        self.age_lcd(&mut result)?;
        result.scratch_dirs_removed = self.purge_scratch();
        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Number of LCD holders visited before (or at/after) `time`.
    pub fn count_lcd_by_visit_time(&self, time: i64, before: bool) -> Result<u64, MetadataError> {
        self.metadata.count_lcd_by_visit_time(time, before)
    }

    /// LCD candidates the next run would remove, oldest first.
    pub fn pending_lcd(&self) -> Result<Vec<LcdCandidate>, MetadataError> {
        let count = self.metadata.lcd_count()?;
        match count.checked_sub(self.policy.lcd_aging_threshold) {
            Some(overflow) if overflow > 0 => self.metadata.aging_candidates(overflow as usize),
            _ => Ok(Vec::new()),
        }
    }

    fn age_lcd(&self, result: &mut AgingResult) -> Result<(), MetadataError> {
        let count = self.metadata.lcd_count()?;
        result.lcd_count_before = count;
        if count <= self.policy.lcd_aging_threshold {
            debug!(
                lcd_count = count,
                threshold = self.policy.lcd_aging_threshold,
                "LCD count within threshold, no aging needed"
            );
            return Ok(());
        }

        let overflow = (count - self.policy.lcd_aging_threshold) as usize;
        info!(
            lcd_count = count,
            threshold = self.policy.lcd_aging_threshold,
            overflow,
            "LCD count over threshold, aging oldest"
        );

        for candidate in self.metadata.aging_candidates(overflow)? {
            let key = DerivativeKey::new(candidate.asset_id, DerivativeClass::Lcd);
            let Some(guard) = self.coordinator.try_claim(key) else {
                debug!(asset_id = candidate.asset_id, "LCD generation in flight, skipping");
                result.skipped_in_flight += 1;
                continue;
            };
            match self.remove_lcd(&candidate) {
                Ok(()) => result.lcd_removed += 1,
                Err(e) => {
                    // Keep going; the next run picks the row up again
                    warn!(asset_id = candidate.asset_id, error = %e, "Failed to age LCD");
                    result.lcd_failed += 1;
                }
            }
            // Waiters see the LCD as absent
            guard.complete(false);
        }
        Ok(())
    }

    fn remove_lcd(&self, candidate: &LcdCandidate) -> Result<(), String> {
        let existed = self
            .store
            .delete(&candidate.source_path, DerivativeKind::Lcd)
            .map_err(|e| e.to_string())?;
        if !existed {
            debug!(asset_id = candidate.asset_id, "LCD file already absent");
        }
        self.metadata
            .reset_lcd(candidate.asset_id)
            .map_err(|e| e.to_string())
    }

    /// Remove prefixed scratch directories and orphaned THM_EX directories.
    ///
    /// Returns the number of directories removed.
    pub fn purge_scratch(&self) -> usize {
        let mut removed = 0;
        self.purge_scratch_in(&self.store.thumbs_root(), &mut removed);
        if removed > 0 {
            info!(removed, "Purged scratch directories");
        }
        removed
    }

    fn purge_scratch_in(&self, dir: &Path, removed: &mut usize) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Failed to read directory during scratch scan");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&self.policy.scratch_prefix) || self.is_orphaned_ex(&name, &entry) {
                match fs::remove_dir_all(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "Removed scratch directory");
                        *removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
                    }
                }
            } else {
                self.purge_scratch_in(&path, removed);
            }
        }
    }

    fn is_orphaned_ex(&self, name: &str, entry: &fs::DirEntry) -> bool {
        if name != EX_DIR {
            return false;
        }
        entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| age_of(modified) > self.policy.scratch_max_age)
            .unwrap_or(false)
    }

    /// Drop every derivative of assets that are being purged: the
    /// derivative directory and both tiny entries.
    ///
    /// Returns the number of assets fully cleaned.
    pub fn purge_assets(&self, assets: &[AssetDerivativeRequest]) -> usize {
        let mut purged = 0;
        for asset in assets {
            let mut ok = true;
            if let Some(kv) = &self.kv {
                let key = tiny_key(asset.capture_time, asset.asset_id);
                for kind in [DerivativeKind::MonthTiny, DerivativeKind::YearTiny] {
                    if let Err(e) = kv.delete(kind, &key) {
                        warn!(asset_id = asset.asset_id, kind = %kind, error = %e, "Failed to delete tiny entry");
                        ok = false;
                    }
                }
            }
            if let Err(e) = self.store.delete_asset_dir(&asset.source_path) {
                warn!(asset_id = asset.asset_id, error = %e, "Failed to delete derivative directory");
                ok = false;
            }
            if ok {
                purged += 1;
            }
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AssetRecord, SqliteMetadataStore};
    use crate::store::MemoryKvStore;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        metadata: Arc<SqliteMetadataStore>,
        coordinator: Arc<DerivativeCoordinator>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                temp: TempDir::new().unwrap(),
                metadata: Arc::new(SqliteMetadataStore::open_in_memory().unwrap()),
                coordinator: Arc::new(DerivativeCoordinator::new()),
            }
        }

        fn store(&self) -> DerivativeStore {
            DerivativeStore::new(self.temp.path())
        }

        fn manager(&self, threshold: u64) -> AgingEvictionManager {
            let policy = AgingPolicy {
                lcd_aging_threshold: threshold,
                ..AgingPolicy::default()
            };
            AgingEvictionManager::new(
                self.store(),
                self.metadata.clone(),
                self.coordinator.clone(),
                policy,
            )
        }

        /// Asset with an LCD file visited at `visit`.
        fn add_lcd(&self, id: i64, visit: i64) {
            let source = self.temp.path().join(format!("{}.jpg", id));
            let mut record = AssetRecord::new(id, &source);
            record.lcd_visit_time = visit;
            self.metadata.insert(&record).unwrap();
            self.store()
                .save(&source, DerivativeKind::Lcd, b"lcd")
                .unwrap();
        }

        fn has_lcd(&self, id: i64) -> bool {
            let source = self.temp.path().join(format!("{}.jpg", id));
            self.store().exists(&source, DerivativeKind::Lcd)
        }
    }

    fn set_dir_age(path: &Path, age: Duration) {
        let mtime = SystemTime::now() - age;
        filetime::set_file_mtime(path, filetime::FileTime::from_system_time(mtime)).unwrap();
    }

    #[test]
    fn test_under_threshold_is_noop() {
        let fx = Fixture::new();
        for id in 1..=3 {
            fx.add_lcd(id, 1000 + id);
        }
        let result = fx.manager(3).run().unwrap();
        assert_eq!(result.lcd_count_before, 3);
        assert!(result.is_noop());
        assert!(fx.has_lcd(1));
    }

    #[test]
    fn test_removes_oldest_first() {
        let fx = Fixture::new();
        fx.add_lcd(1, 5000);
        fx.add_lcd(2, 1000);
        fx.add_lcd(3, 3000);
        fx.add_lcd(4, 2000);

        let result = fx.manager(2).run().unwrap();
        assert_eq!(result.lcd_removed, 2);
        assert!(!fx.has_lcd(2));
        assert!(!fx.has_lcd(4));
        assert!(fx.has_lcd(1));
        assert!(fx.has_lcd(3));
        assert_eq!(fx.metadata.lcd_count().unwrap(), 2);

        // Idempotent: a second run finds nothing to do
        assert!(fx.manager(2).run().unwrap().is_noop());
    }

    #[test]
    fn test_skips_in_flight_lcd() {
        let fx = Fixture::new();
        fx.add_lcd(1, 1000);
        fx.add_lcd(2, 2000);

        let manager = fx.manager(1);
        let claim = fx
            .coordinator
            .claim(DerivativeKey::new(1, DerivativeClass::Lcd));
        let result = manager.run().unwrap();
        assert_eq!(result.skipped_in_flight, 1);
        assert_eq!(result.lcd_removed, 0);
        assert!(fx.has_lcd(1));
        if let crate::coordinator::ClaimOutcome::Claimed(guard) = claim {
            guard.complete(true);
        }
    }

    #[test]
    fn test_missing_file_still_resets_metadata() {
        let fx = Fixture::new();
        fx.add_lcd(1, 1000);
        fx.add_lcd(2, 2000);
        let source = fx.temp.path().join("1.jpg");
        fx.store().delete(&source, DerivativeKind::Lcd).unwrap();

        let result = fx.manager(1).run().unwrap();
        assert_eq!(result.lcd_removed, 1);
        assert_eq!(fx.metadata.lcd_count().unwrap(), 1);
    }

    #[test]
    fn test_purge_scratch() {
        let fx = Fixture::new();
        let asset_dir = fx.temp.path().join(".thumbs/DCIM/a.jpg");
        let prefixed = asset_dir.join("beginTimeStamp1700000000");
        let stale_ex = fx.temp.path().join(".thumbs/DCIM/b.jpg").join(EX_DIR);
        let fresh_ex = fx.temp.path().join(".thumbs/DCIM/c.jpg").join(EX_DIR);
        for dir in [&prefixed, &stale_ex, &fresh_ex] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(asset_dir.join("THM.jpg"), b"thm").unwrap();
        set_dir_age(&stale_ex, Duration::from_secs(3 * 24 * 60 * 60));

        let removed = fx.manager(10).purge_scratch();
        assert_eq!(removed, 2);
        assert!(!prefixed.exists());
        assert!(!stale_ex.exists());
        assert!(fresh_ex.exists());
        assert!(asset_dir.join("THM.jpg").exists());
    }

    #[test]
    fn test_purge_assets_drops_tiny_and_files() {
        let fx = Fixture::new();
        let kv = Arc::new(MemoryKvStore::new());
        let source = fx.temp.path().join("a.jpg");
        let request = AssetDerivativeRequest::new(5, &source).with_capture_time(42);
        let key = tiny_key(42, 5);
        kv.put(DerivativeKind::MonthTiny, &key, b"m").unwrap();
        kv.put(DerivativeKind::YearTiny, &key, b"y").unwrap();
        fx.store()
            .save(&source, DerivativeKind::Thumb, b"thm")
            .unwrap();

        let manager = fx.manager(10).with_kv(kv.clone());
        assert_eq!(manager.purge_assets(&[request]), 1);
        assert!(kv.get(DerivativeKind::MonthTiny, &key).unwrap().is_none());
        assert!(kv.get(DerivativeKind::YearTiny, &key).unwrap().is_none());
        assert!(!fx.store().exists(&source, DerivativeKind::Thumb));
    }

    #[test]
    fn test_pending_lcd_lists_overflow() {
        let fx = Fixture::new();
        for id in 1..=5 {
            fx.add_lcd(id, 100 * id);
        }
        let pending = fx.manager(3).pending_lcd().unwrap();
        let ids: Vec<i64> = pending.iter().map(|c| c.asset_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
