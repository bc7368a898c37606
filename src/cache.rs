use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::asset::{AlarmStatusUpdate, AssetViewModel, DomainAsset, StatusUpdate};

/// Keyed store of asset view-models.
///
/// Iteration order is the order in which ids were first inserted; refreshing an
/// existing id keeps its position.
#[derive(Debug, Default)]
pub struct AssetCache {
    provider: HashMap<String, AssetViewModel>,
    order: Vec<String>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.provider.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provider.is_empty()
    }

    /// Snapshot of all cached view-models.
    pub fn get(&self) -> Vec<AssetViewModel> {
        self.order
            .iter()
            .filter_map(|id| self.provider.get(id))
            .cloned()
            .collect()
    }

    pub fn get_by_id(&self, id: &str) -> Option<AssetViewModel> {
        self.provider.get(id).cloned()
    }

    /// Makes the cache hold exactly the given assets.
    ///
    /// Ids not in `assets` are dropped first, then every asset is derived
    /// again. Known ids keep their sticky fields. `None` leaves the cache as
    /// it is.
    pub fn keep(&mut self, assets: Option<&[DomainAsset]>) {
        let Some(assets) = assets else {
            return;
        };
        self.remove_stale(assets);
        self.upsert(assets);
    }

    /// Sets the alarm of every known asset. The timestamp only moves forward.
    /// Returns how many updates named an unknown asset.
    pub fn sync_alarm_statuses(&mut self, updates: Option<&[AlarmStatusUpdate]>) -> usize {
        let Some(updates) = updates else {
            return 0;
        };
        let mut dropped = 0;
        for update in updates {
            let Some(base) = self.provider.get_mut(&update.asset_id) else {
                dropped += 1;
                continue;
            };
            base.asset_alarm = Some(update.alarm.clone());
            if update.last_updated_timestamp > base.last_updated_timestamp {
                base.last_updated_timestamp = update.last_updated_timestamp;
            }
        }
        debug!("Synced {} alarm statuses", updates.len() - dropped);
        if dropped > 0 {
            warn!("Dropped {dropped} alarm statuses for unknown assets");
        }
        dropped
    }

    /// Sets the utilization status of every known asset. The timestamp only
    /// moves forward. Returns how many updates named an unknown asset.
    pub fn sync_utilization_statuses(&mut self, updates: Option<&[StatusUpdate]>) -> usize {
        let Some(updates) = updates else {
            return 0;
        };
        let mut dropped = 0;
        for update in updates {
            let Some(base) = self.provider.get_mut(&update.asset_id) else {
                dropped += 1;
                continue;
            };
            base.status = Some(update.status.clone());
            if update.last_updated_timestamp > base.last_updated_timestamp {
                base.last_updated_timestamp = update.last_updated_timestamp;
            }
        }
        debug!("Synced {} utilization statuses", updates.len() - dropped);
        if dropped > 0 {
            warn!("Dropped {dropped} utilization statuses for unknown assets");
        }
        dropped
    }

    fn remove_stale(&mut self, assets: &[DomainAsset]) {
        let keep: HashSet<&str> = assets.iter().map(|a| a.id.as_str()).collect();
        let before = self.provider.len();
        self.provider.retain(|id, _| keep.contains(id.as_str()));
        self.order.retain(|id| keep.contains(id.as_str()));
        trace!("Removed {} stale assets", before - self.provider.len());
    }

    fn upsert(&mut self, assets: &[DomainAsset]) {
        let derived: Vec<AssetViewModel> = assets.par_iter().map(AssetViewModel::from_asset).collect();
        for mut vm in derived {
            match self.provider.get(&vm.id) {
                Some(previous) => vm.keep_sticky_from(previous),
                None => self.order.push(vm.id.clone()),
            }
            self.provider.insert(vm.id.clone(), vm);
        }
        debug!("Cache holds {} assets", self.provider.len());
    }
}

/// Thread safe handle to an [`AssetCache`]. Every call holds the lock for its
/// whole duration.
#[derive(Debug, Clone, Default)]
pub struct SharedAssetCache {
    inner: Arc<Mutex<AssetCache>>,
}

impl SharedAssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AssetCache> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn keep(&self, assets: Option<&[DomainAsset]>) {
        self.lock().keep(assets)
    }

    pub fn sync_alarm_statuses(&self, updates: Option<&[AlarmStatusUpdate]>) -> usize {
        self.lock().sync_alarm_statuses(updates)
    }

    pub fn sync_utilization_statuses(&self, updates: Option<&[StatusUpdate]>) -> usize {
        self.lock().sync_utilization_statuses(updates)
    }

    pub fn get(&self) -> Vec<AssetViewModel> {
        self.lock().get()
    }

    pub fn get_by_id(&self, id: &str) -> Option<AssetViewModel> {
        self.lock().get_by_id(id)
    }
}
