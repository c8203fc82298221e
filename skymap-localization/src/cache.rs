//! Memoized derived views.
//!
//! Rasters and materialized tiles are pure functions of an immutable map and
//! an order, so they are computed once per `(localization, order, kind)` and
//! shared behind `Arc`. Entries are dropped when the localization is deleted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::LocalizationResult;
use crate::map::MultiOrderMap;
use crate::materialize::{materialize, SpatialTile};
use crate::raster::{rasterize, rasterize_3d, Raster};
use crate::record::LocalizationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Raster2d,
    Raster3d,
    Tiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub localization_id: LocalizationId,
    pub order: u32,
    pub kind: ViewKind,
}

#[derive(Debug, Default)]
pub struct DerivedViewCache {
    rasters: RwLock<HashMap<ViewKey, Arc<Raster>>>,
    tiles: RwLock<HashMap<ViewKey, Arc<Vec<SpatialTile>>>>,
}

impl DerivedViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// RING-ordered raster; 3D when `with_distance` is set.
    pub fn raster(
        &self,
        id: LocalizationId,
        map: &MultiOrderMap,
        order: u32,
        with_distance: bool,
    ) -> LocalizationResult<Arc<Raster>> {
        let kind = if with_distance {
            ViewKind::Raster3d
        } else {
            ViewKind::Raster2d
        };
        let key = ViewKey {
            localization_id: id,
            order,
            kind,
        };
        if let Some(raster) = self.rasters.read().get(&key) {
            return Ok(Arc::clone(raster));
        }

        // Computed outside the lock; a concurrent miss may compute the same
        // raster twice, and the first insert wins.
        let raster = Arc::new(if with_distance {
            rasterize_3d(map, order)?
        } else {
            rasterize(map, order)?
        });
        Ok(Arc::clone(self.rasters.write().entry(key).or_insert(raster)))
    }

    pub fn tiles(
        &self,
        id: LocalizationId,
        map: &MultiOrderMap,
        order: u32,
    ) -> LocalizationResult<Arc<Vec<SpatialTile>>> {
        let key = ViewKey {
            localization_id: id,
            order,
            kind: ViewKind::Tiles,
        };
        if let Some(tiles) = self.tiles.read().get(&key) {
            return Ok(Arc::clone(tiles));
        }

        let tiles = Arc::new(materialize(id, map, order)?);
        Ok(Arc::clone(self.tiles.write().entry(key).or_insert(tiles)))
    }

    pub fn contains(&self, key: &ViewKey) -> bool {
        match key.kind {
            ViewKind::Tiles => self.tiles.read().contains_key(key),
            _ => self.rasters.read().contains_key(key),
        }
    }

    /// Drops every view of one localization; returns how many were removed.
    pub fn evict(&self, id: LocalizationId) -> usize {
        let removed = evict_from(&self.rasters, id) + evict_from(&self.tiles, id);
        if removed > 0 {
            log::debug!("evicted {} cached views of {}", removed, id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.rasters.read().len() + self.tiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_from<V>(views: &RwLock<HashMap<ViewKey, V>>, id: LocalizationId) -> usize {
    let mut views = views.write();
    let before = views.len();
    views.retain(|key, _| key.localization_id != id);
    before - views.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn all_sky() -> MultiOrderMap {
        MultiOrderMap::new((4..16).collect(), vec![1.0 / (4.0 * PI); 12], None).unwrap()
    }

    #[test]
    fn test_views_are_shared() {
        let cache = DerivedViewCache::new();
        let map = all_sky();
        let id = LocalizationId::new();

        let a = cache.raster(id, &map, 2, false).unwrap();
        let b = cache.raster(id, &map, 2, false).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let t1 = cache.tiles(id, &map, 1).unwrap();
        let t2 = cache.tiles(id, &map, 1).unwrap();
        assert!(Arc::ptr_eq(&t1, &t2));
        assert_eq!(t1.len(), 48);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_kinds_and_orders_are_distinct() {
        let cache = DerivedViewCache::new();
        let map = all_sky();
        let id = LocalizationId::new();
        cache.raster(id, &map, 1, false).unwrap();
        cache.raster(id, &map, 1, true).unwrap();
        cache.raster(id, &map, 2, false).unwrap();
        cache.tiles(id, &map, 1).unwrap();
        assert_eq!(cache.len(), 4);
        assert!(cache.contains(&ViewKey {
            localization_id: id,
            order: 1,
            kind: ViewKind::Raster3d
        }));
    }

    #[test]
    fn test_evict_only_touches_one_localization() {
        let cache = DerivedViewCache::new();
        let map = all_sky();
        let keep = LocalizationId::new();
        let gone = LocalizationId::new();
        cache.raster(keep, &map, 1, false).unwrap();
        cache.raster(gone, &map, 1, false).unwrap();
        cache.tiles(gone, &map, 0).unwrap();

        assert_eq!(cache.evict(gone), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evict(gone), 0);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cache = DerivedViewCache::new();
        let map = all_sky();
        assert!(cache.raster(LocalizationId::new(), &map, 20, false).is_err());
        assert!(cache.is_empty());
    }
}
