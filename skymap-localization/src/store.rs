//! In-memory localization store.
//!
//! Holds ingested localizations keyed by id, their properties and tags, and
//! the derived-view cache. Deleting a localization removes its annotations
//! and cached views with it; deleting an event removes all of its
//! localizations.
//!
//! Lock order: `localizations` first, then annotations and the cache. Every
//! write tied to a localization holds the `localizations` lock across the
//! existence check and the write, so a concurrent delete cannot leave
//! orphans behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::access::{require, Actor, Operation};
use crate::cache::DerivedViewCache;
use crate::errors::{LocalizationError, LocalizationResult};
use crate::map::MultiOrderMap;
use crate::materialize::SpatialTile;
use crate::raster::Raster;
use crate::record::{LocalizationId, LocalizationProperty, LocalizationTag, SkyLocalization};

/// Counts of what a deletion removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub localizations: usize,
    pub properties: usize,
    pub tags: usize,
    pub cached_views: usize,
}

impl std::ops::AddAssign for DeleteReport {
    fn add_assign(&mut self, other: Self) {
        self.localizations += other.localizations;
        self.properties += other.properties;
        self.tags += other.tags;
        self.cached_views += other.cached_views;
    }
}

#[derive(Debug, Default)]
pub struct LocalizationStore {
    localizations: RwLock<HashMap<LocalizationId, Arc<SkyLocalization>>>,
    properties: RwLock<Vec<LocalizationProperty>>,
    tags: RwLock<Vec<LocalizationTag>>,
    cache: DerivedViewCache,
    next_annotation_id: AtomicU64,
}

impl LocalizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a validated map under a new id.
    pub fn ingest(
        &self,
        actor: &Actor,
        dateobs: DateTime<Utc>,
        localization_name: Option<String>,
        map: MultiOrderMap,
    ) -> LocalizationId {
        self.insert(SkyLocalization::new(dateobs, localization_name, actor.user_id, map))
    }

    /// Stores a prepared record, e.g. one built with
    /// [`SkyLocalization::with_contour`].
    pub fn insert(&self, record: SkyLocalization) -> LocalizationId {
        let id = record.id;
        log::info!(
            "ingested localization {} for event {} ({} tiles, 3d={})",
            id,
            record.dateobs,
            record.map.len(),
            record.is_3d()
        );
        self.localizations.write().insert(id, Arc::new(record));
        id
    }

    pub fn get(&self, id: LocalizationId) -> LocalizationResult<Arc<SkyLocalization>> {
        self.localizations
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| LocalizationError::not_found(id))
    }

    /// All localizations of one event, oldest first.
    pub fn by_event(&self, dateobs: DateTime<Utc>) -> Vec<Arc<SkyLocalization>> {
        event_records(&self.localizations.read(), dateobs)
    }

    /// Replaces the GeoJSON contours of a localization.
    pub fn set_contour(
        &self,
        actor: &Actor,
        id: LocalizationId,
        contour: serde_json::Value,
    ) -> LocalizationResult<()> {
        let mut localizations = self.localizations.write();
        let record = localizations
            .get(&id)
            .ok_or_else(|| LocalizationError::not_found(id))?;
        require(actor, record.as_ref(), Operation::Update)?;
        let updated = SkyLocalization::clone(record).with_contour(contour)?;
        localizations.insert(id, Arc::new(updated));
        log::debug!("updated contour of localization {}", id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.localizations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.localizations.read().is_empty()
    }

    pub fn raster(
        &self,
        id: LocalizationId,
        order: u32,
        with_distance: bool,
    ) -> LocalizationResult<Arc<Raster>> {
        let localizations = self.localizations.read();
        let record = localizations
            .get(&id)
            .ok_or_else(|| LocalizationError::not_found(id))?;
        self.cache.raster(id, &record.map, order, with_distance)
    }

    pub fn tiles(&self, id: LocalizationId, order: u32) -> LocalizationResult<Arc<Vec<SpatialTile>>> {
        let localizations = self.localizations.read();
        let record = localizations
            .get(&id)
            .ok_or_else(|| LocalizationError::not_found(id))?;
        self.cache.tiles(id, &record.map, order)
    }

    pub fn cache(&self) -> &DerivedViewCache {
        &self.cache
    }

    pub fn add_property(
        &self,
        actor: &Actor,
        id: LocalizationId,
        data: serde_json::Value,
    ) -> LocalizationResult<u64> {
        let localizations = self.localizations.read();
        let record = localizations
            .get(&id)
            .ok_or_else(|| LocalizationError::not_found(id))?;
        require(actor, record.as_ref(), Operation::Create)?;
        let property = LocalizationProperty {
            id: self.next_id(),
            localization_id: id,
            sent_by: actor.user_id,
            created_at: Utc::now(),
            data,
        };
        let property_id = property.id;
        self.properties.write().push(property);
        Ok(property_id)
    }

    pub fn add_tag(
        &self,
        actor: &Actor,
        id: LocalizationId,
        text: impl Into<String>,
    ) -> LocalizationResult<u64> {
        let localizations = self.localizations.read();
        let record = localizations
            .get(&id)
            .ok_or_else(|| LocalizationError::not_found(id))?;
        require(actor, record.as_ref(), Operation::Create)?;
        let tag = LocalizationTag {
            id: self.next_id(),
            localization_id: id,
            sent_by: actor.user_id,
            created_at: Utc::now(),
            text: text.into(),
        };
        let tag_id = tag.id;
        self.tags.write().push(tag);
        Ok(tag_id)
    }

    pub fn properties(&self, id: LocalizationId) -> Vec<LocalizationProperty> {
        self.properties
            .read()
            .iter()
            .filter(|p| p.localization_id == id)
            .cloned()
            .collect()
    }

    pub fn tags(&self, id: LocalizationId) -> Vec<LocalizationTag> {
        self.tags
            .read()
            .iter()
            .filter(|t| t.localization_id == id)
            .cloned()
            .collect()
    }

    pub fn delete_property(&self, actor: &Actor, property_id: u64) -> LocalizationResult<()> {
        let mut properties = self.properties.write();
        let index = properties
            .iter()
            .position(|p| p.id == property_id)
            .ok_or_else(|| LocalizationError::not_found(format!("property {}", property_id)))?;
        require(actor, &properties[index], Operation::Delete)?;
        properties.remove(index);
        Ok(())
    }

    pub fn delete_tag(&self, actor: &Actor, tag_id: u64) -> LocalizationResult<()> {
        let mut tags = self.tags.write();
        let index = tags
            .iter()
            .position(|t| t.id == tag_id)
            .ok_or_else(|| LocalizationError::not_found(format!("tag {}", tag_id)))?;
        require(actor, &tags[index], Operation::Delete)?;
        tags.remove(index);
        Ok(())
    }

    /// Deletes one localization with its properties, tags and cached views.
    pub fn delete(&self, actor: &Actor, id: LocalizationId) -> LocalizationResult<DeleteReport> {
        let mut localizations = self.localizations.write();
        let record = localizations
            .get(&id)
            .ok_or_else(|| LocalizationError::not_found(id))?;
        require(actor, record.as_ref(), Operation::Delete)?;
        Ok(self.remove_cascade(&mut localizations, id))
    }

    /// Deletes every localization of an event. Nothing is removed unless the
    /// actor may delete all of them.
    pub fn delete_event(
        &self,
        actor: &Actor,
        dateobs: DateTime<Utc>,
    ) -> LocalizationResult<DeleteReport> {
        let mut localizations = self.localizations.write();
        let records = event_records(&localizations, dateobs);
        for record in &records {
            require(actor, record.as_ref(), Operation::Delete)?;
        }
        let mut report = DeleteReport::default();
        for record in &records {
            report += self.remove_cascade(&mut localizations, record.id);
        }
        log::info!(
            "deleted event {}: {} localizations",
            dateobs,
            report.localizations
        );
        Ok(report)
    }

    /// Called with the `localizations` write lock held.
    fn remove_cascade(
        &self,
        localizations: &mut HashMap<LocalizationId, Arc<SkyLocalization>>,
        id: LocalizationId,
    ) -> DeleteReport {
        let removed = usize::from(localizations.remove(&id).is_some());

        let mut properties = self.properties.write();
        let before = properties.len();
        properties.retain(|p| p.localization_id != id);
        let properties_removed = before - properties.len();
        drop(properties);

        let mut tags = self.tags.write();
        let before = tags.len();
        tags.retain(|t| t.localization_id != id);
        let tags_removed = before - tags.len();
        drop(tags);

        let report = DeleteReport {
            localizations: removed,
            properties: properties_removed,
            tags: tags_removed,
            cached_views: self.cache.evict(id),
        };
        log::debug!("deleted localization {}: {:?}", id, report);
        report
    }

    fn next_id(&self) -> u64 {
        self.next_annotation_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn event_records(
    localizations: &HashMap<LocalizationId, Arc<SkyLocalization>>,
    dateobs: DateTime<Utc>,
) -> Vec<Arc<SkyLocalization>> {
    let mut found: Vec<_> = localizations
        .values()
        .filter(|loc| loc.dateobs == dateobs)
        .cloned()
        .collect();
    found.sort_by_key(|loc| loc.created_at);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UserId;
    use serde_json::json;
    use std::f64::consts::PI;

    fn event(text: &str) -> DateTime<Utc> {
        text.parse().unwrap()
    }

    fn all_sky() -> MultiOrderMap {
        MultiOrderMap::new((4..16).collect(), vec![1.0 / (4.0 * PI); 12], None).unwrap()
    }

    #[test]
    fn test_ingest_and_get() {
        let store = LocalizationStore::new();
        let alice = Actor::user(UserId(1));
        let id = store.ingest(&alice, event("2019-04-25T08:18:05Z"), Some("bayestar".into()), all_sky());
        let record = store.get(id).unwrap();
        assert_eq!(record.sent_by, UserId(1));
        assert_eq!(record.localization_name.as_deref(), Some("bayestar"));
        assert_eq!(store.by_event(event("2019-04-25T08:18:05Z")).len(), 1);
        assert!(store.by_event(event("2019-04-25T08:18:06Z")).is_empty());
    }

    #[test]
    fn test_missing_is_not_found() {
        let store = LocalizationStore::new();
        let err = store.get(LocalizationId::new()).unwrap_err();
        assert!(matches!(err, LocalizationError::NotFound { .. }));
    }

    #[test]
    fn test_delete_cascades() {
        let store = LocalizationStore::new();
        let e1 = event("2017-08-17T12:41:04Z");
        let alice = Actor::user(UserId(1));
        let bob = Actor::user(UserId(2));
        let id = store.ingest(&alice, e1, None, all_sky());
        store.add_property(&bob, id, json!({"distance": 40.0})).unwrap();
        store.add_tag(&alice, id, "preliminary").unwrap();
        store.raster(id, 1, false).unwrap();
        store.tiles(id, 0).unwrap();

        let err = store.delete(&bob, id).unwrap_err();
        assert!(matches!(err, LocalizationError::PermissionDenied { .. }));
        assert_eq!(store.len(), 1);

        let report = store.delete(&alice, id).unwrap();
        assert_eq!(
            report,
            DeleteReport {
                localizations: 1,
                properties: 1,
                tags: 1,
                cached_views: 2
            }
        );
        assert!(store.is_empty());
        assert!(store.properties(id).is_empty());
        assert!(store.tags(id).is_empty());
        assert!(store.cache().is_empty());
    }

    #[test]
    fn test_annotation_delete_requires_owner() {
        let store = LocalizationStore::new();
        let e1 = event("2017-08-17T12:41:04Z");
        let alice = Actor::user(UserId(1));
        let bob = Actor::user(UserId(2));
        let id = store.ingest(&alice, e1, None, all_sky());
        let tag = store.add_tag(&bob, id, "bob's").unwrap();

        assert!(store.delete_tag(&alice, tag).is_err());
        store.delete_tag(&Actor::admin(UserId(9)), tag).unwrap();
        assert!(store.tags(id).is_empty());
        assert!(matches!(
            store.delete_tag(&bob, tag).unwrap_err(),
            LocalizationError::NotFound { .. }
        ));
    }

    #[test]
    fn test_delete_event_is_all_or_nothing() {
        let store = LocalizationStore::new();
        let e1 = event("2017-08-17T12:41:04Z");
        let e2 = event("2019-04-25T08:18:05Z");
        let alice = Actor::user(UserId(1));
        let bob = Actor::user(UserId(2));
        store.ingest(&alice, e1, None, all_sky());
        store.ingest(&bob, e1, None, all_sky());
        store.ingest(&alice, e2, None, all_sky());

        assert!(store.delete_event(&alice, e1).is_err());
        assert_eq!(store.len(), 3);

        let report = store.delete_event(&Actor::admin(UserId(0)), e1).unwrap();
        assert_eq!(report.localizations, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_annotations_do_not_outlive_delete() {
        let store = LocalizationStore::new();
        let alice = Actor::user(UserId(1));
        for round in 0..20 {
            let id = store.ingest(&alice, event("2017-08-17T12:41:04Z"), None, all_sky());
            std::thread::scope(|scope| {
                for worker in 0..4 {
                    let (store, alice) = (&store, &alice);
                    scope.spawn(move || {
                        for i in 0..50 {
                            let _ = store.add_tag(alice, id, format!("{}-{}-{}", round, worker, i));
                            let _ = store.add_property(alice, id, json!({ "i": i }));
                            let _ = store.raster(id, (i % 3) as u32, false);
                        }
                    });
                }
                scope.spawn(|| store.delete(&alice, id).unwrap());
            });
            assert!(store.tags(id).is_empty());
            assert!(store.properties(id).is_empty());
            assert!(store.cache().is_empty());
            assert!(matches!(
                store.add_tag(&alice, id, "late").unwrap_err(),
                LocalizationError::NotFound { .. }
            ));
        }
    }

    #[test]
    fn test_contours() {
        let store = LocalizationStore::new();
        let alice = Actor::user(UserId(1));
        let bob = Actor::user(UserId(2));
        let contour = json!({"type": "FeatureCollection", "features": []});
        let record = SkyLocalization::new(event("2019-04-25T08:18:05Z"), None, alice.user_id, all_sky())
            .with_contour(contour.clone())
            .unwrap();
        let id = store.insert(record);
        assert_eq!(store.get(id).unwrap().contour, Some(contour));

        let updated = json!({"type": "Feature", "geometry": null, "properties": {}});
        assert!(matches!(
            store.set_contour(&bob, id, updated.clone()).unwrap_err(),
            LocalizationError::PermissionDenied { .. }
        ));
        assert!(store.set_contour(&alice, id, json!("not geojson")).is_err());
        store.set_contour(&alice, id, updated.clone()).unwrap();
        assert_eq!(store.get(id).unwrap().contour, Some(updated));
    }
}
