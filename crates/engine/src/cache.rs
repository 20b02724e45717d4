use std::collections::HashMap;
use std::sync::RwLock;

use vistaar_core::{
    ids::AreaId,
    scope::{EntityRef, Variant},
};

use crate::resolve::Resolved;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    entity: EntityRef,
    area: AreaId,
    variant: Variant,
}

/// Memoizes resolution results per (entity, area, variant), including
/// resolved absence. No TTL: coherence depends entirely on
/// `invalidate` being called for every override write.
///
/// The map carries a version that bumps on each invalidation; a
/// computation started before an invalidation will not be stored after
/// it, so readers never re-publish a stale value.
pub struct EffectiveValueCache {
    inner: RwLock<Inner>,
}

struct Inner {
    entries: HashMap<CacheKey, Option<Resolved>>,
    version: u64,
}

impl Default for EffectiveValueCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectiveValueCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                version: 0,
            }),
        }
    }

    /// Outer `None` = miss; inner value is the cached resolution
    /// (which may itself be an absence). Also returns the version the
    /// read was made at, for `store_if_current`.
    pub fn lookup(
        &self,
        entity: EntityRef,
        area: AreaId,
        variant: Variant,
    ) -> (Option<Option<Resolved>>, u64) {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let key = CacheKey { entity, area, variant };
        (inner.entries.get(&key).cloned(), inner.version)
    }

    /// Publish a computed value unless an invalidation landed since the
    /// miss was observed at `seen_version`.
    pub fn store_if_current(
        &self,
        entity: EntityRef,
        area: AreaId,
        variant: Variant,
        value: Option<Resolved>,
        seen_version: u64,
    ) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.version != seen_version {
            return;
        }
        inner.entries.insert(CacheKey { entity, area, variant }, value);
    }

    /// Clear every entry matching the filter; `None` = wildcard. An
    /// override change at a general scope can alter the effective value
    /// for every descendant area, so callers typically wildcard the
    /// area dimension.
    pub fn invalidate(
        &self,
        entity: EntityRef,
        area: Option<AreaId>,
        variant: Option<Variant>,
    ) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.version += 1;
        inner.entries.retain(|key, _| {
            !(key.entity == entity
                && area.is_none_or(|a| key.area == a)
                && variant.is_none_or(|v| key.variant == v))
        });
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.version += 1;
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vistaar_core::payload::{OverridePayload, VisibilityFlags};
    use vistaar_core::scope::Scope;

    fn entity(id: i64) -> EntityRef {
        EntityRef::from_parts("product", id).unwrap()
    }

    fn resolved() -> Option<Resolved> {
        Some(Resolved {
            payload: OverridePayload::Visibility(VisibilityFlags {
                general: true,
                ..Default::default()
            }),
            scope: Scope::Global,
        })
    }

    #[test]
    fn miss_store_hit() {
        let cache = EffectiveValueCache::new();
        let area = AreaId::new(1);
        let (hit, version) = cache.lookup(entity(1), area, Variant::Visibility);
        assert!(hit.is_none());

        cache.store_if_current(entity(1), area, Variant::Visibility, resolved(), version);
        let (hit, _) = cache.lookup(entity(1), area, Variant::Visibility);
        assert_eq!(hit, Some(resolved()));
    }

    #[test]
    fn cached_absence_is_a_hit() {
        let cache = EffectiveValueCache::new();
        let area = AreaId::new(1);
        let (_, version) = cache.lookup(entity(1), area, Variant::Price);
        cache.store_if_current(entity(1), area, Variant::Price, None, version);
        let (hit, _) = cache.lookup(entity(1), area, Variant::Price);
        assert_eq!(hit, Some(None));
    }

    #[test]
    fn wildcard_area_invalidation_clears_all_areas() {
        let cache = EffectiveValueCache::new();
        for raw in 1..=3 {
            let (_, v) = cache.lookup(entity(1), AreaId::new(raw), Variant::Margin);
            cache.store_if_current(entity(1), AreaId::new(raw), Variant::Margin, resolved(), v);
        }
        let (_, v) = cache.lookup(entity(2), AreaId::new(1), Variant::Margin);
        cache.store_if_current(entity(2), AreaId::new(1), Variant::Margin, resolved(), v);

        cache.invalidate(entity(1), None, Some(Variant::Margin));

        for raw in 1..=3 {
            let (hit, _) = cache.lookup(entity(1), AreaId::new(raw), Variant::Margin);
            assert!(hit.is_none());
        }
        // Other entity untouched.
        let (hit, _) = cache.lookup(entity(2), AreaId::new(1), Variant::Margin);
        assert!(hit.is_some());
    }

    #[test]
    fn variant_filter_leaves_other_variants() {
        let cache = EffectiveValueCache::new();
        let area = AreaId::new(1);
        for variant in [Variant::Visibility, Variant::Price] {
            let (_, v) = cache.lookup(entity(1), area, variant);
            cache.store_if_current(entity(1), area, variant, resolved(), v);
        }

        cache.invalidate(entity(1), Some(area), Some(Variant::Price));
        let (price, _) = cache.lookup(entity(1), area, Variant::Price);
        let (vis, _) = cache.lookup(entity(1), area, Variant::Visibility);
        assert!(price.is_none());
        assert!(vis.is_some());
    }

    #[test]
    fn stale_store_dropped_after_invalidation() {
        let cache = EffectiveValueCache::new();
        let area = AreaId::new(1);
        let (_, version) = cache.lookup(entity(1), area, Variant::Price);

        // Invalidation lands between the miss and the store.
        cache.invalidate(entity(1), None, None);
        cache.store_if_current(entity(1), area, Variant::Price, resolved(), version);

        let (hit, _) = cache.lookup(entity(1), area, Variant::Price);
        assert!(hit.is_none());
    }
}
