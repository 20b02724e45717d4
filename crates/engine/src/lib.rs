pub mod cache;
pub mod error;
pub mod hierarchy;
pub mod order;
pub mod resolve;

pub use cache::EffectiveValueCache;
pub use error::EngineError;
pub use hierarchy::HierarchyIndex;
pub use order::{GstTreatment, OrderLine, OrderTotals, PricedLine};
pub use resolve::Resolved;

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use vistaar_core::{
    ids::{AreaId, OrderId, ProductId},
    level::AreaLevel,
    payload::OverridePayload,
    scope::{Channel, EntityRef, Scope, Tier, Variant},
};
use vistaar_storage::{OrderRow, OverrideStore};

use crate::order::compute_totals;

/// Resolution engine facade: owns the store, a swappable hierarchy
/// snapshot, and the effective-value cache. Reads (`resolve`,
/// `effective`, `validate_order`) take `&self` and are safe for
/// concurrent callers; writes go through `&mut self` and re-publish
/// snapshots / invalidate the cache themselves.
pub struct Engine<S: OverrideStore> {
    store: S,
    hierarchy: RwLock<Arc<HierarchyIndex>>,
    cache: EffectiveValueCache,
}

impl<S: OverrideStore> Engine<S> {
    /// Build the hierarchy index from the store's active areas. A
    /// malformed tree fails here and blocks startup.
    pub fn new(store: S) -> Result<Self, EngineError> {
        let areas = store.load_active_areas()?;
        let hierarchy = HierarchyIndex::build(&areas)?;
        info!(areas = hierarchy.len(), "hierarchy index built");
        Ok(Self {
            store,
            hierarchy: RwLock::new(Arc::new(hierarchy)),
            cache: EffectiveValueCache::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Current hierarchy snapshot; callers keep resolving against it
    /// even while a rebuild publishes a replacement.
    pub fn hierarchy(&self) -> Arc<HierarchyIndex> {
        self.hierarchy
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rebuild the index from the store and swap it in atomically. The
    /// cache is cleared wholesale: chain shapes may have changed under
    /// every cached entry.
    pub fn reload_hierarchy(&self) -> Result<(), EngineError> {
        let areas = self.store.load_active_areas()?;
        let rebuilt = Arc::new(HierarchyIndex::build(&areas)?);
        let mut slot = self.hierarchy.write().unwrap_or_else(|e| e.into_inner());
        *slot = rebuilt;
        drop(slot);
        self.cache.clear();
        debug!("hierarchy snapshot swapped");
        Ok(())
    }

    /// Uncached resolution straight against the store.
    pub fn resolve(
        &self,
        entity: EntityRef,
        variant: Variant,
        area_id: AreaId,
    ) -> Result<Option<Resolved>, EngineError> {
        let hierarchy = self.hierarchy();
        resolve::resolve_with(&self.store, &hierarchy, entity, variant, area_id)
    }

    /// Cached resolution: serves a memoized value (including memoized
    /// absence) when present, computes and publishes otherwise.
    pub fn effective(
        &self,
        entity: EntityRef,
        variant: Variant,
        area_id: AreaId,
    ) -> Result<Option<Resolved>, EngineError> {
        let (hit, version) = self.cache.lookup(entity, area_id, variant);
        if let Some(value) = hit {
            return Ok(value);
        }
        let value = self.resolve(entity, variant, area_id)?;
        self.cache
            .store_if_current(entity, area_id, variant, value.clone(), version);
        Ok(value)
    }

    /// Invalidation hook for the store-write path. `area` and `variant`
    /// are filters; pass `None` to wildcard. Writers at a general scope
    /// must wildcard the area, since descendants that previously fell
    /// through to the old value are all affected.
    pub fn on_override_written(
        &self,
        entity: EntityRef,
        area: Option<AreaId>,
        variant: Option<Variant>,
    ) {
        self.cache.invalidate(entity, area, variant);
    }

    /// Whether the entity is offered on the given channel at the area.
    /// Absent visibility means not visible.
    pub fn is_visible(
        &self,
        entity: EntityRef,
        area_id: AreaId,
        channel: Channel,
    ) -> Result<bool, EngineError> {
        match self.effective(entity, Variant::Visibility, area_id)? {
            Some(resolved) => match resolved.payload.as_visibility() {
                Some(flags) => Ok(flags.allows(channel)),
                None => Ok(false),
            },
            None => Ok(false),
        }
    }

    /// Price each line via resolution, apply retailer margins, compute
    /// GST, and re-check the monetary invariants. Fails with a business
    /// rejection (`NoPriceForArea`, `NotVisibleInArea`,
    /// `BelowMinOrderQty`) or, on a totals sanity failure,
    /// `InvariantViolation` — which must never be persisted.
    pub fn validate_order(
        &self,
        area_id: AreaId,
        lines: &[OrderLine],
        channel: Channel,
        treatment: GstTreatment,
    ) -> Result<OrderTotals, EngineError> {
        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            priced.push(self.price_line(area_id, *line, channel)?);
        }
        compute_totals(&priced, treatment)
    }

    /// Validate and persist an order with its line items.
    pub fn place_order(
        &mut self,
        area_id: AreaId,
        lines: &[OrderLine],
        channel: Channel,
        treatment: GstTreatment,
    ) -> Result<(OrderId, OrderTotals), EngineError> {
        let totals = self.validate_order(area_id, lines, channel, treatment)?;
        let order_id = OrderId::new();
        self.store.insert_order(&OrderRow {
            id: order_id,
            area_id,
            base_amount: totals.base_amount,
            discount_amount: totals.discount_amount,
            net_amount: totals.net_amount,
            igst_amount: totals.igst_amount,
            cgst_amount: totals.cgst_amount,
            sgst_amount: totals.sgst_amount,
            total_amount: totals.total_amount,
            items: lines.iter().map(|l| (l.product_id, l.quantity)).collect(),
        })?;
        info!(order_id = %order_id, area = %area_id, total = %totals.total_amount, "order placed");
        Ok((order_id, totals))
    }

    fn price_line(
        &self,
        area_id: AreaId,
        line: OrderLine,
        channel: Channel,
    ) -> Result<PricedLine, EngineError> {
        let product_id = line.product_id;
        let entity = EntityRef::Product(product_id);

        let product = self
            .store
            .get_product(product_id)?
            .filter(|p| p.active)
            .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))?;

        if !self.is_visible(entity, area_id, channel)? {
            return Err(EngineError::NotVisibleInArea {
                product_id: product_id.to_string(),
                area_id: area_id.to_string(),
            });
        }

        let resolved = self
            .effective(entity, Variant::Price, area_id)?
            .ok_or_else(|| EngineError::NoPriceForArea {
                product_id: product_id.to_string(),
                area_id: area_id.to_string(),
            })?;
        let terms = resolved
            .payload
            .as_price()
            .ok_or_else(|| {
                EngineError::Core(vistaar_core::CoreError::InvalidData(format!(
                    "price resolution for {entity} returned a {} payload",
                    resolved.payload.variant()
                )))
            })?
            .clone();

        if let Some(minimum) = terms
            .min_order_qty
            .and_then(|m| m.for_tier(Tier::Retailer))
        {
            if line.quantity < minimum {
                return Err(EngineError::BelowMinOrderQty {
                    product_id: product_id.to_string(),
                    quantity: line.quantity,
                    minimum,
                });
            }
        }

        // Margin override beats margins embedded in the price terms.
        let retailer_margin = match self.effective(entity, Variant::Margin, area_id)? {
            Some(m) => m
                .payload
                .as_margins()
                .and_then(|set| set.for_tier(Tier::Retailer)),
            None => terms
                .margins
                .and_then(|set| set.for_tier(Tier::Retailer)),
        };

        Ok(PricedLine {
            product_id,
            quantity: line.quantity,
            mrp: terms.mrp,
            retailer_margin,
            gst_rate: product.gst_rate,
        })
    }

    // ---- write-through admin helpers --------------------------------

    /// Write an override (deactivate-then-insert in the store) and
    /// invalidate the affected cache entries.
    pub fn put_override(
        &mut self,
        entity: EntityRef,
        scope: Scope,
        payload: &OverridePayload,
    ) -> Result<(), EngineError> {
        let variant = payload.variant();
        self.store.put_override(entity, scope, payload)?;
        self.on_override_written(entity, None, Some(variant));
        Ok(())
    }

    /// Revoke an override without replacement; invalidates on change.
    pub fn revoke_override(
        &mut self,
        entity: EntityRef,
        variant: Variant,
        scope: Scope,
    ) -> Result<bool, EngineError> {
        let removed = self.store.deactivate_override(entity, variant, scope)?;
        if removed {
            self.on_override_written(entity, None, Some(variant));
        }
        Ok(removed)
    }

    pub fn add_area(
        &mut self,
        name: &str,
        level: AreaLevel,
        parent_id: Option<AreaId>,
    ) -> Result<AreaId, EngineError> {
        let id = self.store.insert_area(name, level, parent_id)?;
        self.reload_hierarchy()?;
        Ok(id)
    }

    pub fn set_area_active(&mut self, area_id: AreaId, active: bool) -> Result<(), EngineError> {
        self.store.set_area_active(area_id, active)?;
        self.reload_hierarchy()?;
        Ok(())
    }

    pub fn add_product(
        &mut self,
        name: &str,
        code: &str,
        gst_rate: rust_decimal::Decimal,
    ) -> Result<ProductId, EngineError> {
        Ok(self.store.insert_product(name, code, gst_rate)?)
    }
}
