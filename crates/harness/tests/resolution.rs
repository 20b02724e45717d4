use std::cell::Cell;

use rust_decimal::dec;

use vistaar_core::{
    ids::{AreaId, BrandId, OverrideId, ProductId},
    level::AreaLevel,
    payload::{OverridePayload, PriceTerms},
    scope::{EntityRef, Scope, Variant},
};
use vistaar_engine::{Engine, EngineError};
use vistaar_harness::TestShop;
use vistaar_storage::{AreaRow, OverrideRow, OverrideStore, ProductRow, StorageError};

fn brand(raw: i64) -> EntityRef {
    EntityRef::Brand(BrandId::new(raw))
}

fn price(mrp: rust_decimal::Decimal) -> OverridePayload {
    OverridePayload::Price(PriceTerms {
        mrp,
        margins: None,
        min_order_qty: None,
    })
}

// ============================================================================
// Specificity and fallback
// ============================================================================

#[test]
fn area_override_beats_nation_override() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(1);

    shop.set_price(entity, Scope::Area(shop.nation), dec!(100), None)?;
    shop.set_price(entity, Scope::Area(shop.area), dec!(90), None)?;

    let resolved = shop
        .engine
        .resolve(entity, Variant::Price, shop.area)?
        .expect("override present");
    assert_eq!(resolved.scope, Scope::Area(shop.area));
    assert_eq!(resolved.payload.as_price().unwrap().mrp, dec!(90));
    Ok(())
}

#[test]
fn intermediate_scope_wins_over_more_general() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(2);

    shop.set_price(entity, Scope::Area(shop.nation), dec!(100), None)?;
    shop.set_price(entity, Scope::Area(shop.region), dec!(95), None)?;

    // Nothing at the AREA scope itself, so the REGION row applies.
    let resolved = shop
        .engine
        .resolve(entity, Variant::Price, shop.area)?
        .expect("override present");
    assert_eq!(resolved.scope, Scope::Area(shop.region));
    assert_eq!(resolved.payload.as_price().unwrap().mrp, dec!(95));
    Ok(())
}

#[test]
fn global_override_reaches_every_area() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(3);
    shop.set_price(entity, Scope::Global, dec!(60), None)?;

    for area in [shop.nation, shop.zone, shop.region, shop.area] {
        let resolved = shop
            .engine
            .resolve(entity, Variant::Price, area)?
            .expect("global fallback");
        assert_eq!(resolved.scope, Scope::Global);
        assert_eq!(resolved.payload.as_price().unwrap().mrp, dec!(60));
    }
    Ok(())
}

#[test]
fn absence_is_none_not_a_default() -> Result<(), Box<dyn std::error::Error>> {
    let shop = TestShop::new()?;
    let resolved = shop.engine.resolve(brand(4), Variant::Price, shop.area)?;
    assert!(resolved.is_none());
    Ok(())
}

#[test]
fn sibling_area_falls_through_to_shared_ancestor() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(5);
    let sibling = shop.add_sibling_area("Rohini")?;

    shop.set_price(entity, Scope::Area(shop.region), dec!(80), None)?;
    shop.set_price(entity, Scope::Area(shop.area), dec!(75), None)?;

    // The sibling has no AREA-level row, so it resolves at the region.
    let resolved = shop
        .engine
        .resolve(entity, Variant::Price, sibling)?
        .expect("region fallback");
    assert_eq!(resolved.scope, Scope::Area(shop.region));
    Ok(())
}

#[test]
fn resolution_is_idempotent_without_writes() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(6);
    shop.set_price(entity, Scope::Area(shop.zone), dec!(42), None)?;

    let first = shop.engine.resolve(entity, Variant::Price, shop.area)?;
    let second = shop.engine.resolve(entity, Variant::Price, shop.area)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn unknown_target_area_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let shop = TestShop::new()?;
    let err = shop
        .engine
        .resolve(brand(7), Variant::Price, AreaId::new(999))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    Ok(())
}

// ============================================================================
// Hierarchy rebuild
// ============================================================================

#[test]
fn deactivated_area_stops_resolving() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(8);
    shop.set_price(entity, Scope::Global, dec!(10), None)?;

    assert!(shop.engine.resolve(entity, Variant::Price, shop.area)?.is_some());

    let area = shop.area;
    shop.engine.set_area_active(area, false)?;
    let err = shop.engine.resolve(entity, Variant::Price, area).unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Reactivation brings the chain back.
    shop.engine.set_area_active(area, true)?;
    assert!(shop.engine.resolve(entity, Variant::Price, area)?.is_some());
    Ok(())
}

// ============================================================================
// Cache coherence
// ============================================================================

#[test]
fn effective_serves_cached_value_until_invalidated() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(9);
    shop.set_price(entity, Scope::Area(shop.nation), dec!(100), None)?;

    let before = shop
        .engine
        .effective(entity, Variant::Price, shop.area)?
        .expect("nation row");
    assert_eq!(before.payload.as_price().unwrap().mrp, dec!(100));

    // Write behind the engine's back: the cache must still serve the
    // old value until the invalidation hook fires.
    shop.engine
        .store_mut()
        .put_override(entity, Scope::Area(shop.nation), &price(dec!(120)))?;
    let stale = shop
        .engine
        .effective(entity, Variant::Price, shop.area)?
        .expect("cached");
    assert_eq!(stale.payload.as_price().unwrap().mrp, dec!(100));

    shop.engine.on_override_written(entity, None, Some(Variant::Price));
    let fresh = shop
        .engine
        .effective(entity, Variant::Price, shop.area)?
        .expect("re-read");
    assert_eq!(fresh.payload.as_price().unwrap().mrp, dec!(120));
    Ok(())
}

#[test]
fn invalidation_reaches_other_areas_sharing_the_chain() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(10);
    let sibling = shop.add_sibling_area("Rohini")?;
    shop.set_price(entity, Scope::Area(shop.region), dec!(50), None)?;

    // Warm the cache for both areas under the region.
    for area in [shop.area, sibling] {
        let resolved = shop.engine.effective(entity, Variant::Price, area)?.unwrap();
        assert_eq!(resolved.payload.as_price().unwrap().mrp, dec!(50));
    }

    // Mutating the shared REGION scope through the engine invalidates
    // both descendants, even though only one scope changed.
    shop.set_price(entity, Scope::Area(shop.region), dec!(55), None)?;
    for area in [shop.area, sibling] {
        let resolved = shop.engine.effective(entity, Variant::Price, area)?.unwrap();
        assert_eq!(resolved.payload.as_price().unwrap().mrp, dec!(55));
    }
    Ok(())
}

#[test]
fn cached_absence_also_invalidated() -> Result<(), Box<dyn std::error::Error>> {
    let mut shop = TestShop::new()?;
    let entity = brand(11);

    assert!(shop.engine.effective(entity, Variant::Price, shop.area)?.is_none());
    shop.set_price(entity, Scope::Global, dec!(30), None)?;
    assert!(shop.engine.effective(entity, Variant::Price, shop.area)?.is_some());
    Ok(())
}

// ============================================================================
// Ambiguity: a store that breaks the uniqueness invariant
// ============================================================================

fn single_nation() -> Vec<AreaRow> {
    let now = chrono::Utc::now();
    vec![AreaRow {
        id: AreaId::new(1),
        name: "India".into(),
        level: AreaLevel::Nation,
        parent_id: None,
        active: true,
        created_at: now,
        updated_at: now,
    }]
}

fn read_only<T>() -> Result<T, StorageError> {
    Err(StorageError::NotFound("read-only fixture".into()))
}

/// Fabricated store returning two active rows for the same scope, which
/// the partial unique index would normally forbid.
struct DuplicatingStore {
    areas: Vec<AreaRow>,
}

impl DuplicatingStore {
    fn new() -> Self {
        Self {
            areas: single_nation(),
        }
    }
}

impl OverrideStore for DuplicatingStore {
    fn load_active_areas(&self) -> Result<Vec<AreaRow>, StorageError> {
        Ok(self.areas.clone())
    }

    fn active_overrides_at(
        &self,
        entity: EntityRef,
        variant: Variant,
        scope: Scope,
    ) -> Result<Vec<OverrideRow>, StorageError> {
        let now = chrono::Utc::now();
        let row = |id: i64| OverrideRow {
            id: OverrideId::new(id),
            entity,
            variant,
            scope,
            payload: price(dec!(10)),
            active: true,
            created_at: now,
            updated_at: now,
        };
        Ok(vec![row(1), row(2)])
    }

    fn override_history(
        &self,
        _entity: EntityRef,
        _variant: Variant,
    ) -> Result<Vec<OverrideRow>, StorageError> {
        Ok(Vec::new())
    }

    fn get_product(&self, _product_id: ProductId) -> Result<Option<ProductRow>, StorageError> {
        Ok(None)
    }

    fn insert_area(
        &mut self,
        _name: &str,
        _level: AreaLevel,
        _parent_id: Option<AreaId>,
    ) -> Result<AreaId, StorageError> {
        read_only()
    }

    fn set_area_active(&mut self, _area_id: AreaId, _active: bool) -> Result<(), StorageError> {
        read_only()
    }

    fn insert_product(
        &mut self,
        _name: &str,
        _code: &str,
        _gst_rate: rust_decimal::Decimal,
    ) -> Result<ProductId, StorageError> {
        read_only()
    }

    fn put_override(
        &mut self,
        _entity: EntityRef,
        _scope: Scope,
        _payload: &OverridePayload,
    ) -> Result<OverrideId, StorageError> {
        read_only()
    }

    fn deactivate_override(
        &mut self,
        _entity: EntityRef,
        _variant: Variant,
        _scope: Scope,
    ) -> Result<bool, StorageError> {
        read_only()
    }

    fn insert_order(&mut self, _order: &vistaar_storage::OrderRow) -> Result<(), StorageError> {
        read_only()
    }
}

#[test]
fn duplicate_active_rows_fail_loudly() -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new(DuplicatingStore::new())?;
    let err = engine
        .resolve(brand(1), Variant::Price, AreaId::new(1))
        .unwrap_err();
    assert!(matches!(err, EngineError::AmbiguousOverride(_)));
    Ok(())
}

// ============================================================================
// Transient store failures
// ============================================================================

fn busy_failure() -> StorageError {
    StorageError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("database is locked".into()),
    ))
}

/// Store whose override reads fail with SQLITE_BUSY a set number of
/// times before serving a single nation-scoped price row.
struct BusyStore {
    areas: Vec<AreaRow>,
    failures_left: Cell<u32>,
}

impl BusyStore {
    fn failing(times: u32) -> Self {
        Self {
            areas: single_nation(),
            failures_left: Cell::new(times),
        }
    }
}

impl OverrideStore for BusyStore {
    fn load_active_areas(&self) -> Result<Vec<AreaRow>, StorageError> {
        Ok(self.areas.clone())
    }

    fn active_overrides_at(
        &self,
        entity: EntityRef,
        variant: Variant,
        scope: Scope,
    ) -> Result<Vec<OverrideRow>, StorageError> {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(busy_failure());
        }
        let now = chrono::Utc::now();
        Ok(vec![OverrideRow {
            id: OverrideId::new(1),
            entity,
            variant,
            scope,
            payload: price(dec!(10)),
            active: true,
            created_at: now,
            updated_at: now,
        }])
    }

    fn override_history(
        &self,
        _entity: EntityRef,
        _variant: Variant,
    ) -> Result<Vec<OverrideRow>, StorageError> {
        Ok(Vec::new())
    }

    fn get_product(&self, _product_id: ProductId) -> Result<Option<ProductRow>, StorageError> {
        Ok(None)
    }

    fn insert_area(
        &mut self,
        _name: &str,
        _level: AreaLevel,
        _parent_id: Option<AreaId>,
    ) -> Result<AreaId, StorageError> {
        read_only()
    }

    fn set_area_active(&mut self, _area_id: AreaId, _active: bool) -> Result<(), StorageError> {
        read_only()
    }

    fn insert_product(
        &mut self,
        _name: &str,
        _code: &str,
        _gst_rate: rust_decimal::Decimal,
    ) -> Result<ProductId, StorageError> {
        read_only()
    }

    fn put_override(
        &mut self,
        _entity: EntityRef,
        _scope: Scope,
        _payload: &OverridePayload,
    ) -> Result<OverrideId, StorageError> {
        read_only()
    }

    fn deactivate_override(
        &mut self,
        _entity: EntityRef,
        _variant: Variant,
        _scope: Scope,
    ) -> Result<bool, StorageError> {
        read_only()
    }

    fn insert_order(&mut self, _order: &vistaar_storage::OrderRow) -> Result<(), StorageError> {
        read_only()
    }
}

#[test]
fn busy_read_is_retried_and_resolves() -> Result<(), Box<dyn std::error::Error>> {
    assert!(busy_failure().is_transient());

    let engine = Engine::new(BusyStore::failing(1))?;
    let resolved = engine
        .resolve(brand(1), Variant::Price, AreaId::new(1))?
        .expect("retry succeeds");
    assert_eq!(resolved.payload.as_price().unwrap().mrp, dec!(10));
    Ok(())
}

#[test]
fn persistently_busy_store_propagates_not_absent() -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new(BusyStore::failing(u32::MAX))?;
    // Exhausted retries must surface the storage error; `Ok(None)` here
    // would silently misreport the override as absent.
    let err = engine
        .resolve(brand(1), Variant::Price, AreaId::new(1))
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));
    Ok(())
}
