use rust_decimal::Decimal;

use vistaar_core::{
    ids::{AreaId, ProductId},
    level::AreaLevel,
    payload::{
        Margin, MarginKind, MarginSet, MinOrderQtys, OverridePayload, PriceTerms, VisibilityFlags,
    },
    scope::{EntityRef, Scope},
};
use vistaar_engine::{Engine, EngineError};
use vistaar_storage::{OverrideStore, SqliteStore, StorageError};

/// Install a subscriber honoring RUST_LOG so test runs can be traced.
/// Later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Test fixture: an engine over an in-memory store seeded with one
/// four-level area chain (nation > zone > region > area).
pub struct TestShop {
    pub engine: Engine<SqliteStore>,
    pub nation: AreaId,
    pub zone: AreaId,
    pub region: AreaId,
    pub area: AreaId,
}

impl TestShop {
    pub fn new() -> Result<Self, EngineError> {
        init_logging();
        let mut store = SqliteStore::open_in_memory()?;
        let nation = store.insert_area("India", AreaLevel::Nation, None)?;
        let zone = store.insert_area("North Zone", AreaLevel::Zone, Some(nation))?;
        let region = store.insert_area("Delhi NCR", AreaLevel::Region, Some(zone))?;
        let area = store.insert_area("Karol Bagh", AreaLevel::Area, Some(region))?;
        let engine = Engine::new(store)?;
        Ok(Self {
            engine,
            nation,
            zone,
            region,
            area,
        })
    }

    /// Add a sibling AREA under the same region.
    pub fn add_sibling_area(&mut self, name: &str) -> Result<AreaId, EngineError> {
        self.engine.add_area(name, AreaLevel::Area, Some(self.region))
    }

    pub fn add_product(
        &mut self,
        name: &str,
        code: &str,
        gst_rate: Decimal,
    ) -> Result<ProductId, EngineError> {
        self.engine.add_product(name, code, gst_rate)
    }

    /// Write a price override with an optional retailer markdown.
    pub fn set_price(
        &mut self,
        entity: EntityRef,
        scope: Scope,
        mrp: Decimal,
        retailer_markdown: Option<Decimal>,
    ) -> Result<(), EngineError> {
        let margins = retailer_markdown.map(|value| MarginSet {
            retailer: Some(Margin {
                kind: MarginKind::Markdown,
                value,
            }),
            ..Default::default()
        });
        self.engine.put_override(
            entity,
            scope,
            &OverridePayload::Price(PriceTerms {
                mrp,
                margins,
                min_order_qty: None,
            }),
        )
    }

    pub fn set_price_terms(
        &mut self,
        entity: EntityRef,
        scope: Scope,
        terms: PriceTerms,
    ) -> Result<(), EngineError> {
        self.engine
            .put_override(entity, scope, &OverridePayload::Price(terms))
    }

    /// Make the entity visible on the general channel at the scope.
    pub fn set_visible_general(
        &mut self,
        entity: EntityRef,
        scope: Scope,
    ) -> Result<(), EngineError> {
        self.engine.put_override(
            entity,
            scope,
            &OverridePayload::Visibility(VisibilityFlags {
                general: true,
                ..Default::default()
            }),
        )
    }

    /// Price terms with only a retailer minimum order quantity.
    pub fn terms_with_min_qty(mrp: Decimal, min_qty: u32) -> PriceTerms {
        PriceTerms {
            mrp,
            margins: None,
            min_order_qty: Some(MinOrderQtys {
                retailer: Some(min_qty),
                ..Default::default()
            }),
        }
    }

    /// Rows currently in the orders table.
    pub fn order_count(&self) -> Result<i64, StorageError> {
        let count = self
            .engine
            .store()
            .conn()
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))
            .map_err(StorageError::Sqlite)?;
        Ok(count)
    }
}
