use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use vistaar_core::{
    ids::{AreaId, OrderId, OverrideId, ProductId},
    level::AreaLevel,
    payload::OverridePayload,
    scope::{EntityRef, Scope, Variant},
};

use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct AreaRow {
    pub id: AreaId,
    pub name: String,
    pub level: AreaLevel,
    pub parent_id: Option<AreaId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OverrideRow {
    pub id: OverrideId,
    pub entity: EntityRef,
    pub variant: Variant,
    pub scope: Scope,
    pub payload: OverridePayload,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub code: String,
    pub gst_rate: Decimal,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: OrderId,
    pub area_id: AreaId,
    pub base_amount: Decimal,
    pub discount_amount: Decimal,
    pub net_amount: Decimal,
    pub igst_amount: Decimal,
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub total_amount: Decimal,
    pub items: Vec<(ProductId, u32)>,
}

/// Relational store the resolution engine reads from and writes derived
/// results into. Read methods return every matching row so the engine
/// can detect constraint violations instead of the store silently
/// picking one.
pub trait OverrideStore {
    fn load_active_areas(&self) -> Result<Vec<AreaRow>, StorageError>;

    /// All *active* override rows for the given entity/variant at
    /// exactly the given scope. The partial unique index should keep
    /// this at 0 or 1 rows; more than one is a constraint breach the
    /// caller must treat as fatal.
    fn active_overrides_at(
        &self,
        entity: EntityRef,
        variant: Variant,
        scope: Scope,
    ) -> Result<Vec<OverrideRow>, StorageError>;

    /// Full history (active and superseded) for audit inspection,
    /// newest first.
    fn override_history(
        &self,
        entity: EntityRef,
        variant: Variant,
    ) -> Result<Vec<OverrideRow>, StorageError>;

    fn get_product(&self, product_id: ProductId) -> Result<Option<ProductRow>, StorageError>;

    // ---- write path -------------------------------------------------

    fn insert_area(
        &mut self,
        name: &str,
        level: AreaLevel,
        parent_id: Option<AreaId>,
    ) -> Result<AreaId, StorageError>;

    fn set_area_active(&mut self, area_id: AreaId, active: bool) -> Result<(), StorageError>;

    fn insert_product(
        &mut self,
        name: &str,
        code: &str,
        gst_rate: Decimal,
    ) -> Result<ProductId, StorageError>;

    /// Replace the active override at (entity, scope, payload.variant):
    /// deactivates the current active row (if any) and inserts the
    /// replacement, in one transaction. Payloads of active rows are
    /// never updated in place; superseded rows stay for audit.
    fn put_override(
        &mut self,
        entity: EntityRef,
        scope: Scope,
        payload: &OverridePayload,
    ) -> Result<OverrideId, StorageError>;

    /// Revoke the active override at the given scope without a
    /// replacement. Returns false if there was nothing active.
    fn deactivate_override(
        &mut self,
        entity: EntityRef,
        variant: Variant,
        scope: Scope,
    ) -> Result<bool, StorageError>;

    fn insert_order(&mut self, order: &OrderRow) -> Result<(), StorageError>;
}
