use thiserror::Error;
use vistaar_core::CoreError;
use vistaar_storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("ambiguous override: {0}")]
    AmbiguousOverride(String),

    #[error("no price for product {product_id} in area {area_id}")]
    NoPriceForArea { product_id: String, area_id: String },

    #[error("product {product_id} not visible in area {area_id}")]
    NotVisibleInArea { product_id: String, area_id: String },

    #[error("product {product_id}: quantity {quantity} below minimum {minimum}")]
    BelowMinOrderQty {
        product_id: String,
        quantity: u32,
        minimum: u32,
    },

    #[error("order invariant violated: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    /// Business rejections a caller surfaces to the user, as opposed to
    /// internal defects (`AmbiguousOverride`, `InvariantViolation`) and
    /// infrastructure failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NoPriceForArea { .. }
                | Self::NotVisibleInArea { .. }
                | Self::BelowMinOrderQty { .. }
        )
    }
}
