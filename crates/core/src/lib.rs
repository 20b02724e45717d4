pub mod error;
pub mod ids;
pub mod level;
pub mod money;
pub mod payload;
pub mod scope;

pub use error::CoreError;
pub use ids::*;
pub use level::AreaLevel;
pub use payload::{
    Margin, MarginKind, MarginSet, MinOrderQtys, OverridePayload, PriceTerms, VisibilityFlags,
};
pub use scope::{Channel, EntityRef, Scope, Tier, Variant};
