use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::ids::{AreaId, BrandCategoryId, BrandId, ProductId};

/// A node in the area hierarchy at which an override may be defined,
/// or the global sentinel (NULL area in the store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Area(AreaId),
    Global,
}

impl Scope {
    pub fn area_id(&self) -> Option<AreaId> {
        match self {
            Self::Area(id) => Some(*id),
            Self::Global => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Area(id) => write!(f, "area:{id}"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// An overridable catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    Brand(BrandId),
    BrandCategory(BrandCategoryId),
    Product(ProductId),
}

impl EntityRef {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Brand(_) => "brand",
            Self::BrandCategory(_) => "brand_category",
            Self::Product(_) => "product",
        }
    }

    pub fn raw_id(&self) -> i64 {
        match self {
            Self::Brand(id) => id.raw(),
            Self::BrandCategory(id) => id.raw(),
            Self::Product(id) => id.raw(),
        }
    }

    pub fn from_parts(kind: &str, raw_id: i64) -> Result<Self, CoreError> {
        match kind {
            "brand" => Ok(Self::Brand(BrandId::new(raw_id))),
            "brand_category" => Ok(Self::BrandCategory(BrandCategoryId::new(raw_id))),
            "product" => Ok(Self::Product(ProductId::new(raw_id))),
            other => Err(CoreError::UnknownEntityKind(other.to_string())),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.raw_id())
    }
}

/// The kind of overridable attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    Visibility,
    Margin,
    Price,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visibility => "visibility",
            Self::Margin => "margin",
            Self::Price => "price",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "visibility" => Ok(Self::Visibility),
            "margin" => Ok(Self::Margin),
            "price" => Ok(Self::Price),
            other => Err(CoreError::UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distribution tier a margin or minimum-order-quantity applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    SuperStockist,
    Distributor,
    Retailer,
}

/// Sales channel / shop class used by visibility gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    General,
    Modern,
    Horeca,
    TypeA,
    TypeB,
    TypeC,
}
