use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::scope::{Channel, Tier, Variant};

/// Which sales channels and shop classes an entity is offered to.
/// Flags omitted from a stored payload read back as false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityFlags {
    pub general: bool,
    pub modern: bool,
    pub horeca: bool,
    pub type_a: bool,
    pub type_b: bool,
    pub type_c: bool,
}

impl VisibilityFlags {
    pub fn allows(&self, channel: Channel) -> bool {
        match channel {
            Channel::General => self.general,
            Channel::Modern => self.modern,
            Channel::Horeca => self.horeca,
            Channel::TypeA => self.type_a,
            Channel::TypeB => self.type_b,
            Channel::TypeC => self.type_c,
        }
    }

    pub fn any(&self) -> bool {
        self.general || self.modern || self.horeca || self.type_a || self.type_b || self.type_c
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarginKind {
    Markup,
    Markdown,
    Fixed,
}

/// A single margin rule. MARKUP and MARKDOWN carry a percentage,
/// FIXED carries an absolute unit sale price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margin {
    #[serde(rename = "type")]
    pub kind: MarginKind,
    pub value: Decimal,
}

/// Margins per distribution tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginSet {
    pub super_stockist: Option<Margin>,
    pub distributor: Option<Margin>,
    pub retailer: Option<Margin>,
}

impl MarginSet {
    pub fn for_tier(&self, tier: Tier) -> Option<Margin> {
        match tier {
            Tier::SuperStockist => self.super_stockist,
            Tier::Distributor => self.distributor,
            Tier::Retailer => self.retailer,
        }
    }
}

/// Minimum order quantities per distribution tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinOrderQtys {
    pub super_stockist: Option<u32>,
    pub distributor: Option<u32>,
    pub retailer: Option<u32>,
}

impl MinOrderQtys {
    pub fn for_tier(&self, tier: Tier) -> Option<u32> {
        match tier {
            Tier::SuperStockist => self.super_stockist,
            Tier::Distributor => self.distributor,
            Tier::Retailer => self.retailer,
        }
    }
}

/// Pricing terms for a product at some scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTerms {
    pub mrp: Decimal,
    #[serde(default)]
    pub margins: Option<MarginSet>,
    #[serde(default)]
    pub min_order_qty: Option<MinOrderQtys>,
}

/// Tagged override payload. The store keeps this as a JSON column; the
/// tag must agree with the row's variant column (checked on read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum OverridePayload {
    Visibility(VisibilityFlags),
    Margin(MarginSet),
    Price(PriceTerms),
}

impl OverridePayload {
    pub fn variant(&self) -> Variant {
        match self {
            Self::Visibility(_) => Variant::Visibility,
            Self::Margin(_) => Variant::Margin,
            Self::Price(_) => Variant::Price,
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn as_visibility(&self) -> Option<&VisibilityFlags> {
        match self {
            Self::Visibility(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_margins(&self) -> Option<&MarginSet> {
        match self {
            Self::Margin(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_price(&self) -> Option<&PriceTerms> {
        match self {
            Self::Price(p) => Some(p),
            _ => None,
        }
    }
}
