use rust_decimal::Decimal;
use tracing::error;

use vistaar_core::{
    ids::ProductId,
    money::{gst_full, gst_halves, round_money},
    payload::{Margin, MarginKind},
};

use crate::error::EngineError;

/// A requested order line, before pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Whether GST books as a CGST/SGST half-split (intra-state supply) or
/// as IGST in full (inter-state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GstTreatment {
    IntraState,
    InterState,
}

/// A line with its resolved pricing inputs, ready for totalling.
#[derive(Debug, Clone, Copy)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub mrp: Decimal,
    pub retailer_margin: Option<Margin>,
    pub gst_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub base_amount: Decimal,
    pub discount_amount: Decimal,
    pub net_amount: Decimal,
    pub igst_amount: Decimal,
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub total_amount: Decimal,
}

/// Total priced lines into order amounts and re-check the monetary
/// invariants. An invariant failure is a programming defect, never a
/// user-facing pricing error, and must block persistence.
pub fn compute_totals(
    lines: &[PricedLine],
    treatment: GstTreatment,
) -> Result<OrderTotals, EngineError> {
    let mut base_amount = Decimal::ZERO;
    let mut discount_amount = Decimal::ZERO;
    let mut igst_amount = Decimal::ZERO;
    let mut cgst_amount = Decimal::ZERO;
    let mut sgst_amount = Decimal::ZERO;

    for line in lines {
        if line.quantity == 0 {
            return Err(EngineError::InvariantViolation(format!(
                "line for product {} has zero quantity",
                line.product_id
            )));
        }
        let qty = Decimal::from(line.quantity);
        let line_amount = line.mrp * qty;
        base_amount += line_amount;
        discount_amount += line_discount(line.mrp, qty, line_amount, line.retailer_margin);

        match treatment {
            GstTreatment::IntraState => {
                let (cgst, sgst) = gst_halves(line_amount, line.gst_rate);
                cgst_amount += cgst;
                sgst_amount += sgst;
            }
            GstTreatment::InterState => {
                igst_amount += gst_full(line_amount, line.gst_rate);
            }
        }
    }

    let net_amount = base_amount - discount_amount;
    let total_amount = net_amount + igst_amount + cgst_amount + sgst_amount;

    let totals = OrderTotals {
        base_amount: round_money(base_amount),
        discount_amount: round_money(discount_amount),
        net_amount: round_money(net_amount),
        igst_amount: round_money(igst_amount),
        cgst_amount: round_money(cgst_amount),
        sgst_amount: round_money(sgst_amount),
        total_amount: round_money(total_amount),
    };
    check_invariants(&totals)?;
    Ok(totals)
}

/// Discount contributed by one line under the retailer-tier margin.
/// MARKDOWN is a percentage off the MRP line amount; FIXED sets the
/// unit sale price, so the discount is MRP minus that price (floored at
/// zero); MARKUP is a purchase-side margin and yields no discount.
fn line_discount(mrp: Decimal, qty: Decimal, line_amount: Decimal, margin: Option<Margin>) -> Decimal {
    match margin {
        Some(Margin {
            kind: MarginKind::Markdown,
            value,
        }) => line_amount * value / Decimal::from(100),
        Some(Margin {
            kind: MarginKind::Fixed,
            value,
        }) => ((mrp - value) * qty).max(Decimal::ZERO),
        Some(Margin {
            kind: MarginKind::Markup,
            ..
        })
        | None => Decimal::ZERO,
    }
}

fn check_invariants(totals: &OrderTotals) -> Result<(), EngineError> {
    let named = [
        ("base_amount", totals.base_amount),
        ("discount_amount", totals.discount_amount),
        ("net_amount", totals.net_amount),
        ("igst_amount", totals.igst_amount),
        ("cgst_amount", totals.cgst_amount),
        ("sgst_amount", totals.sgst_amount),
        ("total_amount", totals.total_amount),
    ];
    for (name, amount) in named {
        if amount < Decimal::ZERO {
            return fail_invariant(format!("{name} is negative: {amount}"));
        }
    }
    if totals.net_amount > totals.base_amount {
        return fail_invariant(format!(
            "net_amount {} exceeds base_amount {}",
            totals.net_amount, totals.base_amount
        ));
    }
    if totals.total_amount < totals.net_amount {
        return fail_invariant(format!(
            "total_amount {} below net_amount {}",
            totals.total_amount, totals.net_amount
        ));
    }
    Ok(())
}

fn fail_invariant(detail: String) -> Result<(), EngineError> {
    error!(%detail, "order totals failed invariant check");
    Err(EngineError::InvariantViolation(detail))
}
