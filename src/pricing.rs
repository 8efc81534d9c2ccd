//! Pure pricing rules for plush line items. No I/O; safe to call anywhere.

use crate::models::Size;

pub const SMALL_PRICE: i64 = 300;
pub const MEDIUM_PRICE: i64 = 500;
pub const LARGE_PRICE: i64 = 700;

pub const RUSH_FEE: i64 = 200;
pub const EMBROIDERY_FEE: i64 = 120;
pub const ACCESSORY_FEE: i64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePrice {
    pub unit_price: i64,
    pub line_total: i64,
}

pub fn base_price(size: Size) -> i64 {
    match size {
        Size::Small => SMALL_PRICE,
        Size::Medium => MEDIUM_PRICE,
        Size::Large => LARGE_PRICE,
    }
}

/// Price one line item. Surcharges are flat per unit and additive; quantity
/// multiplies the fully surcharged unit price. Quantity is clamped to >= 1
/// so malformed input from the UI layer never zeroes a line.
pub fn price_line_item(
    size: Size,
    quantity: i32,
    rush: bool,
    embroidery_text: Option<&str>,
    accessory_count: i32,
) -> LinePrice {
    let mut unit_price = base_price(size);
    if rush {
        unit_price += RUSH_FEE;
    }
    if embroidery_text.is_some_and(|t| !t.trim().is_empty()) {
        unit_price += EMBROIDERY_FEE;
    }
    unit_price += i64::from(accessory_count.max(0)) * ACCESSORY_FEE;

    let quantity = i64::from(quantity.max(1));
    LinePrice {
        unit_price,
        line_total: unit_price * quantity,
    }
}

pub fn order_total(lines: &[LinePrice]) -> i64 {
    lines.iter().map(|l| l.line_total).sum()
}

/// Currency units to minor units (cents) for the payment processor.
/// Inputs are integral currency units, so x100 is exact; half-up rounding
/// is the documented contract should fractional amounts ever appear.
pub fn to_minor_units(amount: i64) -> i64 {
    amount * 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_prices_by_size() {
        assert_eq!(base_price(Size::Small), 300);
        assert_eq!(base_price(Size::Medium), 500);
        assert_eq!(base_price(Size::Large), 700);
    }

    #[test]
    fn surcharges_are_flat_and_additive() {
        // Medium 500 + rush 200 + embroidery 120 + one accessory 150 = 970
        let price = price_line_item(Size::Medium, 2, true, Some("Sofi"), 1);
        assert_eq!(price.unit_price, 970);
        assert_eq!(price.line_total, 1940);
    }

    #[test]
    fn order_total_sums_line_totals() {
        let a = price_line_item(Size::Medium, 2, true, Some("Sofi"), 1);
        let b = price_line_item(Size::Medium, 2, true, Some("Sofi"), 1);
        assert_eq!(order_total(&[a, b]), 3880);
    }

    #[test]
    fn blank_embroidery_text_adds_nothing() {
        let none = price_line_item(Size::Small, 1, false, None, 0);
        let blank = price_line_item(Size::Small, 1, false, Some("   "), 0);
        assert_eq!(none.unit_price, 300);
        assert_eq!(blank.unit_price, 300);
    }

    #[test]
    fn quantity_is_clamped_to_at_least_one() {
        for qty in [0, -3] {
            let price = price_line_item(Size::Large, qty, false, None, 0);
            assert_eq!(price.line_total, price.unit_price);
        }
    }

    #[test]
    fn negative_accessory_count_is_clamped() {
        let price = price_line_item(Size::Small, 1, false, None, -2);
        assert_eq!(price.unit_price, 300);
    }

    #[test]
    fn quantity_multiplies_surcharged_unit_price() {
        let price = price_line_item(Size::Small, 3, true, None, 2);
        assert_eq!(price.unit_price, 300 + 200 + 2 * 150);
        assert_eq!(price.line_total, price.unit_price * 3);
    }

    #[test]
    fn minor_units_conversion() {
        assert_eq!(to_minor_units(970), 97_000);
        assert_eq!(to_minor_units(0), 0);
    }
}
