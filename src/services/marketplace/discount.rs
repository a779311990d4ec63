use serde::{Deserialize, Serialize};

use crate::models::marketplace::Listing;

/// Parameters of the required-discount curve
///
/// Prices are in dollars, percentages are fractions (0.05 = 5%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicConstants {
    pub base_price: f64,
    pub min_percent: f64,
    pub max_percent: f64,
    #[serde(default = "default_max_price")]
    pub max_price: f64,
}

fn default_max_price() -> f64 {
    100_000.0
}

impl Default for DynamicConstants {
    fn default() -> Self {
        Self {
            base_price: 10.0,
            min_percent: 0.03,
            max_percent: 0.10,
            max_price: default_max_price(),
        }
    }
}

/// Minimum discount fraction a listing at `price` must show to qualify
///
/// Interpolates linearly in log-price space from `max_percent` at or below
/// `base_price` down to `min_percent` at or above `max_price`. Cheap items
/// need a larger relative drop than expensive ones.
pub fn required_percent(price: f64, constants: &DynamicConstants) -> f64 {
    let low_log = constants.base_price.max(1.0).ln();
    let high_log = (constants.base_price + 1.0).max(constants.max_price).ln();
    let cur_log = constants.base_price.max(price).ln();

    let t = if high_log != low_log {
        (cur_log - low_log) / (high_log - low_log)
    } else {
        0.0
    };
    let t = t.clamp(0.0, 1.0);

    constants.max_percent - (constants.max_percent - constants.min_percent) * t
}

/// How a listing's price compares to its reference price
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountEvaluation {
    /// Reference price in dollars
    pub reference_price: f64,
    /// Reference minus listing price, in dollars
    pub discount: f64,
    /// Discount as a fraction of the reference price
    pub discount_percent: f64,
    pub required_percent: f64,
    pub qualifies: bool,
}

/// Scores a listing against its predicted (or base) reference price
///
/// Returns `None` when the listing carries no usable reference. A listing
/// qualifies when both the relative and the absolute discount clear their
/// thresholds.
pub fn evaluate_listing(
    listing: &Listing,
    constants: &DynamicConstants,
    min_discount_abs: f64,
) -> Option<DiscountEvaluation> {
    let reference = listing.reference.as_ref()?;
    let reference_cents = reference.predicted_price.or(reference.base_price)?;
    if reference_cents <= 0 {
        return None;
    }

    let reference_price = reference_cents as f64 / 100.0;
    let price = listing.price as f64 / 100.0;
    let discount = reference_price - price;
    let discount_percent = discount / reference_price;
    let required = required_percent(reference_price, constants);

    Some(DiscountEvaluation {
        reference_price,
        discount,
        discount_percent,
        required_percent: required,
        qualifies: discount_percent >= required && discount >= min_discount_abs,
    })
}
