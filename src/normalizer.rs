use std::path::Path;
use tracing::instrument;

use crate::error::StoreError;
use crate::listing::{CleanListing, RawListing};
use crate::store;

pub const CURRENCY_PREFIX: &str = "US $";
pub const THOUSANDS_SEPARATOR: &str = ",";
pub const SHIPPING_UNAVAILABLE: &str = "Shipping info unavailable";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows: usize,
    pub original_price_backfilled: usize,
    pub price_unparseable: usize,
    pub shipping_unavailable: usize,
}

/// "US $1,299.99 " -> "1299.99"
pub fn strip_currency(text: &str) -> String {
    text.replace(CURRENCY_PREFIX, "")
        .replace(THOUSANDS_SEPARATOR, "")
        .trim()
        .to_string()
}

/// Lenient numeric coercion: anything that is not a finite number is missing.
pub fn parse_amount(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Percent off the original price, rounded to two decimals; 0 whenever it
/// cannot be computed.
pub fn discount_percentage(price: Option<f64>, original_price: Option<f64>) -> f64 {
    match (price, original_price) {
        (Some(price), Some(original)) => {
            let discount = round2((1.0 - price / original) * 100.0);
            if discount.is_finite() {
                // -0.0 -> 0.0
                discount + 0.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

pub fn normalize_shipping(shipping: Option<&str>) -> String {
    match shipping.map(str::trim) {
        None | Some("") | Some(crate::listing::MISSING) => SHIPPING_UNAVAILABLE.to_string(),
        Some(text) => text.to_string(),
    }
}

pub fn normalize_listing(raw: &RawListing, stats: &mut NormalizeStats) -> CleanListing {
    let price_text = strip_currency(&raw.price);
    let original_text = raw
        .original_price
        .as_deref()
        .map(strip_currency)
        .filter(|text| !text.is_empty() && text != crate::listing::MISSING)
        .unwrap_or_else(|| {
            stats.original_price_backfilled += 1;
            price_text.clone()
        });

    let price = parse_amount(&price_text);
    let original_price = parse_amount(&original_text);
    if price.is_none() {
        stats.price_unparseable += 1;
    }

    let shipping = normalize_shipping(raw.shipping.as_deref());
    if shipping == SHIPPING_UNAVAILABLE {
        stats.shipping_unavailable += 1;
    }

    stats.rows += 1;
    CleanListing {
        timestamp: raw.timestamp.clone(),
        title: raw.title.clone(),
        price,
        original_price,
        shipping,
        item_url: raw.item_url.clone(),
        discount_percentage: discount_percentage(price, original_price),
    }
}

pub fn normalize_all(raw: &[RawListing]) -> (Vec<CleanListing>, NormalizeStats) {
    let mut stats = NormalizeStats::default();
    let cleaned = raw
        .iter()
        .map(|listing| normalize_listing(listing, &mut stats))
        .collect();
    (cleaned, stats)
}

/// Re-derives the cleaned file from the whole raw file.
#[instrument(skip_all, fields(raw = %raw_path.display(), cleaned = %cleaned_path.display()))]
pub fn normalize(raw_path: &Path, cleaned_path: &Path) -> Result<NormalizeStats, StoreError> {
    let raw = store::read_raw(raw_path)?;
    tracing::info!(rows = raw.len(), "Loaded raw listings");

    let (cleaned, stats) = normalize_all(&raw);
    store::write_clean(cleaned_path, &cleaned)?;

    tracing::info!(
        rows = stats.rows,
        original_price_backfilled = stats.original_price_backfilled,
        price_unparseable = stats.price_unparseable,
        shipping_unavailable = stats.shipping_unavailable,
        "Completed normalization"
    );
    Ok(stats)
}
