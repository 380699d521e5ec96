use serde::{Deserialize, Serialize};

/// Literal stored in the raw file for an optional field that was not on the page.
pub const MISSING: &str = "N/A";

pub const RAW_COLUMNS: [&str; 6] = [
    "timestamp",
    "title",
    "price",
    "original_price",
    "shipping",
    "item_url",
];

/// One scraped deal tile, as written to the raw file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListing {
    pub timestamp: String,
    pub title: String,
    pub price: String,
    pub original_price: Option<String>,
    pub shipping: Option<String>,
    pub item_url: String,
}

impl RawListing {
    pub fn to_record(&self) -> [&str; 6] {
        [
            &self.timestamp,
            &self.title,
            &self.price,
            self.original_price.as_deref().unwrap_or(MISSING),
            self.shipping.as_deref().unwrap_or(MISSING),
            &self.item_url,
        ]
    }

    /// Builds a listing from the six raw columns. `N/A` and blank optional
    /// fields come back as `None`.
    pub fn from_fields(fields: [&str; 6]) -> Self {
        let [timestamp, title, price, original_price, shipping, item_url] = fields;
        Self {
            timestamp: timestamp.to_string(),
            title: title.to_string(),
            price: price.to_string(),
            original_price: present(original_price),
            shipping: present(shipping),
            item_url: item_url.to_string(),
        }
    }
}

fn present(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed == MISSING {
        None
    } else {
        Some(field.to_string())
    }
}

/// A normalized listing, one row of the cleaned file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanListing {
    pub timestamp: String,
    pub title: String,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub shipping: String,
    pub item_url: String,
    pub discount_percentage: f64,
}
