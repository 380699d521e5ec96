//! Deal-page scraping pipeline: collect listings from a dynamic page into a
//! raw CSV, normalize them into a cleaned CSV, and report aggregate views.

pub mod browser;
pub mod collector;
pub mod config;
pub mod error;
pub mod listing;
pub mod normalizer;
pub mod notify;
pub mod report;
pub mod store;

pub use config::AppSettings;
pub use listing::{CleanListing, RawListing};
