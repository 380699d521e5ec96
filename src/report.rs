use chrono::{DateTime, NaiveDateTime, Timelike};
use regex::RegexBuilder;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::instrument;

use crate::error::ReportError;
use crate::listing::CleanListing;
use crate::store;

pub const KEYWORDS: [&str; 6] = ["Apple", "Samsung", "Laptop", "iPhone", "Tablet", "Gimbal"];
pub const HISTOGRAM_BINS: usize = 30;
pub const TOP_N: usize = 5;

const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<Bin>,
}

impl Histogram {
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopDiscount {
    pub title: String,
    pub price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub rows: usize,
    pub first_capture: Option<NaiveDateTime>,
    pub last_capture: Option<NaiveDateTime>,
    pub deals_per_hour: BTreeMap<u32, usize>,
    pub price_histogram: Histogram,
    pub price_boxplot: Option<BoxSummary>,
    /// `(original_price, price)` per listing with both present.
    pub price_scatter: Vec<(f64, f64)>,
    pub discount_histogram: Histogram,
    pub shipping_counts: Vec<(String, usize)>,
    pub keyword_counts: Vec<(String, usize)>,
    pub price_difference_histogram: Histogram,
    pub top_discounts: Vec<TopDiscount>,
}

/// Accepts the collector's naive ISO-8601 form as well as RFC 3339 with an
/// offset and a space-separated variant.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Equal-width bins; the maximum value falls into the last bin.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    if values.is_empty() || bins == 0 {
        return Histogram::default();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (low, high) = if min == max {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    };
    let width = (high - low) / bins as f64;

    let mut counts = vec![0usize; bins];
    for value in values {
        let index = (((value - low) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    Histogram {
        bins: counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| Bin {
                lower: low + i as f64 * width,
                upper: low + (i + 1) as f64 * width,
                count,
            })
            .collect(),
    }
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (position - lower as f64)
}

pub fn box_summary(values: &[f64]) -> Option<BoxSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let fence = 1.5 * (q3 - q1);
    let (low_fence, high_fence) = (q1 - fence, q3 + fence);
    let inside: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|v| *v >= low_fence && *v <= high_fence)
        .collect();

    Some(BoxSummary {
        min: sorted[0],
        q1,
        median: quantile(&sorted, 0.5),
        q3,
        max: sorted[sorted.len() - 1],
        lower_whisker: inside.first().copied().unwrap_or(q1),
        upper_whisker: inside.last().copied().unwrap_or(q3),
        outliers: sorted.len() - inside.len(),
    })
}

/// Distinct values by descending frequency; ties keep first appearance.
pub fn value_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Case-insensitive substring matches per keyword, in keyword order.
pub fn keyword_counts(
    titles: &[&str],
    keywords: &[&str],
) -> Result<Vec<(String, usize)>, ReportError> {
    keywords
        .iter()
        .map(|keyword| {
            let pattern = RegexBuilder::new(&regex::escape(keyword))
                .case_insensitive(true)
                .build()?;
            let count = titles.iter().filter(|t| pattern.is_match(t)).count();
            Ok::<_, ReportError>((keyword.to_string(), count))
        })
        .collect()
}

/// Highest discounts first. The sort is stable, so equal discounts keep
/// their file order.
pub fn top_discounts(listings: &[CleanListing], n: usize) -> Vec<TopDiscount> {
    let mut ranked: Vec<&CleanListing> = listings.iter().collect();
    ranked.sort_by(|a, b| {
        b.discount_percentage
            .partial_cmp(&a.discount_percentage)
            .unwrap_or(Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(n)
        .map(|l| TopDiscount {
            title: l.title.clone(),
            price: l.price,
            original_price: l.original_price,
            discount_percentage: l.discount_percentage,
        })
        .collect()
}

pub fn build_report(listings: &[CleanListing]) -> Result<Report, ReportError> {
    let mut captured = listings
        .iter()
        .enumerate()
        .map(|(row, l)| {
            parse_timestamp(&l.timestamp).ok_or_else(|| ReportError::Timestamp {
                row: row + 1,
                value: l.timestamp.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut deals_per_hour = BTreeMap::new();
    for at in &captured {
        *deals_per_hour.entry(at.hour()).or_insert(0) += 1;
    }
    captured.sort();

    let prices: Vec<f64> = listings.iter().filter_map(|l| l.price).collect();
    let discounts: Vec<f64> = listings.iter().map(|l| l.discount_percentage).collect();
    let price_scatter: Vec<(f64, f64)> = listings
        .iter()
        .filter_map(|l| Some((l.original_price?, l.price?)))
        .collect();
    let differences: Vec<f64> = price_scatter
        .iter()
        .map(|(original, price)| original - price)
        .collect();
    let titles: Vec<&str> = listings.iter().map(|l| l.title.as_str()).collect();

    Ok(Report {
        rows: listings.len(),
        first_capture: captured.first().copied(),
        last_capture: captured.last().copied(),
        deals_per_hour,
        price_histogram: histogram(&prices, HISTOGRAM_BINS),
        price_boxplot: box_summary(&prices),
        price_scatter,
        discount_histogram: histogram(&discounts, HISTOGRAM_BINS),
        shipping_counts: value_counts(listings.iter().map(|l| l.shipping.as_str())),
        keyword_counts: keyword_counts(&titles, &KEYWORDS)?,
        price_difference_histogram: histogram(&differences, HISTOGRAM_BINS),
        top_discounts: top_discounts(listings, TOP_N),
    })
}

/// Computes every view over the cleaned file. The file is only read.
#[instrument(skip_all, fields(cleaned = %cleaned_path.display()))]
pub fn report(cleaned_path: &Path) -> Result<Report, ReportError> {
    let listings = store::read_clean(cleaned_path)?;
    let report = build_report(&listings)?;
    tracing::info!(rows = report.rows, "Computed report views");
    Ok(report)
}

pub fn write_json(report: &Report, path: &Path) -> Result<(), ReportError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, report)?;
    tracing::info!(path = %path.display(), "Saved report views");
    Ok(())
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    "#".repeat((count * BAR_WIDTH).div_ceil(max))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn amount(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn render_counts(out: &mut String, title: &str, rows: &[(String, usize)]) {
    let max = rows.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let _ = writeln!(out, "\n== {title} ==");
    for (label, count) in rows {
        let _ = writeln!(out, "{:<28} {:>5} {}", truncate(label, 25), count, bar(*count, max));
    }
}

fn render_histogram(out: &mut String, title: &str, histogram: &Histogram) {
    let max = histogram.bins.iter().map(|b| b.count).max().unwrap_or(0);
    let _ = writeln!(out, "\n== {title} ({} values) ==", histogram.total());
    for bin in histogram.bins.iter().filter(|b| b.count > 0) {
        let _ = writeln!(
            out,
            "{:>10.2} .. {:<10.2} {:>5} {}",
            bin.lower,
            bin.upper,
            bin.count,
            bar(bin.count, max)
        );
    }
}

/// Text rendering of every view, for the terminal.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} listings", report.rows);
    if let (Some(first), Some(last)) = (report.first_capture, report.last_capture) {
        let _ = writeln!(out, "Captured {first} .. {last}");
    }

    let per_hour: Vec<(String, usize)> = report
        .deals_per_hour
        .iter()
        .map(|(hour, count)| (format!("{hour:02}:00"), *count))
        .collect();
    render_counts(&mut out, "Number of Deals per Hour", &per_hour);

    render_histogram(&mut out, "Price Distribution", &report.price_histogram);
    if let Some(b) = &report.price_boxplot {
        let _ = writeln!(
            out,
            "\n== Boxplot of Prices ==\nmin {:.2} | whisker {:.2} | q1 {:.2} | median {:.2} | q3 {:.2} | whisker {:.2} | max {:.2} | outliers {}",
            b.min, b.lower_whisker, b.q1, b.median, b.q3, b.upper_whisker, b.max, b.outliers
        );
    }

    let _ = writeln!(out, "\n== Original vs Discounted Price ==");
    for (original, price) in &report.price_scatter {
        let _ = writeln!(out, "{original:>10.2} -> {price:<10.2}");
    }

    render_histogram(&mut out, "Discount Percentage Distribution", &report.discount_histogram);
    render_counts(&mut out, "Shipping Options Frequency", &report.shipping_counts);
    render_counts(&mut out, "Keyword Frequency in Titles", &report.keyword_counts);
    render_histogram(&mut out, "Price Differences", &report.price_difference_histogram);

    let _ = writeln!(out, "\n== Top Discounts ==");
    let _ = writeln!(
        out,
        "{:<50} | {:>10} | {:>14} | {:>8}",
        "title", "price", "original_price", "discount"
    );
    let _ = writeln!(out, "{}", "-".repeat(92));
    for top in &report.top_discounts {
        let _ = writeln!(
            out,
            "{:<50} | {:>10} | {:>14} | {:>7.2}%",
            truncate(&top.title, 47),
            amount(top.price),
            amount(top.original_price),
            top.discount_percentage
        );
    }
    out
}
