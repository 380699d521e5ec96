use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::StoreError;
use crate::listing::{CleanListing, RawListing, RAW_COLUMNS};

/// Appends a batch of listings to the raw file, creating it if needed.
/// The raw file has no header row.
pub fn append_raw(path: &Path, listings: &[RawListing]) -> Result<(), StoreError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    for listing in listings {
        writer.write_record(listing.to_record())?;
    }

    writer.flush()?;
    tracing::info!(rows = listings.len(), path = %path.display(), "Appended raw listings");
    Ok(())
}

/// Reads every row of the raw file. A row without exactly six fields is fatal.
pub fn read_raw(path: &Path) -> Result<Vec<RawListing>, StoreError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut listings = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = record.position().map_or(0, |p| p.line());
        if record.len() != RAW_COLUMNS.len() {
            return Err(StoreError::MalformedRow {
                row,
                expected: RAW_COLUMNS.len(),
                found: record.len(),
            });
        }
        listings.push(RawListing::from_fields([
            &record[0], &record[1], &record[2], &record[3], &record[4], &record[5],
        ]));
    }

    Ok(listings)
}

/// Overwrites the cleaned file, header row included.
pub fn write_clean(path: &Path, listings: &[CleanListing]) -> Result<(), StoreError> {
    let file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for listing in listings {
        writer.serialize(listing)?;
    }

    writer.flush()?;
    tracing::info!(rows = listings.len(), path = %path.display(), "Saved cleaned listings");
    Ok(())
}

pub fn read_clean(path: &Path) -> Result<Vec<CleanListing>, StoreError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut listings = Vec::new();
    for result in reader.deserialize() {
        let listing: CleanListing = result?;
        listings.push(listing);
    }

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str) -> RawListing {
        RawListing {
            timestamp: "2021-01-31T10:15:00.123456".into(),
            title: title.into(),
            price: "US $1,299.00".into(),
            original_price: Some("US $1,499.00".into()),
            shipping: None,
            item_url: "https://www.ebay.com/itm/42".into(),
        }
    }

    #[test]
    fn raw_file_accumulates_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");

        append_raw(&path, &[listing("Laptop, 16GB")]).unwrap();
        append_raw(&path, &[listing("Tablet"), listing("Phone")]).unwrap();

        let rows = read_raw(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], listing("Laptop, 16GB"));
        assert_eq!(rows[2].title, "Phone");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.starts_with("timestamp"));
        assert!(text.contains(",N/A,"));
    }

    #[test]
    fn short_row_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "a,b,c,d,e,f\na,b,c\n").unwrap();

        match read_raw(&path) {
            Err(StoreError::MalformedRow { row, found, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn missing_numbers_round_trip_as_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.csv");
        let row = CleanListing {
            timestamp: "2021-01-31T10:15:00".into(),
            title: "Watch".into(),
            price: None,
            original_price: Some(20.0),
            shipping: "Shipping info unavailable".into(),
            item_url: "u".into(),
            discount_percentage: 0.0,
        };

        write_clean(&path, std::slice::from_ref(&row)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(
            "timestamp,title,price,original_price,shipping,item_url,discount_percentage\n"
        ));
        assert_eq!(read_clean(&path).unwrap(), vec![row]);
    }
}
