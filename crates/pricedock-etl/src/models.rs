// Warehouse row types and record conversion
//
// Dimension rows (chain, city, store, product) and the price fact row, plus the
// pure conversions from parsed feed records into those rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::normalize::EntityNormalizer;
use crate::parser::{ParseError, Record};

/// Repeated element in store directory documents
pub const STORE_TAG: &str = "STORE";

/// Repeated element in price listing documents
pub const ITEM_TAG: &str = "Item";

// Store directory fields (matched case-insensitively)
pub const FIELD_STORE_ID: &str = "StoreId";
pub const FIELD_STORE_NAME: &str = "StoreName";
pub const FIELD_CITY: &str = "City";

// Price listing fields
pub const FIELD_ITEM_CODE: &str = "ItemCode";
pub const FIELD_ITEM_NAME: &str = "ItemName";
pub const FIELD_MANUFACTURER: &str = "ManufacturerName";
pub const FIELD_ITEM_PRICE: &str = "ItemPrice";
pub const FIELD_PRICE_UPDATE_DATE: &str = "PriceUpdateDate";

// ============================================================================
// Dimension Rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: String,
    pub chain_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub city_name: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub store_id: String,
    pub chain_id: String,
    pub store_name: Option<String>,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub barcode: String,
    pub item_name: Option<String>,
    pub category: String,
    pub manufacturer: Option<String>,
}

// ============================================================================
// Fact Row
// ============================================================================

/// One price observation; appended, never updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceObservation {
    pub barcode: String,
    pub store_id: String,
    pub chain_id: String,
    pub sample_date: Option<NaiveDateTime>,
    pub price: Option<BigDecimal>,
}

/// A price listing record split into its product and fact parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRow {
    pub product: Product,
    pub observation: PriceObservation,
}

// ============================================================================
// Store Batch
// ============================================================================

/// Normalized dimension rows from one store directory file.
///
/// Cities are distinct by canonical name and stores distinct by derived id
/// (a later record for the same id replaces the earlier one), so each key is
/// written once per file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreBatch {
    pub cities: Vec<City>,
    pub stores: Vec<Store>,
}

impl StoreBatch {
    /// Build a batch from store directory records
    pub fn from_records<I>(
        records: I,
        chain_id: &str,
        normalizer: &EntityNormalizer,
    ) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Result<Record, ParseError>>,
    {
        let mut batch = StoreBatch::default();
        let mut city_seen: HashSet<String> = HashSet::new();
        let mut store_index: HashMap<String, usize> = HashMap::new();

        for record in records {
            let record = record?;
            let store = store_from_record(&record, chain_id, normalizer)?;

            if city_seen.insert(store.city.clone()) {
                batch.cities.push(City {
                    region: normalizer.region_for(&store.city),
                    city_name: store.city.clone(),
                });
            }

            match store_index.get(&store.store_id) {
                Some(&idx) => batch.stores[idx] = store,
                None => {
                    store_index.insert(store.store_id.clone(), batch.stores.len());
                    batch.stores.push(store);
                },
            }
        }

        Ok(batch)
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Convert one `STORE` record into a store row with a canonical city
pub fn store_from_record(
    record: &Record,
    chain_id: &str,
    normalizer: &EntityNormalizer,
) -> Result<Store, ParseError> {
    let local_code = record.require(STORE_TAG, FIELD_STORE_ID)?;

    Ok(Store {
        store_id: normalizer.derive_store_id(chain_id, local_code),
        chain_id: chain_id.to_string(),
        store_name: record.text(FIELD_STORE_NAME).map(str::to_string),
        city: normalizer.normalize_city(record.get_ci(FIELD_CITY)),
    })
}

// ============================================================================
// Price Rows
// ============================================================================

/// Per-file values shared by every record of a price listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFileContext {
    pub filename: String,
    pub chain_id: String,
    /// Store id derived from the filename, used when a record has no store field
    pub filename_store_id: String,
    /// Placeholder category for new products
    pub category: String,
}

impl PriceFileContext {
    pub fn for_file(
        filename: &str,
        chain_id: &str,
        category: &str,
        normalizer: &EntityNormalizer,
    ) -> Self {
        let code = normalizer.derive_filename_store_code(filename);
        Self {
            filename: filename.to_string(),
            chain_id: chain_id.to_string(),
            filename_store_id: normalizer.derive_store_id(chain_id, &code),
            category: category.to_string(),
        }
    }
}

/// Convert one `Item` record into product and observation rows
pub fn observation_from_record(
    record: &Record,
    ctx: &PriceFileContext,
    normalizer: &EntityNormalizer,
) -> Result<PriceRow, ParseError> {
    let barcode = record.require(ITEM_TAG, FIELD_ITEM_CODE)?.to_string();

    let store_id = match record.text(FIELD_STORE_ID) {
        Some(code) => normalizer.derive_store_id(&ctx.chain_id, code),
        None => ctx.filename_store_id.clone(),
    };

    let sample_date = record
        .text(FIELD_PRICE_UPDATE_DATE)
        .map(parse_sample_date)
        .transpose()?;
    let price = record.text(FIELD_ITEM_PRICE).map(parse_price).transpose()?;

    Ok(PriceRow {
        product: Product {
            barcode: barcode.clone(),
            item_name: record.text(FIELD_ITEM_NAME).map(str::to_string),
            category: ctx.category.clone(),
            manufacturer: record.text(FIELD_MANUFACTURER).map(str::to_string),
        },
        observation: PriceObservation {
            barcode,
            store_id,
            chain_id: ctx.chain_id.clone(),
            sample_date,
            price,
        },
    })
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Parse a price update timestamp into a naive wall-clock timestamp.
///
/// Date-only values map to midnight. Values carrying an offset keep their
/// local wall-clock time.
pub fn parse_sample_date(raw: &str) -> Result<NaiveDateTime, ParseError> {
    let value = raw.trim();

    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.naive_local());
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            if let Some(ts) = date.and_hms_opt(0, 0, 0) {
                return Ok(ts);
            }
        }
    }

    Err(ParseError::InvalidValue {
        field: FIELD_PRICE_UPDATE_DATE.to_string(),
        value: value.to_string(),
    })
}

/// Parse a decimal price
pub fn parse_price(raw: &str) -> Result<BigDecimal, ParseError> {
    BigDecimal::from_str(raw.trim()).map_err(|_| ParseError::InvalidValue {
        field: FIELD_ITEM_PRICE.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const CHAIN: &str = "7290027600007";

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn ctx() -> PriceFileContext {
        PriceFileContext::for_file(
            "PriceFull7290027600007-042_202401010000",
            CHAIN,
            "כללי",
            &EntityNormalizer::default(),
        )
    }

    #[test]
    fn test_store_from_uppercase_record() {
        let n = EntityNormalizer::default();
        let r = record(&[("STOREID", "1"), ("STORENAME", "שלי ת\"א"), ("CITY", "ת\"א")]);

        let store = store_from_record(&r, CHAIN, &n).unwrap();

        assert_eq!(store.store_id, "7290027600007-001");
        assert_eq!(store.store_name.as_deref(), Some("שלי ת\"א"));
        assert_eq!(store.city, "תל אביב");
    }

    #[test]
    fn test_store_without_id_is_rejected() {
        let n = EntityNormalizer::default();
        let r = record(&[("STORENAME", "x"), ("CITY", "חיפה")]);

        let err = store_from_record(&r, CHAIN, &n).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { ref field, .. } if field == "StoreId"));
    }

    #[test]
    fn test_store_batch_dedupes_keys() {
        let n = EntityNormalizer::default();
        let records = vec![
            Ok(record(&[("StoreId", "1"), ("StoreName", "A"), ("City", "ת\"א")])),
            Ok(record(&[("StoreId", "2"), ("StoreName", "B"), ("City", "תל אביב")])),
            Ok(record(&[("StoreId", "001"), ("StoreName", "A2"), ("City", "")])),
        ];

        let batch = StoreBatch::from_records(records, CHAIN, &n).unwrap();

        assert_eq!(batch.stores.len(), 2);
        assert_eq!(batch.stores[0].store_name.as_deref(), Some("A2"));
        assert_eq!(batch.stores[0].city, "לא ידוע");
        assert_eq!(
            batch.cities,
            vec![
                City {
                    city_name: "תל אביב".into(),
                    region: "מרכז".into()
                },
                City {
                    city_name: "לא ידוע".into(),
                    region: "לא מוגדר".into()
                },
            ]
        );
    }

    #[test]
    fn test_store_batch_propagates_parse_errors() {
        let n = EntityNormalizer::default();
        let records = vec![
            Ok(record(&[("StoreId", "1"), ("City", "חיפה")])),
            Err(ParseError::Truncated { tag: "STORE".into() }),
        ];

        assert!(StoreBatch::from_records(records, CHAIN, &n).is_err());
    }

    #[test]
    fn test_price_row_uses_filename_store() {
        let n = EntityNormalizer::default();
        let r = record(&[
            ("ItemCode", "123"),
            ("ItemName", "Milk"),
            ("ManufacturerName", "Tnuva"),
            ("ItemPrice", "6.90"),
            ("PriceUpdateDate", "2024-01-01"),
        ]);

        let row = observation_from_record(&r, &ctx(), &n).unwrap();

        assert_eq!(row.product.barcode, "123");
        assert_eq!(row.product.manufacturer.as_deref(), Some("Tnuva"));
        assert_eq!(row.product.category, "כללי");
        assert_eq!(row.observation.store_id, "7290027600007-042");
        assert_eq!(row.observation.chain_id, CHAIN);
        assert_eq!(row.observation.price, Some(BigDecimal::from_str("6.90").unwrap()));
        let ts = row.observation.sample_date.unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day(), ts.hour()), (2024, 1, 1, 0));
    }

    #[test]
    fn test_price_row_prefers_record_store() {
        let n = EntityNormalizer::default();
        let r = record(&[("ItemCode", "123"), ("StoreId", "7")]);

        let row = observation_from_record(&r, &ctx(), &n).unwrap();

        assert_eq!(row.observation.store_id, "7290027600007-007");
        assert_eq!(row.observation.price, None);
        assert_eq!(row.observation.sample_date, None);
    }

    #[test]
    fn test_price_row_requires_item_code() {
        let n = EntityNormalizer::default();
        let err = observation_from_record(&record(&[("ItemCode", " ")]), &ctx(), &n).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { .. }));
    }

    #[test]
    fn test_filename_without_code_falls_back() {
        let c = PriceFileContext::for_file(
            "PriceFull7290027600007_202401010000",
            CHAIN,
            "כללי",
            &EntityNormalizer::default(),
        );
        assert_eq!(c.filename_store_id, "7290027600007-001");
    }

    #[test]
    fn test_sample_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();

        assert_eq!(parse_sample_date("2024-03-05 08:30:00").unwrap(), expected);
        assert_eq!(parse_sample_date("2024-03-05T08:30:00").unwrap(), expected);
        assert_eq!(parse_sample_date("2024-03-05 08:30").unwrap(), expected);
        assert_eq!(parse_sample_date("2024/03/05 08:30").unwrap(), expected);
        assert_eq!(parse_sample_date("2024-03-05T08:30:00+02:00").unwrap(), expected);
        assert_eq!(
            parse_sample_date("2024-03-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_sample_date("yesterday"),
            Err(ParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(" 12.5 ").unwrap(), BigDecimal::from_str("12.50").unwrap());
        assert!(parse_price("12,50").is_err());
    }
}
