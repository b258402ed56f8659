//! Shared fixtures for pricedock-etl integration tests
//!
//! Builds small gzip-compressed store directories and price listings in the
//! shapes the chain publishes.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const CHAIN_ID: &str = "7290027600007";

/// One `<Item>` of a price listing
pub struct ItemFixture<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub manufacturer: &'a str,
    pub price: &'a str,
    pub date: &'a str,
}

pub const MILK: ItemFixture<'static> = ItemFixture {
    code: "123",
    name: "Milk",
    manufacturer: "Tnuva",
    price: "6.90",
    date: "2024-01-01",
};

pub fn gzip_bytes(xml: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Write `<dir>/<filename>.gz` and return its path
pub fn write_gz(dir: &Path, filename: &str, xml: &str) -> PathBuf {
    let path = dir.join(format!("{filename}.gz"));
    std::fs::write(&path, gzip_bytes(xml)).expect("write fixture");
    path
}

/// Store directory in the SAP-style envelope, `(store code, name, city)` per row
pub fn stores_xml(stores: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?>
<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0">
  <asx:values>
    <CHAINID>7290027600007</CHAINID>
    <STORES>
"#,
    );
    for (code, name, city) in stores {
        xml.push_str(&format!(
            "      <STORE><STOREID>{code}</STOREID><STORENAME>{name}</STORENAME><CITY>{city}</CITY></STORE>\n"
        ));
    }
    xml.push_str("    </STORES>\n  </asx:values>\n</asx:abap>\n");
    xml
}

/// Price listing with one `<Item>` per fixture
pub fn prices_xml(items: &[ItemFixture<'_>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?>
<root>
  <ChainId>7290027600007</ChainId>
  <StoreId>42</StoreId>
  <Items Count="1">
"#,
    );
    for item in items {
        xml.push_str(&format!(
            "    <Item><ItemCode>{}</ItemCode><ItemName>{}</ItemName><ManufacturerName>{}</ManufacturerName><ItemPrice>{}</ItemPrice><PriceUpdateDate>{}</PriceUpdateDate></Item>\n",
            item.code, item.name, item.manufacturer, item.price, item.date
        ));
    }
    xml.push_str("  </Items>\n</root>\n");
    xml
}
