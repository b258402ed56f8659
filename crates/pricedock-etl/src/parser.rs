// Streaming Record Parser
//
// Decodes gzip-compressed XML catalogs and yields one flat record per matching
// element. Only the record currently being assembled is held in memory: events
// outside a matching element are discarded as they are read and nothing is
// accumulated for ancestors, so memory stays flat on documents with tens of
// thousands of elements.
//
// Record shape: child local-name -> text content, e.g.
//   <Item><ItemCode>123</ItemCode><ItemPrice>6.90</ItemPrice></Item>
//   => {"ItemCode": "123", "ItemPrice": "6.90"}

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed XML at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Document ended inside an open <{tag}> element")]
    Truncated { tag: String },

    #[error("Missing field {field} in <{tag}> record")]
    MissingField { tag: String, field: String },

    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, ParseError>;

// ============================================================================
// Record
// ============================================================================

/// One matching element flattened to its direct children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a child value; a repeated child keeps the last value seen
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Lookup that ignores ASCII case; store directories spell `STOREID`,
    /// `StoreId` and `storeid` depending on the publisher
    pub fn get_ci(&self, name: &str) -> Option<&str> {
        self.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    /// Case-insensitive lookup returning the trimmed value, `None` when blank
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get_ci(name).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Like [`Record::text`] but a blank or absent field is an error
    pub fn require(&self, tag: &str, name: &str) -> Result<&str> {
        self.text(name).ok_or_else(|| ParseError::MissingField {
            tag: tag.to_string(),
            field: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_ci(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

// ============================================================================
// Tag Matching
// ============================================================================

/// Whether an element name selects a record.
///
/// Accepts an exact match, an ASCII case-insensitive match, or a
/// case-insensitive match after a namespace prefix so that `asx:STORE` and
/// `ns0:store` select `STORE`. `SUBSTORE` does not.
pub fn tag_matches(name: &[u8], target: &str) -> bool {
    let target = target.as_bytes();
    if name == target || name.eq_ignore_ascii_case(target) {
        return true;
    }
    if name.len() <= target.len() {
        return false;
    }
    let (prefix, local) = name.split_at(name.len() - target.len());
    prefix.ends_with(b":") && local.eq_ignore_ascii_case(target)
}

// ============================================================================
// Record Stream
// ============================================================================

/// Lazy, finite, non-restartable sequence of records.
///
/// Owns the underlying reader, so the file handle and decompression state are
/// released whenever the stream is dropped, whether iteration finished,
/// failed, or was abandoned early. After the first error the stream is fused
/// and yields `None`.
pub struct RecordStream<R: BufRead> {
    reader: Reader<R>,
    target: String,
    buf: Vec<u8>,
    depth: usize,
    yielded: usize,
    done: bool,
}

/// Stream over a gzip-compressed source
pub type GzRecordStream<R> = RecordStream<BufReader<GzDecoder<R>>>;

impl GzRecordStream<File> {
    /// Open a gzip-compressed XML file
    pub fn open<P: AsRef<Path>>(path: P, target: &str) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), tag = target, "Opened feed file");
        Ok(Self::from_gzip(file, target))
    }
}

impl<R: Read> GzRecordStream<R> {
    /// Wrap any gzip-compressed byte source
    pub fn from_gzip(source: R, target: &str) -> Self {
        RecordStream::from_xml(BufReader::new(GzDecoder::new(source)), target)
    }
}

impl<R: BufRead> RecordStream<R> {
    /// Stream over an uncompressed XML source
    pub fn from_xml(source: R, target: &str) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            target: target.to_string(),
            buf: Vec::with_capacity(1024),
            depth: 0,
            yielded: 0,
            done: false,
        }
    }

    /// Number of records produced so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Skip forward to the next matching element and consume it
    fn next_record(&mut self) -> Result<Option<Record>> {
        enum Step {
            Open,
            EmptyRecord,
            Descend,
            Ascend,
            Eof,
            Skip,
        }

        loop {
            self.buf.clear();
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) if tag_matches(e.name().as_ref(), &self.target) => Step::Open,
                Ok(Event::Start(_)) => Step::Descend,
                Ok(Event::Empty(e)) if tag_matches(e.name().as_ref(), &self.target) => {
                    Step::EmptyRecord
                },
                Ok(Event::End(_)) => Step::Ascend,
                Ok(Event::Eof) => Step::Eof,
                Ok(_) => Step::Skip,
                Err(e) => return Err(xml_error(&self.reader, e)),
            };

            match step {
                Step::Open => return self.read_record().map(Some),
                Step::EmptyRecord => {
                    self.yielded += 1;
                    return Ok(Some(Record::new()));
                },
                Step::Descend => self.depth += 1,
                Step::Ascend => self.depth = self.depth.saturating_sub(1),
                Step::Eof if self.depth > 0 => {
                    return Err(ParseError::Truncated {
                        tag: "document".to_string(),
                    })
                },
                Step::Eof => return Ok(None),
                Step::Skip => {},
            }
        }
    }

    /// Consume the body of a matching element whose start tag was just read.
    ///
    /// Only direct children become fields; text inside grandchildren is folded
    /// into the enclosing child's value.
    fn read_record(&mut self) -> Result<Record> {
        let mut record = Record::new();
        let mut depth = 0usize;
        let mut child: Option<(String, String)> = None;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    if depth == 1 {
                        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                        child = Some((name, String::new()));
                    }
                },
                Ok(Event::Empty(e)) => {
                    if depth == 0 {
                        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                        record.insert(name, String::new());
                    }
                },
                Ok(Event::Text(t)) => {
                    if let Some((_, text)) = child.as_mut() {
                        let value = t.unescape().map_err(|e| xml_error(&self.reader, e))?;
                        text.push_str(&value);
                    }
                },
                Ok(Event::CData(c)) => {
                    if let Some((_, text)) = child.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&c));
                    }
                },
                Ok(Event::End(_)) => {
                    if depth == 0 {
                        self.yielded += 1;
                        return Ok(record);
                    }
                    if depth == 1 {
                        if let Some((name, text)) = child.take() {
                            record.insert(name, text);
                        }
                    }
                    depth -= 1;
                },
                Ok(Event::Eof) => {
                    return Err(ParseError::Truncated {
                        tag: self.target.clone(),
                    })
                },
                Ok(_) => {},
                Err(e) => return Err(xml_error(&self.reader, e)),
            }
        }
    }
}

fn xml_error<R>(reader: &Reader<R>, err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                debug!(tag = %self.target, records = self.yielded, "Reached end of document");
                None
            },
            Err(e) => {
                self.done = true;
                Some(Err(e))
            },
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for RecordStream<R> {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn gzip(xml: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn parse_all(xml: &str, tag: &str) -> Vec<Record> {
        RecordStream::from_gzip(Cursor::new(gzip(xml)), tag)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_tag_matching_rules() {
        assert!(tag_matches(b"STORE", "STORE"));
        assert!(tag_matches(b"Store", "STORE"));
        assert!(tag_matches(b"asx:STORE", "STORE"));
        assert!(tag_matches(b"ns0:store", "STORE"));
        assert!(!tag_matches(b"STORES", "STORE"));
        assert!(!tag_matches(b"Items", "Item"));
        assert!(!tag_matches(b"TOR", "STORE"));
        assert!(!tag_matches(b"SUBSTORE", "STORE"));
        assert!(!tag_matches(b"LineItem", "Item"));
        assert!(!tag_matches(b":", "Item"));
    }

    #[test]
    fn test_similarly_named_elements_are_not_records() {
        let xml = r#"<Items>
              <Item><ItemCode>1</ItemCode></Item>
              <LineItem><ItemCode>2</ItemCode></LineItem>
              <x:Item xmlns:x="urn:x"><ItemCode>3</ItemCode></x:Item>
            </Items>"#;

        let records = parse_all(xml, "Item");

        let codes: Vec<_> = records.iter().filter_map(|r| r.get("ItemCode")).collect();
        assert_eq!(codes, vec!["1", "3"]);
    }

    #[test]
    fn test_yields_one_record_per_element() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <root>
              <ChainId>7290027600007</ChainId>
              <Items Count="3">
                <Item><ItemCode>1</ItemCode><ItemName>Milk</ItemName></Item>
                <Item><ItemCode>2</ItemCode><ItemName>Bread</ItemName><ItemPrice>5.50</ItemPrice></Item>
                <Item><ItemCode>3</ItemCode></Item>
              </Items>
            </root>"#;

        let records = parse_all(xml, "Item");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("ItemCode"), Some("1"));
        assert_eq!(records[0].get("ItemName"), Some("Milk"));
        assert_eq!(records[1].len(), 3);
        assert_eq!(records[1].get("ItemPrice"), Some("5.50"));
        assert_eq!(records[2].len(), 1);
        // Fields outside the matching element never leak into records
        assert!(records.iter().all(|r| r.get("ChainId").is_none()));
    }

    #[test]
    fn test_namespaced_store_directory() {
        let xml = r#"<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0">
              <asx:values>
                <STORES>
                  <STORE><STOREID>1</STOREID><STORENAME>שלי ת"א</STORENAME><CITY>ת"א</CITY></STORE>
                  <asx:STORE><STOREID>42</STOREID><STORENAME>Haifa</STORENAME><CITY/></asx:STORE>
                </STORES>
              </asx:values>
            </asx:abap>"#;

        let records = parse_all(xml, "STORE");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("CITY"), Some("ת\"א"));
        assert_eq!(records[1].get("STOREID"), Some("42"));
        assert_eq!(records[1].get("CITY"), Some(""));
        assert_eq!(records[1].text("city"), None);
    }

    #[test]
    fn test_entities_cdata_and_grandchildren() {
        let xml = r#"<Items>
                <Item>
                  <ItemName>Salt &amp; Pepper</ItemName>
                  <ManufacturerName><![CDATA[Osem <Nestle>]]></ManufacturerName>
                  <Details><Unit>kg</Unit></Details>
                </Item>
                <Item/>
            </Items>"#;

        let records = parse_all(xml, "Item");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("ItemName"), Some("Salt & Pepper"));
        assert_eq!(records[0].get("ManufacturerName"), Some("Osem <Nestle>"));
        assert_eq!(records[0].get("Details"), Some("kg"));
        assert!(records[0].get("Unit").is_none());
        assert!(records[1].is_empty());
    }

    #[test]
    fn test_large_document_streams() {
        let mut xml = String::from("<root><Items>");
        for i in 0..20_000 {
            xml.push_str(&format!(
                "<Item><ItemCode>{i}</ItemCode><ItemPrice>{}.90</ItemPrice></Item>",
                i % 50
            ));
        }
        xml.push_str("</Items></root>");

        let mut stream = RecordStream::from_gzip(Cursor::new(gzip(&xml)), "Item");
        let mut count = 0;
        let mut last = None;
        for record in &mut stream {
            let record = record.unwrap();
            assert_eq!(record.len(), 2);
            last = record.get("ItemCode").map(str::to_string);
            count += 1;
        }

        assert_eq!(count, 20_000);
        assert_eq!(stream.yielded(), 20_000);
        assert_eq!(last.as_deref(), Some("19999"));
    }

    #[test]
    fn test_no_matching_elements() {
        let records = parse_all("<root><Other>1</Other></root>", "Item");
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_xml_stops_stream() {
        let xml = "<Items><Item><ItemCode>1</ItemCode></Item><Item><ItemCode>2</ItemName></Item></Items>";
        let mut stream = RecordStream::from_gzip(Cursor::new(gzip(xml)), "Item");

        assert!(stream.next().unwrap().is_ok());
        assert!(matches!(stream.next(), Some(Err(ParseError::Xml { .. }))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_truncated_document_is_an_error() {
        let xml = "<Items><Item><ItemCode>1</ItemCode></Item><Item><ItemCode>2</ItemCode>";
        let results: Vec<_> = RecordStream::from_gzip(Cursor::new(gzip(xml)), "Item").collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ParseError::Truncated { .. }) | Err(ParseError::Xml { .. })
        ));
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let mut bytes = gzip("<Items><Item><ItemCode>1</ItemCode></Item></Items>");
        bytes.truncate(bytes.len() / 2);
        let results: Vec<_> = RecordStream::from_gzip(Cursor::new(bytes), "Item").collect();

        assert!(results.iter().any(|r| r.is_err()));
        assert!(results.last().unwrap().is_err());
    }

    #[test]
    fn test_not_gzip_is_an_error() {
        let mut stream = RecordStream::from_gzip(Cursor::new(b"plain text".to_vec()), "Item");
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_record_lookup_helpers() {
        let record: Record = [("STOREID", " 7 "), ("CITY", "  ")].into_iter().collect();

        assert_eq!(record.get_ci("StoreId"), Some(" 7 "));
        assert_eq!(record.text("storeid"), Some("7"));
        assert_eq!(record.text("CITY"), None);
        assert!(record.contains("city"));
        assert!(matches!(
            record.require("STORE", "CITY"),
            Err(ParseError::MissingField { .. })
        ));
    }
}
