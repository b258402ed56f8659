// Entity Normalization
//
// Pure transformations from raw feed values to warehouse keys. Lookup data is
// injected at construction; nothing here performs I/O apart from loading a
// custom table file.

pub mod tables;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{EtlError, Result};

/// Store code used when a price filename carries no `-<code>_` segment
pub const FALLBACK_STORE_CODE: &str = "001";

/// Width local store codes are zero-padded to
pub const STORE_CODE_WIDTH: usize = 3;

/// Static lookup data consumed by [`EntityNormalizer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTables {
    /// Exact raw value (after trimming) to canonical city
    #[serde(default)]
    pub city_overrides: HashMap<String, String>,

    /// Ordered `(variant, canonical)` prefix rewrites; the first match wins
    #[serde(default)]
    pub prefix_rewrites: Vec<(String, String)>,

    /// Canonical city to region
    #[serde(default)]
    pub regions: HashMap<String, String>,

    #[serde(default = "default_unknown_city")]
    pub unknown_city: String,

    #[serde(default = "default_region")]
    pub default_region: String,
}

fn default_unknown_city() -> String {
    tables::UNKNOWN_CITY.to_string()
}

fn default_region() -> String {
    tables::DEFAULT_REGION.to_string()
}

fn owned_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl LookupTables {
    /// Tables compiled into the binary
    pub fn builtin() -> Self {
        Self {
            city_overrides: owned_map(tables::CITY_OVERRIDES),
            prefix_rewrites: tables::PREFIX_REWRITES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            regions: owned_map(tables::REGIONS),
            unknown_city: default_unknown_city(),
            default_region: default_region(),
        }
    }

    /// Load replacement tables from a JSON document
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            EtlError::config(format!("Invalid lookup tables in {}: {}", path.display(), e))
        })
    }
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Canonicalizes city names and derives store keys
#[derive(Debug, Clone)]
pub struct EntityNormalizer {
    tables: LookupTables,
}

impl EntityNormalizer {
    pub fn new(tables: LookupTables) -> Self {
        Self { tables }
    }

    pub fn unknown_city(&self) -> &str {
        &self.tables.unknown_city
    }

    /// Canonical city name for a raw value.
    ///
    /// Blank or absent input becomes the unknown sentinel. Otherwise the
    /// trimmed value is looked up in the override table, then checked against
    /// the prefix rewrites, and finally passed through unchanged.
    pub fn normalize_city(&self, raw: Option<&str>) -> String {
        let trimmed = match raw.map(str::trim) {
            Some(value) if !value.is_empty() => value,
            _ => return self.tables.unknown_city.clone(),
        };

        if let Some(canonical) = self.tables.city_overrides.get(trimmed) {
            return canonical.clone();
        }

        for (variant, canonical) in &self.tables.prefix_rewrites {
            if let Some(rest) = trimmed.strip_prefix(variant.as_str()) {
                return format!("{canonical}{rest}");
            }
        }

        trimmed.to_string()
    }

    /// Region for a canonical city, falling back to the default bucket
    pub fn region_for(&self, city: &str) -> String {
        match self.tables.regions.get(city) {
            Some(region) => region.clone(),
            None => {
                debug!(city, region = %self.tables.default_region, "City has no region mapping");
                self.tables.default_region.clone()
            },
        }
    }

    /// `<chain_id>-<local code zero-padded to 3>`
    pub fn derive_store_id(&self, chain_id: &str, local_code: &str) -> String {
        format!(
            "{}-{:0>width$}",
            chain_id,
            local_code.trim(),
            width = STORE_CODE_WIDTH
        )
    }

    /// Store code from a `<Prefix><ChainId>-<code>_<rest>` filename.
    ///
    /// The code is the text between the first `-` and the next `-` or `_`.
    /// Returns [`FALLBACK_STORE_CODE`] when the name has no `-`.
    pub fn derive_filename_store_code(&self, filename: &str) -> String {
        match filename.split('-').nth(1) {
            Some(segment) => segment.split('_').next().unwrap_or(segment).to_string(),
            None => FALLBACK_STORE_CODE.to_string(),
        }
    }
}

impl Default for EntityNormalizer {
    fn default() -> Self {
        Self::new(LookupTables::builtin())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn normalizer() -> EntityNormalizer {
        EntityNormalizer::default()
    }

    #[test]
    fn test_city_overrides() {
        let n = normalizer();
        assert_eq!(n.normalize_city(Some("ת\"א")), "תל אביב");
        assert_eq!(n.normalize_city(Some("  באר-שבע ")), "באר שבע");
        assert_eq!(n.normalize_city(Some("nan")), "לא ידוע");
    }

    #[test]
    fn test_prefix_rewrite_only_applies_at_start() {
        let n = normalizer();
        assert_eq!(n.normalize_city(Some("קרית אתא")), "קריית אתא");
        assert_eq!(n.normalize_city(Some("קריית אתא")), "קריית אתא");
        assert_eq!(n.normalize_city(Some("נווה קרית ים")), "נווה קרית ים");
    }

    #[test]
    fn test_blank_city_becomes_sentinel() {
        let n = normalizer();
        assert_eq!(n.normalize_city(Some("")), tables::UNKNOWN_CITY);
        assert_eq!(n.normalize_city(Some("   ")), tables::UNKNOWN_CITY);
        assert_eq!(n.normalize_city(None), tables::UNKNOWN_CITY);
    }

    #[test]
    fn test_unmapped_city_passes_through() {
        assert_eq!(normalizer().normalize_city(Some("Somewhere")), "Somewhere");
    }

    #[test]
    fn test_region_lookup_and_default() {
        let n = normalizer();
        assert_eq!(n.region_for("תל אביב"), "מרכז");
        assert_eq!(n.region_for("קריית אתא"), "צפון");
        assert_eq!(n.region_for("Somewhere"), tables::DEFAULT_REGION);
        assert_eq!(n.region_for(""), tables::DEFAULT_REGION);
    }

    #[test]
    fn test_every_override_target_is_stable() {
        // Canonical names must not themselves be rewritten again
        let n = normalizer();
        for (_, canonical) in tables::CITY_OVERRIDES {
            assert_eq!(n.normalize_city(Some(canonical)), *canonical);
        }
    }

    #[test]
    fn test_derive_store_id() {
        let n = normalizer();
        assert_eq!(n.derive_store_id("7290027600007", "42"), "7290027600007-042");
        assert_eq!(n.derive_store_id("7290027600007", "7"), "7290027600007-007");
        assert_eq!(n.derive_store_id("7290027600007", "1234"), "7290027600007-1234");
        assert_eq!(n.derive_store_id("7290027600007", " 5 "), "7290027600007-005");
    }

    #[test]
    fn test_derive_filename_store_code() {
        let n = normalizer();
        assert_eq!(
            n.derive_filename_store_code("PriceFull7290027600007-042-202401010000"),
            "042"
        );
        assert_eq!(
            n.derive_filename_store_code("PriceFull7290027600007-042_202401010000.gz"),
            "042"
        );
        assert_eq!(n.derive_filename_store_code("PriceFull7290027600007-13"), "13");
        assert_eq!(
            n.derive_filename_store_code("PriceFull7290027600007_202401010000"),
            FALLBACK_STORE_CODE
        );
    }

    #[test]
    fn test_custom_tables_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "city_overrides": {{"TLV": "Tel Aviv"}},
                "prefix_rewrites": [["St. ", "Saint "]],
                "regions": {{"Tel Aviv": "Center"}},
                "unknown_city": "Unknown"
            }}"#
        )
        .unwrap();

        let custom = LookupTables::from_json_file(file.path()).unwrap();
        let n = EntityNormalizer::new(custom);

        assert_eq!(n.normalize_city(Some("TLV")), "Tel Aviv");
        assert_eq!(n.normalize_city(Some("St. Louis")), "Saint Louis");
        assert_eq!(n.normalize_city(None), "Unknown");
        assert_eq!(n.region_for("Tel Aviv"), "Center");
        assert_eq!(n.region_for("Haifa"), tables::DEFAULT_REGION);
    }

    #[test]
    fn test_invalid_tables_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = LookupTables::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }
}
