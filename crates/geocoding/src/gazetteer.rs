//! Static coordinate tables used when every network source misses.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pinplace_core::{GeocodeResult, GeocodeSource, ProviderError};
use serde::Deserialize;

use crate::GeocodeStrategy;

const EMBEDDED_PLACES: &str = include_str!("../data/places.json");
const EMBEDDED_ZIP_CODES: &str = include_str!("../data/zip_codes.json");

#[derive(Debug, Clone, Deserialize)]
struct GazetteerEntry {
    key: String,
    lat: f64,
    lng: f64,
    formatted_address: String,
}

impl GazetteerEntry {
    fn to_result(&self, source: GeocodeSource) -> GeocodeResult {
        GeocodeResult {
            lat: self.lat,
            lng: self.lng,
            formatted_address: self.formatted_address.clone(),
            place_id: None,
            source,
        }
    }
}

fn parse_entries(raw: &str, what: &str) -> Result<Vec<GazetteerEntry>> {
    let mut entries: Vec<GazetteerEntry> =
        serde_json::from_str(raw).with_context(|| format!("invalid {what} table"))?;
    for entry in &mut entries {
        entry.key = entry.key.trim().to_lowercase();
    }
    entries.retain(|entry| !entry.key.is_empty());
    Ok(entries)
}

fn read_table(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed reading {what} table at {}", path.display()))
}

/// City and venue names. Kept in file order so partial-match ties always
/// resolve to the same entry.
#[derive(Debug, Clone)]
pub struct PlaceTable {
    entries: Vec<GazetteerEntry>,
}

impl PlaceTable {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_PLACES)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&read_table(path.as_ref(), "place")?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(Self {
            entries: parse_entries(raw, "place")?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact name first, then the first entry where either string
    /// contains the other.
    pub fn lookup(&self, query: &str) -> Option<GeocodeResult> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|entry| entry.key == needle)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| needle.contains(&entry.key) || entry.key.contains(&needle))
            })
            .map(|entry| entry.to_result(GeocodeSource::PlaceTable))
    }
}

#[async_trait]
impl GeocodeStrategy for PlaceTable {
    fn name(&self) -> &'static str {
        "place_table"
    }

    async fn resolve(&self, query: &str) -> Result<Option<GeocodeResult>, ProviderError> {
        Ok(self.lookup(query))
    }
}

#[derive(Debug, Clone)]
pub struct ZipTable {
    entries: Vec<GazetteerEntry>,
}

impl ZipTable {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_ZIP_CODES)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&read_table(path.as_ref(), "zip code")?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(Self {
            entries: parse_entries(raw, "zip code")?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, zip5: &str) -> Option<GeocodeResult> {
        self.entries
            .iter()
            .find(|entry| entry.key == zip5)
            .map(|entry| entry.to_result(GeocodeSource::ZipTable))
    }
}
