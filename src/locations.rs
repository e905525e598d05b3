use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair as returned by the weather API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

/// Saved locations, persisted as a JSON object keyed by lowercased name.
///
/// Saved coordinates let the bot skip the geocoding round trip and query
/// the forecast endpoint by lat/lon directly.
pub struct LocationStore {
    path: PathBuf,
    locations: BTreeMap<String, Coord>,
}

impl LocationStore {
    /// Loads the store from `path`, starting empty if the file is missing.
    pub fn open(path: PathBuf) -> Result<Self> {
        let locations = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read locations file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse locations file: {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, locations })
    }

    pub fn get(&self, name: &str) -> Option<Coord> {
        self.locations.get(&name.trim().to_lowercase()).copied()
    }

    /// Saved location names, in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.locations.keys().cloned().collect()
    }

    /// Saves a location under its lowercased name and writes the file.
    pub fn save(&mut self, name: &str, lat: f64, lon: f64) -> Result<()> {
        let key = name.trim().to_lowercase();
        self.locations.insert(key, Coord { lat, lon });

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create locations directory: {}", parent.display())
            })?;
        }
        let contents = serde_json::to_string_pretty(&self.locations)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write locations file: {}", self.path.display()))?;
        Ok(())
    }
}
