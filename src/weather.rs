use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::locations::{Coord, LocationStore};
use crate::lookup::LookupResponse;

/// How long a fetched forecast stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEntry {
    pub dt_txt: String,
    pub main: ForecastMain,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastMain {
    pub temp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherCondition {
    pub description: String,
}

/// One forecast day collapsed to the average temperature and the most
/// frequent condition description.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub date: String,
    pub avg_temp: f64,
    pub description: String,
}

/// Which way to address the forecast endpoint.
#[derive(Debug, Clone)]
pub enum ForecastQuery {
    ByName(String),
    ByCoord(Coord),
}

/// Client for the OpenWeatherMap API.
pub struct WeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WeatherClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Current-weather query backing the location lookup. The body is
    /// decoded regardless of the HTTP status line: the API reports "not
    /// found" as a JSON body with its own `cod` field.
    pub async fn lookup(&self, query: &str) -> Result<LookupResponse> {
        let url = format!("{}/weather", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("appid", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to reach weather API")?;
        response
            .json::<LookupResponse>()
            .await
            .context("Failed to decode weather API response")
    }

    /// Five-day forecast in metric units, by name or by coordinates.
    pub async fn forecast(&self, query: &ForecastQuery) -> Result<ForecastResponse> {
        let url = format!("{}/forecast", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("appid", self.api_key.as_str()), ("units", "metric")]);
        request = match query {
            ForecastQuery::ByName(name) => request.query(&[("q", name.as_str())]),
            ForecastQuery::ByCoord(coord) => request.query(&[
                ("lat", coord.lat.to_string()),
                ("lon", coord.lon.to_string()),
            ]),
        };
        let response = request.send().await.context("Failed to reach weather API")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Weather API returned status {}",
                response.status()
            ));
        }
        response
            .json::<ForecastResponse>()
            .await
            .context("Failed to decode forecast response")
    }
}

struct CacheEntry {
    summary: Vec<DaySummary>,
    fetched_at: Instant,
}

/// Forecast fetching with a per-location cache and the saved-location
/// coordinate shortcut.
pub struct WeatherService {
    client: Arc<WeatherClient>,
    locations: LocationStore,
    cache: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl WeatherService {
    pub fn new(client: Arc<WeatherClient>, locations: LocationStore) -> Self {
        Self {
            client,
            locations,
            cache: HashMap::new(),
            ttl: CACHE_TTL,
        }
    }

    /// Forecast summary for a location. Cached results are reused until the
    /// TTL lapses; saved locations are queried by coordinates, skipping the
    /// name search. Only successful fetches are cached.
    pub async fn forecast_for(&mut self, location: &str) -> Result<Vec<DaySummary>> {
        let key = location.trim().to_lowercase();
        if let Some(entry) = self.cache.get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.summary.clone());
            }
        }

        let query = match self.locations.get(&key) {
            Some(coord) => ForecastQuery::ByCoord(coord),
            None => ForecastQuery::ByName(key.clone()),
        };
        let response = self.client.forecast(&query).await?;
        let summary = summarize(&response);
        self.cache.insert(
            key,
            CacheEntry {
                summary: summary.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(summary)
    }

    pub fn save_location(&mut self, name: &str, lat: f64, lon: f64) -> Result<()> {
        self.locations.save(name, lat, lon)
    }

    pub fn saved_names(&self) -> Vec<String> {
        self.locations.names()
    }

    #[cfg(test)]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[cfg(test)]
    pub fn prime(&mut self, location: &str, summary: Vec<DaySummary>) {
        self.cache.insert(
            location.trim().to_lowercase(),
            CacheEntry {
                summary,
                fetched_at: Instant::now(),
            },
        );
    }
}

/// Collapses the three-hourly forecast list into one summary per calendar
/// day, in the order days first appear. The average is rounded to two
/// decimals; description ties go to the condition seen first.
pub fn summarize(response: &ForecastResponse) -> Vec<DaySummary> {
    let mut days: Vec<(String, Vec<&ForecastEntry>)> = Vec::new();
    for entry in &response.list {
        let Some(date) = entry.dt_txt.split_whitespace().next() else {
            continue;
        };
        match days.iter_mut().find(|(day, _)| day == date) {
            Some((_, entries)) => entries.push(entry),
            None => days.push((date.to_string(), vec![entry])),
        }
    }

    days.into_iter()
        .map(|(date, entries)| {
            let avg = entries.iter().map(|e| e.main.temp).sum::<f64>() / entries.len() as f64;
            DaySummary {
                date,
                avg_temp: (avg * 100.0).round() / 100.0,
                description: most_common_description(&entries),
            }
        })
        .collect()
}

fn most_common_description(entries: &[&ForecastEntry]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for entry in entries {
        let Some(condition) = entry.weather.first() else {
            continue;
        };
        match counts
            .iter_mut()
            .find(|(description, _)| *description == condition.description)
        {
            Some((_, count)) => *count += 1,
            None => counts.push((condition.description.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (description, count) in counts {
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((description, count));
        }
    }
    best.map(|(description, _)| description.to_string())
        .unwrap_or_default()
}
