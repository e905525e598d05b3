use serde::Deserialize;

use crate::locations::Coord;

/// Response body of the current-weather endpoint, reduced to the fields the
/// location lookup cares about. The API reports its own status in `cod`,
/// sometimes as a number and sometimes as a string, independent of the HTTP
/// status line.
#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(deserialize_with = "deserialize_cod")]
    pub cod: u16,
    #[serde(default)]
    pub coord: Option<Coord>,
}

fn deserialize_cod<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cod {
        Number(u16),
        Text(String),
    }

    match Cod::deserialize(deserializer)? {
        Cod::Number(value) => Ok(value),
        Cod::Text(value) => value.parse().map_err(serde::de::Error::custom),
    }
}

/// What a finished location lookup produced, carried back into the event
/// loop alongside its request token.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found {
        lat: f64,
        lon: f64,
        save_command: String,
    },
    NotFound,
    Failed,
}

impl LookupOutcome {
    /// Classifies a decoded response body for the query that produced it.
    /// Anything other than `cod == 200` with coordinates present counts as
    /// not found; transport and decode failures are mapped to `Failed` by
    /// the caller.
    pub fn from_response(query: &str, response: &LookupResponse) -> Self {
        match (response.cod, response.coord) {
            (200, Some(coord)) => Self::Found {
                lat: coord.lat,
                lon: coord.lon,
                save_command: save_command(query, coord.lat, coord.lon),
            },
            _ => Self::NotFound,
        }
    }
}

/// Builds the bot command that saves this result, e.g. `save paris 48.85 2.35`.
pub fn save_command(name: &str, lat: f64, lon: f64) -> String {
    format!("save {} {} {}", name.trim().to_lowercase(), lat, lon)
}
