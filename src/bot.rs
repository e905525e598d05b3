use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::channel::{IncomingPayload, OutgoingMessage};
use crate::weather::{DaySummary, WeatherService};

/// Where the bot looks when a weather question names no place.
pub const DEFAULT_LOCATION: &str = "London";

/// Trip scoring treats this average as the perfect temperature.
const IDEAL_TEMP: f64 = 20.0;

const SAVE_USAGE: &str = "Usage: save <name> <lat> <lon>";

/// The conversational responder behind the chat channel. Weather questions,
/// `save` and `recommend` commands are answered from the forecast service;
/// everything else falls back to canned small talk.
pub struct TravelBot {
    weather: WeatherService,
}

impl TravelBot {
    pub fn new(weather: WeatherService) -> Self {
        Self { weather }
    }

    /// Produces the reply for one user message.
    pub async fn respond(&mut self, text: &str) -> IncomingPayload {
        let raw = text.trim();
        let message = raw.to_lowercase();
        if message.is_empty() {
            return IncomingPayload::error("Please enter a message.");
        }

        if message == "save" {
            return IncomingPayload::error(SAVE_USAGE);
        }
        if let Some(args) = message.strip_prefix("save ") {
            return self.handle_save(args);
        }
        if message == "recommend" || message.starts_with("recommend ") {
            // Candidates come from the raw text so the reply keeps the
            // user's casing.
            let args = raw.get("recommend".len()..).unwrap_or("");
            return self.handle_recommend(args).await;
        }
        if message.contains("weather") {
            let location = extract_location(&message);
            return self.handle_weather(&location).await;
        }
        IncomingPayload::message(small_talk(&message))
    }

    fn handle_save(&mut self, args: &str) -> IncomingPayload {
        let Some((rest, lon)) = args.trim().rsplit_once(' ') else {
            return IncomingPayload::error(SAVE_USAGE);
        };
        let Some((name, lat)) = rest.trim_end().rsplit_once(' ') else {
            return IncomingPayload::error(SAVE_USAGE);
        };
        let (Ok(lat), Ok(lon)) = (lat.parse::<f64>(), lon.parse::<f64>()) else {
            return IncomingPayload::error(SAVE_USAGE);
        };
        let name = name.trim();
        if name.is_empty() {
            return IncomingPayload::error(SAVE_USAGE);
        }

        match self.weather.save_location(name, lat, lon) {
            Ok(()) => {
                IncomingPayload::message(format!("Saved {} at {}, {}.", name, lat, lon))
            }
            Err(err) => {
                warn!("Failed to save location {}: {:#}", name, err);
                IncomingPayload::error("Unable to save that location.")
            }
        }
    }

    async fn handle_weather(&mut self, location: &str) -> IncomingPayload {
        match self.weather.forecast_for(location).await {
            Ok(summary) => {
                let mut reply = format!("Weather forecast for {}:\n", location);
                for day in &summary {
                    reply.push_str(&format!(
                        "{}: {}, {}°C\n",
                        day.date, day.description, day.avg_temp
                    ));
                }
                reply.push_str("\nHope this helps!");
                IncomingPayload::message(reply)
            }
            Err(err) => {
                warn!("Forecast fetch for {} failed: {:#}", location, err);
                IncomingPayload::error(format!(
                    "Unable to retrieve weather data for {}.",
                    location
                ))
            }
        }
    }

    /// Compares the named places (or all saved ones when none are named)
    /// and recommends the one with the driest, mildest forecast.
    async fn handle_recommend(&mut self, args: &str) -> IncomingPayload {
        let mut candidates: Vec<String> = args
            .split_whitespace()
            .map(|word| word.trim_matches([',', '.', '!', '?']).to_string())
            .filter(|word| !word.is_empty())
            .collect();
        if candidates.is_empty() {
            candidates = self.weather.saved_names();
        }
        if candidates.is_empty() {
            return IncomingPayload::error(
                "Tell me which places to compare, for example: recommend london paris",
            );
        }

        let mut best: Option<(String, f64)> = None;
        for name in &candidates {
            let summary = match self.weather.forecast_for(name).await {
                Ok(summary) if !summary.is_empty() => summary,
                Ok(_) => continue,
                Err(err) => {
                    warn!("Skipping {} in recommendation: {:#}", name, err);
                    continue;
                }
            };
            let score = trip_score(&summary);
            if best.as_ref().map_or(true, |(_, top)| score > *top) {
                best = Some((name.clone(), score));
            }
        }

        match best {
            Some((name, _)) => {
                IncomingPayload::message(format!("I recommend {} for your trip.", name))
            }
            None => IncomingPayload::error("Unable to retrieve weather data for those places."),
        }
    }
}

/// Runs the bot on its own task, answering each chat message in order.
pub fn spawn(
    mut bot: TravelBot,
    mut messages: mpsc::UnboundedReceiver<OutgoingMessage>,
    replies: mpsc::UnboundedSender<IncomingPayload>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            let reply = bot.respond(&message.message).await;
            if replies.send(reply).is_err() {
                break;
            }
        }
    })
}

/// Pulls the place name out of a lowercased weather question. "weather in
/// paris" and "weather paris" both yield "paris"; a bare "weather" falls
/// back to the default location.
fn extract_location(message: &str) -> String {
    if let Some((_, after)) = message.rsplit_once(" in ") {
        let location = after.trim().trim_end_matches(['.', ',', '!', '?']).trim_end();
        if !location.is_empty() {
            return location.to_string();
        }
    }
    if let Some(position) = message.find("weather") {
        let after = &message[position + "weather".len()..];
        let location = after.trim().trim_end_matches(['.', ',', '!', '?']).trim_end();
        if !location.is_empty() {
            return location.to_string();
        }
    }
    DEFAULT_LOCATION.to_string()
}

/// Higher is better: the dry share of days plus how close the average
/// temperature sits to the ideal.
fn trip_score(summary: &[DaySummary]) -> f64 {
    let total = summary.len() as f64;
    let dry = summary
        .iter()
        .filter(|day| !is_wet(&day.description))
        .count() as f64;
    let avg = summary.iter().map(|day| day.avg_temp).sum::<f64>() / total;
    let mildness = 1.0 - ((avg - IDEAL_TEMP).abs() / 30.0).min(1.0);
    dry / total + mildness
}

fn is_wet(description: &str) -> bool {
    ["rain", "drizzle", "snow", "storm", "thunder", "sleet"]
        .iter()
        .any(|marker| description.contains(marker))
}

fn small_talk(message: &str) -> String {
    let has_word = |target: &str| message.split_whitespace().any(|word| word == target);
    if has_word("hello") || has_word("hi") || has_word("hey") {
        "Hello! Ask me about the weather, for example \"weather in london\".".to_string()
    } else if message.contains("thank") {
        "You're welcome! Safe travels.".to_string()
    } else if has_word("bye") || has_word("goodbye") {
        "Goodbye! Safe travels.".to_string()
    } else {
        "I can check forecasts (\"weather in paris\"), save places (\"save paris 48.85 2.35\"), and suggest a destination (\"recommend london paris\").".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locations::LocationStore;
    use crate::weather::WeatherClient;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(dir: &Path) -> WeatherService {
        // Nothing listens on this port, so uncached fetches fail fast.
        let client = Arc::new(WeatherClient::new(
            "http://127.0.0.1:9".to_string(),
            "test-key".to_string(),
        ));
        let locations = LocationStore::open(dir.join("locations.json")).unwrap();
        WeatherService::new(client, locations)
    }

    fn day(date: &str, avg_temp: f64, description: &str) -> DaySummary {
        DaySummary {
            date: date.to_string(),
            avg_temp,
            description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_message_asks_for_input() {
        let dir = TempDir::new().unwrap();
        let mut bot = TravelBot::new(service(dir.path()));
        let reply = bot.respond("   ").await;
        assert_eq!(reply.error.as_deref(), Some("Please enter a message."));
    }

    #[tokio::test]
    async fn test_weather_question_reports_forecast() {
        let dir = TempDir::new().unwrap();
        let mut weather = service(dir.path());
        weather.prime(
            "paris",
            vec![
                day("2024-03-01", 11.5, "clear sky"),
                day("2024-03-02", 9.25, "light rain"),
            ],
        );
        let mut bot = TravelBot::new(weather);

        let reply = bot.respond("What's the weather in Paris?").await;
        assert_eq!(
            reply.message.as_deref(),
            Some(
                "Weather forecast for paris:\n\
                 2024-03-01: clear sky, 11.5°C\n\
                 2024-03-02: light rain, 9.25°C\n\
                 \nHope this helps!"
            )
        );
    }

    #[tokio::test]
    async fn test_bare_weather_question_defaults_to_london() {
        let dir = TempDir::new().unwrap();
        let mut weather = service(dir.path());
        weather.prime("london", vec![day("2024-03-01", 8.0, "mist")]);
        let mut bot = TravelBot::new(weather);

        let reply = bot.respond("weather").await;
        let message = reply.message.unwrap();
        assert!(message.starts_with("Weather forecast for London:"));
        assert!(message.contains("mist"));
    }

    #[tokio::test]
    async fn test_failed_fetch_reports_location() {
        let dir = TempDir::new().unwrap();
        let mut bot = TravelBot::new(service(dir.path()));
        let reply = bot.respond("weather in nowhere").await;
        assert_eq!(
            reply.error.as_deref(),
            Some("Unable to retrieve weather data for nowhere.")
        );
    }

    #[tokio::test]
    async fn test_save_command_persists_and_confirms() {
        let dir = TempDir::new().unwrap();
        let mut bot = TravelBot::new(service(dir.path()));

        let reply = bot.respond("save Paris 48.85 2.35").await;
        assert_eq!(
            reply.message.as_deref(),
            Some("Saved paris at 48.85, 2.35.")
        );

        let store = LocationStore::open(dir.path().join("locations.json")).unwrap();
        let coord = store.get("paris").unwrap();
        assert_eq!(coord.lat, 48.85);
        assert_eq!(coord.lon, 2.35);
    }

    #[tokio::test]
    async fn test_save_with_bad_arguments_shows_usage() {
        let dir = TempDir::new().unwrap();
        let mut bot = TravelBot::new(service(dir.path()));
        for message in ["save", "save paris", "save paris one two"] {
            let reply = bot.respond(message).await;
            assert_eq!(reply.error.as_deref(), Some(SAVE_USAGE), "{}", message);
        }
    }

    #[tokio::test]
    async fn test_save_accepts_multi_word_names() {
        let dir = TempDir::new().unwrap();
        let mut bot = TravelBot::new(service(dir.path()));
        let reply = bot.respond("save New York 40.71 -74.01").await;
        assert_eq!(
            reply.message.as_deref(),
            Some("Saved new york at 40.71, -74.01.")
        );
    }

    #[tokio::test]
    async fn test_recommend_prefers_dry_mild_weather() {
        let dir = TempDir::new().unwrap();
        let mut weather = service(dir.path());
        weather.prime(
            "london",
            vec![
                day("2024-03-01", 8.0, "light rain"),
                day("2024-03-02", 7.5, "heavy rain"),
            ],
        );
        weather.prime(
            "paris",
            vec![
                day("2024-03-01", 19.0, "clear sky"),
                day("2024-03-02", 20.5, "few clouds"),
            ],
        );
        let mut bot = TravelBot::new(weather);

        let reply = bot.respond("recommend London Paris").await;
        assert_eq!(
            reply.message.as_deref(),
            Some("I recommend Paris for your trip.")
        );
    }

    #[tokio::test]
    async fn test_recommend_without_candidates_uses_saved_locations() {
        let dir = TempDir::new().unwrap();
        let mut weather = service(dir.path());
        weather.save_location("lisbon", 38.72, -9.14).unwrap();
        weather.prime("lisbon", vec![day("2024-03-01", 18.0, "clear sky")]);
        let mut bot = TravelBot::new(weather);

        let reply = bot.respond("recommend").await;
        assert_eq!(
            reply.message.as_deref(),
            Some("I recommend lisbon for your trip.")
        );
    }

    #[tokio::test]
    async fn test_recommend_with_no_data_reports_error() {
        let dir = TempDir::new().unwrap();
        let mut bot = TravelBot::new(service(dir.path()));
        let reply = bot.respond("recommend atlantis").await;
        assert_eq!(
            reply.error.as_deref(),
            Some("Unable to retrieve weather data for those places.")
        );
    }

    #[tokio::test]
    async fn test_greeting_gets_small_talk() {
        let dir = TempDir::new().unwrap();
        let mut bot = TravelBot::new(service(dir.path()));
        let reply = bot.respond("hello").await;
        assert_eq!(
            reply.message.as_deref(),
            Some("Hello! Ask me about the weather, for example \"weather in london\".")
        );
    }

    #[tokio::test]
    async fn test_spawned_bot_answers_in_order() {
        let dir = TempDir::new().unwrap();
        let mut weather = service(dir.path());
        weather.prime("paris", vec![day("2024-03-01", 12.0, "clear sky")]);
        let bot = TravelBot::new(weather);

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let handle = spawn(bot, out_rx, reply_tx);

        out_tx
            .send(OutgoingMessage {
                message: "weather in paris".to_string(),
            })
            .unwrap();
        out_tx
            .send(OutgoingMessage {
                message: "thanks".to_string(),
            })
            .unwrap();

        let first = reply_rx.recv().await.unwrap();
        assert!(first
            .message
            .unwrap()
            .starts_with("Weather forecast for paris:"));
        let second = reply_rx.recv().await.unwrap();
        assert_eq!(
            second.message.as_deref(),
            Some("You're welcome! Safe travels.")
        );

        drop(out_tx);
        handle.await.unwrap();
    }
}
