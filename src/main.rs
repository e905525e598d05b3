use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod bot;
mod channel;
mod clipboard;
mod config;
mod handler;
mod locations;
mod lookup;
mod tui;
mod ui;
mod weather;

use app::App;
use bot::TravelBot;
use channel::BotChannel;
use clipboard::SystemClipboard;
use config::Config;
use locations::LocationStore;
use tui::{AppEvent, EventHandler};
use weather::{WeatherClient, WeatherService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging()?;

    let api_key = config.resolved_api_key().ok_or_else(|| {
        anyhow!(
            "No weather API key configured. Set OPENWEATHER_API_KEY or add \"api_key\" to {}",
            Config::display_path()
        )
    })?;

    let weather = Arc::new(WeatherClient::new(config.resolved_base_url(), api_key));
    let locations = LocationStore::open(config.resolved_locations_file()?)?;

    // The bot lives on its own task and talks to the event loop over two
    // queues: outgoing chat messages in, reply payloads out.
    let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    let bot = TravelBot::new(WeatherService::new(weather.clone(), locations));
    bot::spawn(bot, outgoing_rx, reply_tx);

    let mut events = EventHandler::new();

    // Forward bot replies into the event loop as channel deliveries.
    let reply_events = events.sender();
    tokio::spawn(async move {
        while let Some(payload) = reply_rx.recv().await {
            if reply_events.send(AppEvent::Channel(payload)).is_err() {
                break;
            }
        }
    });

    let mut app = App::new(
        Arc::new(BotChannel::new(outgoing_tx)),
        Arc::new(SystemClipboard),
        weather,
        events.sender(),
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    tracing::info!("TravelBot started");

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }

    tracing::info!("TravelBot exiting");
    Ok(())
}

/// Logs go to a file under the config directory; writing to the terminal
/// would tear the alternate screen.
fn init_logging() -> Result<()> {
    let log_path = Config::log_path()?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travelbot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .init();

    Ok(())
}
