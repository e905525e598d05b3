use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::channel::{ChatTransport, IncomingPayload, OutgoingMessage};
use crate::clipboard::Clipboard;
use crate::lookup::LookupOutcome;
use crate::tui::AppEvent;
use crate::weather::WeatherClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Lookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Local,
    Bot,
    Error,
}

/// One transcript entry. Content is stored verbatim and rendered as plain
/// text, so markup in a message shows up as characters, never as styling.
#[derive(Debug, Clone)]
pub struct TranscriptLine {
    pub kind: LineKind,
    pub content: String,
}

impl TranscriptLine {
    pub fn prefix(&self) -> &'static str {
        match self.kind {
            LineKind::Local => "You: ",
            LineKind::Bot => "TravelBot: ",
            LineKind::Error => "Error: ",
        }
    }
}

/// Lookup panel state machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LookupState {
    #[default]
    Idle,
    Pending {
        query: String,
    },
    Found {
        coords: String,
        save_command: String,
    },
    NotFound,
    Failed,
}

/// How long the "Copied" indicator stays up, in 300ms ticks.
pub const COPIED_VISIBLE_TICKS: u8 = 10;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub focus: FocusPane,
    pub input_mode: InputMode,

    // Chat state
    pub transcript: Vec<TranscriptLine>,
    pub message_input: String,
    pub message_cursor: usize, // cursor position in message_input
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of transcript area for scroll calculations
    pub chat_width: u16,  // Width of transcript area for wrap calculations

    // Lookup state
    pub lookup_input: String,
    pub lookup_cursor: usize,
    pub lookup: LookupState,
    lookup_token: u64,
    pub copied_ticks: u8,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Collaborators
    pub channel: Arc<dyn ChatTransport>,
    pub clipboard: Arc<dyn Clipboard>,
    pub weather: Arc<WeatherClient>,
    pub events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        channel: Arc<dyn ChatTransport>,
        clipboard: Arc<dyn Clipboard>,
        weather: Arc<WeatherClient>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            focus: FocusPane::Chat,
            input_mode: InputMode::Editing,

            transcript: Vec::new(),
            message_input: String::new(),
            message_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            lookup_input: String::new(),
            lookup_cursor: 0,
            lookup: LookupState::default(),
            lookup_token: 0,
            copied_ticks: 0,

            animation_frame: 0,

            channel,
            clipboard,
            weather,
            events,
        }
    }

    // Chat actions

    /// Sends the typed message over the channel and echoes it locally.
    /// Whitespace-only input is left alone; everything else goes out exactly
    /// as typed, with the echo appended before the send so the transcript
    /// reflects what the user did even if the channel is down.
    pub fn send_chat_message(&mut self) {
        if self.message_input.trim().is_empty() {
            return;
        }
        let message = std::mem::take(&mut self.message_input);
        self.message_cursor = 0;
        self.push_transcript(LineKind::Local, message.clone());
        if let Err(err) = self.channel.send_message(OutgoingMessage { message }) {
            warn!("Failed to send chat message: {:#}", err);
        }
    }

    /// Applies one payload from the channel. An error wins over a message;
    /// a payload carrying neither renders nothing.
    pub fn receive_chat_payload(&mut self, payload: IncomingPayload) {
        if let Some(error) = payload.error {
            self.push_transcript(LineKind::Error, error);
        } else if let Some(message) = payload.message {
            self.push_transcript(LineKind::Bot, message);
        }
    }

    fn push_transcript(&mut self, kind: LineKind, content: String) {
        self.transcript.push(TranscriptLine { kind, content });
        self.scroll_chat_to_bottom();
    }

    // Lookup actions

    /// Starts a lookup for the typed query, superseding any outstanding one.
    /// Returns the query and its request token for the fetch task, or None
    /// when the input is only whitespace.
    pub fn begin_lookup(&mut self) -> Option<(String, u64)> {
        let query = self.lookup_input.trim().to_string();
        if query.is_empty() {
            return None;
        }
        self.lookup_token += 1;
        self.copied_ticks = 0;
        self.lookup = LookupState::Pending {
            query: query.clone(),
        };
        Some((query, self.lookup_token))
    }

    /// Applies a finished lookup. Results from superseded requests are
    /// dropped so a slow response cannot overwrite a newer one.
    pub fn apply_lookup(&mut self, token: u64, outcome: LookupOutcome) {
        if token != self.lookup_token {
            debug!("Dropping stale lookup result (token {})", token);
            return;
        }
        self.lookup = match outcome {
            LookupOutcome::Found {
                lat,
                lon,
                save_command,
            } => LookupState::Found {
                coords: format!("{}, {}", lat, lon),
                save_command,
            },
            LookupOutcome::NotFound => LookupState::NotFound,
            LookupOutcome::Failed => LookupState::Failed,
        };
    }

    /// The derived save command, present only when a lookup has succeeded.
    pub fn save_command(&self) -> Option<&str> {
        match &self.lookup {
            LookupState::Found { save_command, .. } => Some(save_command),
            _ => None,
        }
    }

    pub fn mark_copied(&mut self) {
        self.copied_ticks = COPIED_VISIBLE_TICKS;
    }

    pub fn copied_visible(&self) -> bool {
        self.copied_ticks > 0
    }

    /// Tick animation frame and the copied-indicator countdown
    /// (called by Tick event)
    pub fn tick(&mut self) {
        if matches!(self.lookup, LookupState::Pending { .. }) {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if self.copied_ticks > 0 {
            self.copied_ticks -= 1;
        }
    }

    // Transcript scrolling

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        let max = self
            .transcript_total_lines()
            .saturating_sub(self.chat_height as usize);
        if (self.chat_scroll as usize) < max {
            self.chat_scroll = self.chat_scroll.saturating_add(1);
        }
    }

    /// Scroll the transcript so the newest line is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let total_lines = self.transcript_total_lines();

        let visible_height = if self.chat_height > 0 {
            self.chat_height as usize
        } else {
            20
        };

        // ratatui scroll offsets are u16; very long transcripts clamp to it.
        let max = total_lines.saturating_sub(visible_height);
        self.chat_scroll = u16::try_from(max).unwrap_or(u16::MAX);
    }

    pub fn transcript_total_lines(&self) -> usize {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines = 0usize;
        for entry in &self.transcript {
            let prefix_len = entry.prefix().chars().count();
            let mut first = true;
            for line in entry.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let mut char_count = line.chars().count();
                if first {
                    char_count += prefix_len;
                    first = false;
                }
                total_lines += (char_count / wrap_width) + 1;
            }
            if first {
                total_lines += 1; // Prefix-only entry (empty content)
            }
            total_lines += 1; // Blank line after entry
        }
        total_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingTransport;
    use crate::clipboard::RecordingClipboard;
    use anyhow::anyhow;

    fn test_app() -> (App, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new();
        let weather = Arc::new(WeatherClient::new(
            "http://127.0.0.1:9".to_string(),
            "test-key".to_string(),
        ));
        let (tx, _rx) = mpsc::unbounded_channel();
        let app = App::new(transport.clone(), RecordingClipboard::new(), weather, tx);
        (app, transport)
    }

    fn found(lat: f64, lon: f64, save_command: &str) -> LookupOutcome {
        LookupOutcome::Found {
            lat,
            lon,
            save_command: save_command.to_string(),
        }
    }

    #[test]
    fn test_typed_message_is_echoed_and_sent() {
        let (mut app, transport) = test_app();
        app.message_input = "hello".to_string();
        app.message_cursor = 5;

        app.send_chat_message();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].kind, LineKind::Local);
        assert_eq!(app.transcript[0].content, "hello");
        assert_eq!(app.transcript[0].prefix(), "You: ");
        assert_eq!(app.message_input, "");
        assert_eq!(app.message_cursor, 0);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "hello");
    }

    #[test]
    fn test_whitespace_message_is_ignored() {
        let (mut app, transport) = test_app();
        app.message_input = "   ".to_string();

        app.send_chat_message();

        assert!(app.transcript.is_empty());
        assert!(transport.sent().is_empty());
        assert_eq!(app.message_input, "   ");
    }

    #[test]
    fn test_markup_in_messages_is_kept_verbatim() {
        let (mut app, transport) = test_app();
        app.message_input = "<b>hi</b>".to_string();

        app.send_chat_message();

        assert_eq!(app.transcript[0].content, "<b>hi</b>");
        assert_eq!(transport.sent()[0].message, "<b>hi</b>");
    }

    #[test]
    fn test_send_failure_still_echoes_locally() {
        struct FailingTransport;
        impl ChatTransport for FailingTransport {
            fn send_message(&self, _payload: OutgoingMessage) -> anyhow::Result<()> {
                Err(anyhow!("offline"))
            }
        }

        let weather = Arc::new(WeatherClient::new(
            "http://127.0.0.1:9".to_string(),
            "test-key".to_string(),
        ));
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Arc::new(FailingTransport), RecordingClipboard::new(), weather, tx);

        app.message_input = "hello".to_string();
        app.send_chat_message();

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].content, "hello");
        assert_eq!(app.message_input, "");
    }

    #[test]
    fn test_bot_message_payload_is_shown_with_prefix() {
        let (mut app, _) = test_app();
        app.receive_chat_payload(IncomingPayload::message("hi"));

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].kind, LineKind::Bot);
        assert_eq!(app.transcript[0].content, "hi");
        assert_eq!(app.transcript[0].prefix(), "TravelBot: ");
    }

    #[test]
    fn test_error_payload_wins_over_message() {
        let (mut app, _) = test_app();
        app.receive_chat_payload(IncomingPayload {
            error: Some("x".to_string()),
            message: Some("hi".to_string()),
        });

        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.transcript[0].kind, LineKind::Error);
        assert_eq!(app.transcript[0].content, "x");
        assert_eq!(app.transcript[0].prefix(), "Error: ");
    }

    #[test]
    fn test_empty_payload_renders_nothing() {
        let (mut app, _) = test_app();
        app.receive_chat_payload(IncomingPayload::default());
        assert!(app.transcript.is_empty());
    }

    #[test]
    fn test_lookup_success_shows_coords_and_save_command() {
        let (mut app, _) = test_app();
        app.lookup_input = "Paris".to_string();

        let (query, token) = app.begin_lookup().unwrap();
        assert_eq!(query, "Paris");
        assert!(matches!(app.lookup, LookupState::Pending { .. }));

        app.apply_lookup(token, found(48.85, 2.35, "save paris 48.85 2.35"));
        assert_eq!(
            app.lookup,
            LookupState::Found {
                coords: "48.85, 2.35".to_string(),
                save_command: "save paris 48.85 2.35".to_string(),
            }
        );
        assert_eq!(app.save_command(), Some("save paris 48.85 2.35"));
    }

    #[test]
    fn test_lookup_not_found_clears_save_command() {
        let (mut app, _) = test_app();
        app.lookup_input = "atlantis".to_string();
        let (_, token) = app.begin_lookup().unwrap();

        app.apply_lookup(token, LookupOutcome::NotFound);
        assert_eq!(app.lookup, LookupState::NotFound);
        assert_eq!(app.save_command(), None);
    }

    #[test]
    fn test_lookup_failure_clears_save_command() {
        let (mut app, _) = test_app();
        app.lookup_input = "paris".to_string();
        let (_, token) = app.begin_lookup().unwrap();

        app.apply_lookup(token, LookupOutcome::Failed);
        assert_eq!(app.lookup, LookupState::Failed);
        assert_eq!(app.save_command(), None);
    }

    #[test]
    fn test_stale_lookup_results_are_dropped() {
        let (mut app, _) = test_app();
        app.lookup_input = "paris".to_string();
        let (_, first_token) = app.begin_lookup().unwrap();

        app.lookup_input = "london".to_string();
        let (_, second_token) = app.begin_lookup().unwrap();

        // The slow first response arrives after the second request started.
        app.apply_lookup(first_token, found(48.85, 2.35, "save paris 48.85 2.35"));
        assert_eq!(
            app.lookup,
            LookupState::Pending {
                query: "london".to_string()
            }
        );

        app.apply_lookup(second_token, LookupOutcome::NotFound);
        assert_eq!(app.lookup, LookupState::NotFound);
    }

    #[test]
    fn test_blank_lookup_input_is_ignored() {
        let (mut app, _) = test_app();
        app.lookup_input = "   ".to_string();
        assert_eq!(app.begin_lookup(), None);
        assert_eq!(app.lookup, LookupState::Idle);
    }

    #[test]
    fn test_copied_indicator_counts_down_with_ticks() {
        let (mut app, _) = test_app();
        app.mark_copied();
        assert!(app.copied_visible());

        for _ in 0..COPIED_VISIBLE_TICKS {
            app.tick();
        }
        assert!(!app.copied_visible());
    }

    #[test]
    fn test_new_lookup_hides_copied_indicator() {
        let (mut app, _) = test_app();
        app.mark_copied();
        app.lookup_input = "paris".to_string();
        app.begin_lookup();
        assert!(!app.copied_visible());
    }

    #[test]
    fn test_transcript_growth_keeps_bottom_visible() {
        let (mut app, _) = test_app();
        app.chat_width = 10;
        app.chat_height = 3;

        for _ in 0..6 {
            app.message_input = "hi".to_string();
            app.send_chat_message();
        }

        // Six entries of one wrapped line plus a blank each is 12 lines;
        // with 3 visible the scroll lands on 9.
        assert_eq!(app.chat_scroll, 9);
    }

    #[test]
    fn test_line_count_survives_very_long_transcripts() {
        let (mut app, _) = test_app();
        app.chat_width = 80;
        app.chat_height = 10;
        for _ in 0..40_000 {
            app.transcript.push(TranscriptLine {
                kind: LineKind::Bot,
                content: "hi".to_string(),
            });
        }

        // 40k two-line entries overflow a u16 line counter.
        assert_eq!(app.transcript_total_lines(), 80_000);

        // The scroll offset pins at the largest value ratatui can take.
        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, u16::MAX);
        app.scroll_chat_down();
        assert_eq!(app.chat_scroll, u16::MAX);
    }
}
