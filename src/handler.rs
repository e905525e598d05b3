use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::warn;

use crate::app::{App, FocusPane, InputMode};
use crate::lookup::LookupOutcome;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Channel(payload) => app.receive_chat_payload(payload),
        AppEvent::Lookup { token, outcome } => app.apply_lookup(token, outcome),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Pane focus
        KeyCode::Tab => toggle_focus(app),

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => {
            if app.focus == FocusPane::Chat {
                app.scroll_chat_down();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.focus == FocusPane::Chat {
                app.scroll_chat_up();
            }
        }

        // Copy the save command (present once a lookup has found something)
        KeyCode::Char('c') => copy_save_command(app),

        // Edit the focused input
        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => toggle_focus(app),
        KeyCode::Enter => match app.focus {
            FocusPane::Chat => app.send_chat_message(),
            FocusPane::Lookup => start_lookup(app),
        },
        _ => edit_focused_input(app, key),
    }
}

fn toggle_focus(app: &mut App) {
    app.focus = match app.focus {
        FocusPane::Chat => FocusPane::Lookup,
        FocusPane::Lookup => FocusPane::Chat,
    };
}

fn copy_save_command(app: &mut App) {
    let Some(command) = app.save_command().map(str::to_string) else {
        return;
    };
    match app.clipboard.copy(&command) {
        Ok(()) => app.mark_copied(),
        // Copy failures stay out of the transcript; they are only logged.
        Err(err) => warn!("Clipboard copy failed: {:#}", err),
    }
}

fn start_lookup(app: &mut App) {
    let Some((query, token)) = app.begin_lookup() else {
        return;
    };

    // Fetch in the background; the result re-enters the event loop tagged
    // with its token so superseded lookups can be dropped.
    let client = app.weather.clone();
    let events = app.events.clone();
    tokio::spawn(async move {
        let outcome = match client.lookup(&query).await {
            Ok(response) => LookupOutcome::from_response(&query, &response),
            Err(err) => {
                warn!("Location lookup for {} failed: {:#}", query, err);
                LookupOutcome::Failed
            }
        };
        let _ = events.send(AppEvent::Lookup { token, outcome });
    });
}

fn edit_focused_input(app: &mut App, key: KeyEvent) {
    let (input, cursor) = match app.focus {
        FocusPane::Chat => (&mut app.message_input, &mut app.message_cursor),
        FocusPane::Lookup => (&mut app.lookup_input, &mut app.lookup_cursor),
    };

    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = input.chars().count();
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(input, *cursor);
                input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = input.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            *cursor = 0;
        }
        KeyCode::End => {
            *cursor = input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}
