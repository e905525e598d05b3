use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::{App, FocusPane, InputMode, LineKind, LookupState};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);

    // Chat on the left, location lookup on the right
    let [chat_area, lookup_area] = Layout::horizontal([
        Constraint::Percentage(60),
        Constraint::Percentage(40),
    ])
    .areas(body_area);

    render_chat(app, frame, chat_area);
    render_lookup(app, frame, lookup_area);

    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" TravelBot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled("weather chat", Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.focus {
        FocusPane::Chat => " CHAT ",
        FocusPane::Lookup => " LOOKUP ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(
                if app.focus == FocusPane::Chat {
                    " send "
                } else {
                    " look up "
                },
                label_style,
            ),
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
        ],
        InputMode::Normal => {
            let mut hints = vec![
                Span::styled(" i ", key_style),
                Span::styled(" edit ", label_style),
                Span::styled(" Tab ", key_style),
                Span::styled(" focus ", label_style),
            ];
            if app.focus == FocusPane::Chat {
                hints.extend(vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" scroll ", label_style),
                ]);
            }
            if app.save_command().is_some() {
                hints.extend(vec![
                    Span::styled(" c ", key_style),
                    Span::styled(" copy ", label_style),
                ]);
            }
            hints.extend(vec![
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ]);
            hints
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    render_transcript(app, frame, transcript_area);
    render_input(
        frame,
        input_area,
        " Message (Enter to send) ",
        &app.message_input,
        app.message_cursor,
        app.focus == FocusPane::Chat,
        app.input_mode,
    );
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    // Store transcript dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    if app.transcript.is_empty() {
        let placeholder = Paragraph::new("Say hello, or ask about the weather...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for entry in &app.transcript {
        let prefix_style = match entry.kind {
            LineKind::Local => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            LineKind::Bot => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            LineKind::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        };

        // Message text goes in as plain spans, so markup in a message shows
        // up as characters instead of styling anything.
        let mut content_lines = entry.content.lines();
        match content_lines.next() {
            Some(first) => lines.push(Line::from(vec![
                Span::styled(entry.prefix(), prefix_style),
                Span::raw(first.to_string()),
            ])),
            None => lines.push(Line::from(Span::styled(entry.prefix(), prefix_style))),
        }
        for line in content_lines {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default()); // Blank line between entries
    }

    let total_lines = app.transcript_total_lines();

    let transcript = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(transcript, area);

    // Render scrollbar
    if total_lines > app.chat_height as usize {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state =
            ScrollbarState::new(total_lines).position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_lookup(app: &mut App, frame: &mut Frame, area: Rect) {
    let [input_area, panel_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(area);

    render_input(
        frame,
        input_area,
        " Location search (Enter to look up) ",
        &app.lookup_input,
        app.lookup_cursor,
        app.focus == FocusPane::Lookup,
        app.input_mode,
    );

    render_lookup_panel(app, frame, panel_area);
}

fn render_lookup_panel(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Lookup;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Coordinates ");

    let text = match &app.lookup {
        LookupState::Idle => Text::from(Span::styled(
            "Type a city name to find its coordinates.",
            Style::default().fg(Color::DarkGray),
        )),
        LookupState::Pending { query } => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            Text::from(Span::styled(
                format!("Searching for {}{}", query, dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            ))
        }
        LookupState::Found {
            coords,
            save_command,
        } => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("Coordinates: ", Style::default().fg(Color::Yellow).bold()),
                    Span::raw(coords.clone()),
                ]),
                Line::default(),
                Line::from(save_command.clone()),
                Line::from(Span::styled(
                    "Press c to copy this command for the chat.",
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            if app.copied_visible() {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    "Copied to clipboard!",
                    Style::default().fg(Color::Green).bold(),
                )));
            }
            Text::from(lines)
        }
        LookupState::NotFound => Text::from(Span::styled(
            "Location not found",
            Style::default().fg(Color::Red),
        )),
        LookupState::Failed => Text::from(Span::styled(
            "Error fetching location data.",
            Style::default().fg(Color::Red),
        )),
    };

    let panel = Paragraph::new(text).block(block).wrap(Wrap { trim: true });

    frame.render_widget(panel, area);
}

fn render_input(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    value: &str,
    cursor: usize,
    focused: bool,
    input_mode: InputMode,
) {
    let border_color = if focused && input_mode == InputMode::Editing {
        Color::Yellow
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor >= inner_width {
        cursor - inner_width + 1
    } else {
        0
    };

    // Get the visible slice of the input
    let visible_text: String = value.chars().skip(scroll_offset).take(inner_width).collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    // Show cursor when editing the focused input
    if focused && input_mode == InputMode::Editing {
        let cursor_x = (cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}
