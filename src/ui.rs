//! UI rendering helpers for the terminal user interface.
//!
//! This module renders the `App` model with `ratatui`. It only reads state;
//! every change goes through the engine.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Modifier, Style, Stylize},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
};

use crate::app::App;
use crate::audio::{EngineState, Status, format_elapsed};
use crate::config::UiSettings;

const CONTROLS: &[(&str, &str)] = &[
    ("j/k", "up/down"),
    ("enter", "play selected"),
    ("space/p", "play/pause"),
    ("h/l", "prev/next chant"),
    ("-/+", "volume"),
    ("m", "mute"),
    ("r", "reverb"),
    ("[/]", "reverb amount"),
    ("q", "quit"),
];

/// Render the controls help text, incorporating the seek step.
fn controls_text(seek_step_percent: u8) -> String {
    CONTROLS
        .iter()
        .map(|(k, v)| format!("[{k}] {v}"))
        .chain(std::iter::once(format!(
            "[H/L] seek -/+{seek_step_percent}%"
        )))
        .collect::<Vec<String>>()
        .join(" | ")
}

fn status_lines(app: &App) -> Vec<String> {
    let s = &app.engine;
    let track = app
        .current_track()
        .map(|t| format!("{} {}", t.icon, t.name))
        .unwrap_or_else(|| "-".to_string());

    let volume = if s.muted {
        format!("Volume: {}% (muted)", s.volume)
    } else {
        format!("Volume: {}%", s.volume)
    };
    let reverb = if s.reverb_enabled {
        format!("Reverb: on, {}% wet", s.reverb_amount)
    } else {
        "Reverb: off".to_string()
    };

    let mut lines = vec![
        format!("{} • {}", s.status.label(), track),
        format!("{volume} • {reverb}"),
    ];
    if let Some(err) = &s.last_error {
        let note = if s.status == Status::Erroring {
            " (skipping ahead)"
        } else {
            ""
        };
        lines.push(format!("{}{note}", err.kind.message()));
    } else if !s.output_unlocked {
        lines.push("Press any key to start the audio output".to_string());
    }
    lines
}

fn progress_label(s: &EngineState) -> String {
    match s.duration {
        Some(d) => format!("{} / {}", s.elapsed_display, format_elapsed(d)),
        None => s.elapsed_display.clone(),
    }
}

/// Render the entire UI into the provided `frame`.
pub fn draw(frame: &mut Frame, app: &App, ui_settings: &UiSettings) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" vesper ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let status_par = Paragraph::new(status_lines(app).join("\n"))
        .block(
            Block::bordered()
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" status "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status_par, chunks[1]);

    let ratio = (app.engine.progress_percent / 100.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(Block::bordered().title(" progress "))
        .gauge_style(Style::default().add_modifier(Modifier::BOLD))
        .ratio(ratio)
        .label(progress_label(&app.engine));
    frame.render_widget(gauge, chunks[2]);

    // Track list
    {
        let playing = app.engine.current_index;
        let items: Vec<ListItem> = app
            .tracks()
            .iter()
            .map(|t| {
                let marker = if t.index == playing && app.engine.status != Status::Idle {
                    "▶"
                } else {
                    " "
                };
                ListItem::new(format!("{marker} {} {}  {}", t.icon, t.name, t.length))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(" chants "))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        state.select(Some(app.selected));
        frame.render_stateful_widget(list, chunks[3], &mut state);
    }

    let description = app
        .selected_track()
        .map(|t| t.description.as_str())
        .unwrap_or_default();
    let desc_par = Paragraph::new(description)
        .italic()
        .block(
            Block::bordered()
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" about "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(desc_par, chunks[4]);

    let footer = Paragraph::new(controls_text(ui_settings.seek_step_percent))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[5]);
}
