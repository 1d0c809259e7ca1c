use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::warn;

use crate::app::{Action, App};
use crate::audio::AudioPlayer;
use crate::config;
use crate::ui;

/// Main terminal event loop: pulls engine state, draws, handles keys.
/// Returns `Ok(())` when the user quits.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    audio_player: &AudioPlayer,
) -> std::io::Result<()> {
    loop {
        app.sync(audio_player.snapshot());
        terminal.draw(|f| ui::draw(f, app, &settings.ui))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key, &settings.ui) {
            Some(Action::Quit) => {
                audio_player.shutdown();
                return Ok(());
            }
            Some(Action::Engine(cmd)) => {
                if audio_player.send(cmd).is_err() {
                    warn!("engine is gone, quitting");
                    return Ok(());
                }
            }
            None => {}
        }
    }
}
