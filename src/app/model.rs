//! Application model: the track list cursor and the last engine snapshot.
//!
//! Key handling lives here as a plain function of the model so it can be
//! tested without a terminal.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::audio::{EngineCmd, EngineState};
use crate::config::UiSettings;
use crate::library::{Track, TrackRegistry};

/// Reverb amount change per `[` / `]` key press.
pub const REVERB_STEP: u8 = 10;

/// What the event loop should do after a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Engine(EngineCmd),
    Quit,
}

/// The main application model.
pub struct App {
    pub registry: TrackRegistry,
    pub selected: usize,
    /// Cursor follows the playing track until the user moves it.
    pub follow_playback: bool,
    /// Latest state published by the engine.
    pub engine: EngineState,
}

impl App {
    pub fn new(registry: TrackRegistry) -> Self {
        Self {
            registry,
            selected: 0,
            follow_playback: true,
            engine: EngineState::default(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        self.registry.tracks()
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.registry.get(self.selected)
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.registry.get(self.engine.current_index)
    }

    /// Take in a fresh engine snapshot.
    pub fn sync(&mut self, engine: EngineState) {
        if self.follow_playback && self.registry.get(engine.current_index).is_some() {
            self.selected = engine.current_index;
        }
        self.engine = engine;
    }

    pub fn set_selected(&mut self, idx: usize) {
        if self.registry.get(idx).is_some() {
            self.selected = idx;
        }
    }

    /// Move the cursor down, wrapping at the end.
    pub fn next(&mut self) {
        self.follow_playback = false;
        self.selected = self.registry.next(self.selected);
    }

    /// Move the cursor up, wrapping at the start.
    pub fn prev(&mut self) {
        self.follow_playback = false;
        self.selected = self.registry.previous(self.selected);
    }

    /// Map a key press to an action, moving the cursor for navigation keys.
    pub fn handle_key(&mut self, key: KeyEvent, ui: &UiSettings) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Action::Quit),
                _ => None,
            };
        }

        let volume = self.engine.volume;
        let percent = self.engine.progress_percent;
        let seek_step = f64::from(ui.seek_step_percent);
        let reverb = self.engine.reverb_amount;

        let cmd = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => {
                self.next();
                return None;
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.prev();
                return None;
            }
            KeyCode::Enter => {
                self.follow_playback = true;
                EngineCmd::SelectTrack(self.selected)
            }
            KeyCode::Char(' ') | KeyCode::Char('p') => EngineCmd::TogglePlay,
            KeyCode::Char('h') => {
                self.follow_playback = true;
                EngineCmd::Previous
            }
            KeyCode::Char('l') => {
                self.follow_playback = true;
                EngineCmd::Next
            }
            KeyCode::Char('H') => EngineCmd::Seek((percent - seek_step).max(0.0)),
            KeyCode::Char('L') => EngineCmd::Seek((percent + seek_step).min(100.0)),
            KeyCode::Char('-') => EngineCmd::SetVolume(volume.saturating_sub(ui.volume_step)),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                EngineCmd::SetVolume(volume.saturating_add(ui.volume_step).min(100))
            }
            KeyCode::Char('m') => EngineCmd::ToggleMute,
            KeyCode::Char('r') => EngineCmd::ToggleReverb,
            KeyCode::Char('[') => EngineCmd::SetReverbAmount(reverb.saturating_sub(REVERB_STEP)),
            KeyCode::Char(']') => {
                EngineCmd::SetReverbAmount(reverb.saturating_add(REVERB_STEP).min(100))
            }
            _ => return None,
        };
        Some(Action::Engine(cmd))
    }
}
