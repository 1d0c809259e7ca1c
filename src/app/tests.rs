use super::*;
use crate::audio::{EngineCmd, EngineState};
use crate::config::UiSettings;
use crate::library::{Track, TrackRegistry};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

fn t(name: &str) -> Track {
    Track {
        index: 0,
        name: name.into(),
        src: format!("/chants/{name}.ogg"),
        description: String::new(),
        length: "3:00".into(),
        icon: "♪".into(),
    }
}

fn app(n: usize) -> App {
    let names = ["Kyrie", "Gloria", "Sanctus", "Agnus Dei"];
    let tracks = names.iter().take(n).map(|s| t(s)).collect();
    App::new(TrackRegistry::new(tracks).unwrap())
}

fn key(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
}

fn cmd(app: &mut App, k: KeyEvent) -> Option<EngineCmd> {
    match app.handle_key(k, &UiSettings::default()) {
        Some(Action::Engine(c)) => Some(c),
        _ => None,
    }
}

#[test]
fn cursor_moves_and_wraps() {
    let mut a = app(3);
    assert_eq!(a.handle_key(key('k'), &UiSettings::default()), None);
    assert_eq!(a.selected, 2);
    a.handle_key(key('j'), &UiSettings::default());
    assert_eq!(a.selected, 0);
    assert!(!a.follow_playback);
}

#[test]
fn enter_selects_the_cursor_track_and_follows() {
    let mut a = app(3);
    a.next();
    a.next();
    let c = cmd(&mut a, KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    assert_eq!(c, Some(EngineCmd::SelectTrack(2)));
    assert!(a.follow_playback);
}

#[test]
fn transport_keys_map_to_engine_commands() {
    let mut a = app(2);
    assert_eq!(cmd(&mut a, key(' ')), Some(EngineCmd::TogglePlay));
    assert_eq!(cmd(&mut a, key('p')), Some(EngineCmd::TogglePlay));
    assert_eq!(cmd(&mut a, key('h')), Some(EngineCmd::Previous));
    assert_eq!(cmd(&mut a, key('l')), Some(EngineCmd::Next));
    assert_eq!(cmd(&mut a, key('m')), Some(EngineCmd::ToggleMute));
    assert_eq!(cmd(&mut a, key('r')), Some(EngineCmd::ToggleReverb));
    assert_eq!(cmd(&mut a, key('x')), None);
}

#[test]
fn volume_keys_step_and_clamp() {
    let mut a = app(1);
    a.engine = EngineState {
        volume: 98,
        ..EngineState::default()
    };
    assert_eq!(cmd(&mut a, key('+')), Some(EngineCmd::SetVolume(100)));
    assert_eq!(cmd(&mut a, key('-')), Some(EngineCmd::SetVolume(93)));

    a.engine.volume = 3;
    assert_eq!(cmd(&mut a, key('-')), Some(EngineCmd::SetVolume(0)));
}

#[test]
fn seek_keys_are_relative_to_progress() {
    let mut a = app(1);
    a.engine.progress_percent = 2.0;
    assert_eq!(cmd(&mut a, key('H')), Some(EngineCmd::Seek(0.0)));
    assert_eq!(cmd(&mut a, key('L')), Some(EngineCmd::Seek(7.0)));

    a.engine.progress_percent = 99.0;
    assert_eq!(cmd(&mut a, key('L')), Some(EngineCmd::Seek(100.0)));
}

#[test]
fn reverb_amount_keys_step_by_ten() {
    let mut a = app(1);
    a.engine.reverb_amount = 95;
    assert_eq!(cmd(&mut a, key(']')), Some(EngineCmd::SetReverbAmount(100)));
    a.engine.reverb_amount = 5;
    assert_eq!(cmd(&mut a, key('[')), Some(EngineCmd::SetReverbAmount(0)));
}

#[test]
fn quit_keys() {
    let mut a = app(1);
    let ui = UiSettings::default();
    assert_eq!(a.handle_key(key('q'), &ui), Some(Action::Quit));
    assert_eq!(
        a.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), &ui),
        Some(Action::Quit)
    );
}

#[test]
fn sync_follows_playback_until_cursor_moves() {
    let mut a = app(4);
    a.sync(EngineState {
        current_index: 2,
        ..EngineState::default()
    });
    assert_eq!(a.selected, 2);
    assert_eq!(a.current_track().map(|t| t.name.as_str()), Some("Sanctus"));

    a.prev();
    a.sync(EngineState {
        current_index: 3,
        ..EngineState::default()
    });
    assert_eq!(a.selected, 1);
    assert_eq!(a.selected_track().map(|t| t.name.as_str()), Some("Gloria"));
}
