//! Audio-related small types and handles.
//!
//! This module defines the engine status, the command and event enums
//! carried by the engine channel, and the observable state shared with the UI.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PlaybackError;

use super::impulse::ImpulseResponse;
use super::loader::LoadedStream;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Status {
    /// Nothing loaded yet (or the engine was disposed).
    #[default]
    Idle,
    /// A track is being fetched and probed.
    Loading,
    Playing,
    Paused,
    /// The current track failed; an advance is scheduled.
    Erroring,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Loading => "Loading",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Erroring => "Error",
        }
    }
}

/// Commands issued by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCmd {
    Play,
    Pause,
    /// Play when paused/idle, pause when playing.
    TogglePlay,
    /// Seek to a percentage (0..=100) of the current track.
    Seek(f64),
    /// Set the volume, 0..=100.
    SetVolume(u8),
    ToggleMute,
    Next,
    Previous,
    /// Load and play the track at the given registry index.
    SelectTrack(usize),
    ToggleReverb,
    /// Set the reverb wet amount, 0..=100.
    SetReverbAmount(u8),
    /// Dispose the engine and stop the thread.
    Quit,
}

/// Completion callbacks posted back by loader threads.
#[derive(Debug)]
pub enum EngineEvent {
    /// The stream for `generation` is fetched and probed.
    StreamReady {
        index: usize,
        generation: u64,
        stream: LoadedStream,
    },
    /// The stream for `generation` failed.
    StreamFailed {
        index: usize,
        generation: u64,
        error: PlaybackError,
    },
    /// Result of fetching the configured impulse response.
    ImpulseLoaded(Result<ImpulseResponse, PlaybackError>),
}

/// Everything that flows into the engine thread.
#[derive(Debug)]
pub enum EngineMsg {
    Command(EngineCmd),
    Event(EngineEvent),
}

/// Observable engine state, shared with the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub status: Status,
    pub current_index: usize,
    /// Progress of the current track, always within 0..=100.
    pub progress_percent: f64,
    /// Elapsed time formatted as `M:SS`.
    pub elapsed_display: String,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
    pub volume: u8,
    pub muted: bool,
    pub reverb_enabled: bool,
    pub reverb_amount: u8,
    pub last_error: Option<PlaybackError>,
    /// Whether the output device has been opened by a first command.
    pub output_unlocked: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            current_index: 0,
            progress_percent: 0.0,
            elapsed_display: "0:00".to_string(),
            elapsed: Duration::ZERO,
            duration: None,
            volume: 100,
            muted: false,
            reverb_enabled: false,
            reverb_amount: 0,
            last_error: None,
            output_unlocked: false,
        }
    }
}

pub type StateHandle = Arc<Mutex<EngineState>>;
