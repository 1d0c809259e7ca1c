use std::path::PathBuf;

use serde::Deserialize;

/// Longest procedural reverb tail accepted in `reverb.decay_secs`.
pub const MAX_DECAY_SECS: f32 = 10.0;
/// Longest silence accepted in `reverb.pre_delay_ms`.
pub const MAX_PRE_DELAY_MS: u64 = 1_000;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/vesper/config.toml` or `~/.config/vesper/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `VESPER__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub reverb: ReverbSettings,
    pub playback: PlaybackSettings,
    pub playlist: PlaylistSettings,
    pub logging: LoggingSettings,
    pub ui: UiSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Open the default output device on the first command.
    /// With `false` the engine runs silently (useful on headless machines).
    pub output: bool,
    /// Initial volume, 0..=100.
    pub volume: u8,
    /// How often the engine thread wakes up when no message arrives (milliseconds).
    pub poll_ms: u64,
    /// Timeout for fetching remote audio and impulse responses (milliseconds).
    pub fetch_timeout_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            output: true,
            volume: 80,
            poll_ms: 200,
            fetch_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReverbSettings {
    /// Whether the reverb starts enabled.
    pub enabled: bool,
    /// Wet amount, 0..=100. Mapped onto at most 70% of the signal.
    pub wet_amount: u8,
    /// Length of the procedural impulse (seconds).
    pub decay_secs: f32,
    /// Exponent of the procedural decay envelope.
    pub decay_curve: f32,
    /// Silence before the procedural impulse starts (milliseconds).
    pub pre_delay_ms: u64,
    /// Impulse response to fetch at startup (`http(s)://`, `file://` or a path).
    pub impulse_uri: Option<String>,
    /// Convolution block size in frames. Must be a power of two.
    pub block_size: usize,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            wet_amount: 30,
            decay_secs: 2.0,
            decay_curve: 3.0,
            pre_delay_ms: 0,
            impulse_uri: None,
            block_size: 512,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Start playing `start_index` right after launch.
    pub autoplay: bool,
    /// Track selected at startup.
    pub start_index: usize,
    /// Delay before skipping past a failed track (milliseconds).
    pub retry_delay_ms: u64,
    /// Progress sampling interval (milliseconds).
    pub progress_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            autoplay: false,
            start_index: 0,
            retry_delay_ms: 2_000,
            progress_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaylistSettings {
    /// Playlist file used when none is given on the command line.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log file. Defaults to `$XDG_STATE_HOME/vesper/vesper.log`.
    pub file: Option<PathBuf>,
    /// `tracing_subscriber::EnvFilter` directive, overridden by `VESPER_LOG`.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: None,
            filter: "vesper=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// The text rendered inside the top header box.
    pub header_text: String,
    /// Volume change per `-` / `+` key press.
    pub volume_step: u8,
    /// Seek distance per `H` / `L` key press, in percent of the track.
    pub seek_step_percent: u8,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            header_text: " ~ Vesper: chant for the quiet hours ~ ".to_string(),
            volume_step: 5,
            seek_step_percent: 5,
        }
    }
}
