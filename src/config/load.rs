use std::{env, path::PathBuf};

use super::schema::{MAX_DECAY_SECS, MAX_PRE_DELAY_MS, Settings};

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `VESPER__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("VESPER")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.audio.volume > 100 {
            return Err("audio.volume must be within 0..=100".to_string());
        }
        if self.audio.poll_ms == 0 {
            return Err("audio.poll_ms must be >= 1".to_string());
        }
        if self.reverb.wet_amount > 100 {
            return Err("reverb.wet_amount must be within 0..=100".to_string());
        }
        if !(self.reverb.decay_secs > 0.0 && self.reverb.decay_secs <= MAX_DECAY_SECS) {
            return Err(format!(
                "reverb.decay_secs must be within (0, {MAX_DECAY_SECS}]"
            ));
        }
        if self.reverb.pre_delay_ms > MAX_PRE_DELAY_MS {
            return Err(format!(
                "reverb.pre_delay_ms must be within 0..={MAX_PRE_DELAY_MS}"
            ));
        }
        if !(self.reverb.decay_curve > 0.0 && self.reverb.decay_curve.is_finite()) {
            return Err("reverb.decay_curve must be a positive number".to_string());
        }
        if self.reverb.block_size < 16 || !self.reverb.block_size.is_power_of_two() {
            return Err("reverb.block_size must be a power of two >= 16".to_string());
        }
        if self.playback.progress_interval_ms == 0 {
            return Err("playback.progress_interval_ms must be >= 1".to_string());
        }
        if self.ui.volume_step == 0 || self.ui.volume_step > 100 {
            return Err("ui.volume_step must be within 1..=100".to_string());
        }
        if self.ui.seek_step_percent == 0 || self.ui.seek_step_percent > 100 {
            return Err("ui.seek_step_percent must be within 1..=100".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `VESPER_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("VESPER_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/vesper/config.toml`
/// or `~/.config/vesper/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("vesper").join("config.toml"))
}

/// Compute the default log file under `$XDG_STATE_HOME/vesper/vesper.log`
/// or `~/.local/state/vesper/vesper.log`.
pub fn default_log_path() -> Option<PathBuf> {
    let state_home = if let Some(xdg) = env::var_os("XDG_STATE_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
    };

    state_home.map(|d| d.join("vesper").join("vesper.log"))
}
