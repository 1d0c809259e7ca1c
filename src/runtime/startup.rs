use std::env;
use std::path::PathBuf;

use tracing::info;

use crate::app::App;
use crate::config;
use crate::error::{Error, Result};

/// Playlist path: first CLI argument, else `playlist.path` from the config.
pub fn playlist_path(settings: &config::Settings) -> Result<PathBuf> {
    env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| settings.playlist.path.clone())
        .ok_or(Error::NoPlaylist)
}

/// Put the cursor on the start track. Autoplay itself is queued by the
/// engine, which keeps the output locked until the first key press.
pub fn apply_playback_defaults(app: &mut App, settings: &config::Settings) {
    let start = settings.playback.start_index;
    app.set_selected(start);
    if settings.playback.autoplay {
        info!(start = app.selected, "autoplay queued");
    }
}
