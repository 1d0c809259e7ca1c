//! Playlist file loading.
//!
//! A playlist is a TOML file with one `[[tracks]]` table per track:
//!
//! ```toml
//! [[tracks]]
//! name = "Salve Regina"
//! src = "chant/salve-regina.ogg"
//! description = "Marian antiphon, solemn tone"
//! length = "3:05"
//! icon = "✠"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::model::Track;
use super::registry::TrackRegistry;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct PlaylistFile {
    #[serde(default)]
    tracks: Vec<Track>,
}

/// Read a playlist file and build the registry from it.
///
/// Relative `src` paths are resolved against the playlist's directory.
pub fn load_playlist(path: &Path) -> Result<TrackRegistry> {
    let text = fs::read_to_string(path).map_err(|source| Error::PlaylistRead {
        path: path.to_path_buf(),
        source,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let tracks = parse_playlist(&text, base).map_err(|source| Error::PlaylistParse {
        path: path.to_path_buf(),
        source,
    })?;
    TrackRegistry::new(tracks)
}

pub(super) fn parse_playlist(
    text: &str,
    base: &Path,
) -> std::result::Result<Vec<Track>, toml::de::Error> {
    let file: PlaylistFile = toml::from_str(text)?;
    Ok(file
        .tracks
        .into_iter()
        .map(|mut t| {
            t.src = resolve_src(&t.src, base);
            t
        })
        .collect())
}

fn resolve_src(src: &str, base: &Path) -> String {
    let src = src.trim();
    if src.contains("://") {
        return src.to_string();
    }
    let p = PathBuf::from(src);
    if p.is_absolute() {
        src.to_string()
    } else {
        base.join(p).to_string_lossy().into_owned()
    }
}
