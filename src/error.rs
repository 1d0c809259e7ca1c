//! Error types for vesper.
//!
//! `PlaybackError` is the track-level failure the engine recovers from by
//! skipping ahead. `Error` covers startup paths (config, playlist, terminal)
//! and is propagated with `?`.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure classes surfaced to the listener.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The load was cancelled before it completed.
    Aborted,
    /// Transport-level failure: HTTP, missing file, I/O.
    NetworkFailure,
    /// The data is malformed or empty.
    DecodeFailure,
    /// The container or codec is not supported.
    FormatUnsupported,
    /// Anything unclassified.
    Unknown,
}

impl ErrorKind {
    /// Short user-facing message for the notification line.
    pub fn message(self) -> &'static str {
        match self {
            Self::Aborted => "Playback aborted",
            Self::NetworkFailure => "Network error while loading the track",
            Self::DecodeFailure => "The track could not be decoded",
            Self::FormatUnsupported => "Audio format not supported",
            Self::Unknown => "Unknown playback error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A classified track-level failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct PlaybackError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl PlaybackError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn aborted() -> Self {
        Self::new(ErrorKind::Aborted, "load cancelled")
    }

    /// Classify an I/O failure while reading a source.
    pub fn from_io(err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::Interrupted => ErrorKind::Aborted,
            io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => ErrorKind::DecodeFailure,
            io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut => ErrorKind::NetworkFailure,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, err.to_string())
    }

    /// Classify a decoder failure.
    pub fn from_decoder(err: &rodio::decoder::DecoderError) -> Self {
        let kind = match err {
            rodio::decoder::DecoderError::UnrecognizedFormat => ErrorKind::FormatUnsupported,
            _ => ErrorKind::DecodeFailure,
        };
        Self::new(kind, err.to_string())
    }

    /// Classify an HTTP client failure.
    pub fn from_http(err: &reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            ErrorKind::DecodeFailure
        } else if err.is_timeout()
            || err.is_connect()
            || err.is_request()
            || err.is_status()
            || err.is_body()
        {
            ErrorKind::NetworkFailure
        } else {
            ErrorKind::Unknown
        };
        Self::new(kind, err.to_string())
    }
}

/// Application-level error for startup and terminal handling.
#[derive(Error, Debug)]
pub enum Error {
    /// No playlist was given on the command line or in the config.
    #[error("no playlist given: pass a playlist file or set playlist.path in the config")]
    NoPlaylist,

    /// The playlist file could not be read.
    #[error("failed to read playlist {}: {source}", .path.display())]
    PlaylistRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The playlist file is not valid TOML or does not match the track schema.
    #[error("invalid playlist {}: {source}", .path.display())]
    PlaylistParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The playlist contains no tracks.
    #[error("playlist has no tracks")]
    EmptyPlaylist,

    /// Terminal or other I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience Result type using vesper's `Error`.
pub type Result<T> = std::result::Result<T, Error>;
