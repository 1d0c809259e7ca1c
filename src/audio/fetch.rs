//! Fetch raw bytes for a track or impulse response.
//!
//! `http://` and `https://` go through a blocking `reqwest` client; `file://`
//! URIs and plain paths are read from disk.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{ErrorKind, PlaybackError};

pub(crate) fn fetch_bytes(uri: &str, timeout: Duration) -> Result<Arc<[u8]>, PlaybackError> {
    let uri = uri.trim();
    if uri.is_empty() {
        return Err(PlaybackError::new(ErrorKind::NetworkFailure, "empty source URI"));
    }

    if is_remote(uri) {
        debug!(uri, "fetching remote source");
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlaybackError::from_http(&e))?;
        let resp = client
            .get(uri)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| PlaybackError::from_http(&e))?;
        let body = resp.bytes().map_err(|e| PlaybackError::from_http(&e))?;
        return Ok(Arc::from(body.as_ref()));
    }

    let path = uri.strip_prefix("file://").unwrap_or(uri);
    debug!(path, "reading local source");
    let bytes = fs::read(path).map_err(|e| PlaybackError::from_io(&e))?;
    Ok(bytes.into())
}

fn is_remote(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_remote_matches_http_schemes_only() {
        assert!(is_remote("http://example.org/a.ogg"));
        assert!(is_remote("HTTPS://example.org/a.ogg"));
        assert!(!is_remote("file:///tmp/a.ogg"));
        assert!(!is_remote("/tmp/a.ogg"));
    }

    #[test]
    fn fetch_bytes_reads_local_paths_and_file_uris() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ir.bin");
        std::fs::write(&p, [1u8, 2, 3]).unwrap();

        let bytes = fetch_bytes(p.to_str().unwrap(), Duration::from_secs(1)).unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);

        let uri = format!("file://{}", p.display());
        let bytes = fetch_bytes(&uri, Duration::from_secs(1)).unwrap();
        assert_eq!(bytes.len(), 3);
    }

    #[test]
    fn missing_file_is_a_network_failure() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nope.ogg");
        let err = fetch_bytes(p.to_str().unwrap(), Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkFailure);
    }

    #[test]
    fn empty_uri_is_rejected() {
        let err = fetch_bytes("   ", Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkFailure);
    }
}
