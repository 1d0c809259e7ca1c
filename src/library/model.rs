use std::time::Duration;

use serde::Deserialize;

/// One playable chant, as authored in the playlist file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Track {
    /// Position in the registry. Assigned at load, not read from the file.
    #[serde(skip)]
    pub index: usize,
    pub name: String,
    /// Source URI: `http(s)://`, `file://` or a filesystem path.
    pub src: String,
    #[serde(default)]
    pub description: String,
    /// Nominal duration as a display string, e.g. `"3:05"`.
    #[serde(default)]
    pub length: String,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    "♪".to_string()
}

impl Track {
    /// Parse `length` (`M:SS` or `H:MM:SS`) into a duration.
    pub fn nominal_duration(&self) -> Option<Duration> {
        parse_length(&self.length)
    }
}

pub(crate) fn parse_length(s: &str) -> Option<Duration> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }

    let mut total: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        let v: u64 = part.parse().ok()?;
        // Every field but the leading one is a base-60 digit.
        if i > 0 && v >= 60 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(v)?;
    }
    Some(Duration::from_secs(total))
}
