use super::model::parse_length;
use super::playlist::parse_playlist;
use super::*;
use crate::error::Error;
use std::path::Path;
use std::time::Duration;

fn t(name: &str) -> Track {
    Track {
        index: 0,
        name: name.into(),
        src: format!("/music/{name}.ogg"),
        description: String::new(),
        length: "1:00".into(),
        icon: "♪".into(),
    }
}

#[test]
fn registry_assigns_indices_in_order() {
    let reg = TrackRegistry::new(vec![t("a"), t("b"), t("c")]).unwrap();
    assert_eq!(reg.count(), 3);
    assert_eq!(reg.get(2).map(|t| t.index), Some(2));
    assert_eq!(reg.get(1).map(|t| t.name.as_str()), Some("b"));
    assert!(reg.get(3).is_none());
}

#[test]
fn registry_next_and_previous_wrap_around() {
    let reg = TrackRegistry::new(vec![t("a"), t("b"), t("c")]).unwrap();
    assert_eq!(reg.next(0), 1);
    assert_eq!(reg.next(2), 0);
    assert_eq!(reg.previous(0), 2);
    assert_eq!(reg.previous(1), 0);
}

#[test]
fn registry_with_single_track_wraps_onto_itself() {
    let reg = TrackRegistry::new(vec![t("only")]).unwrap();
    assert_eq!(reg.next(0), 0);
    assert_eq!(reg.previous(0), 0);
}

#[test]
fn registry_rejects_empty_playlist() {
    assert!(matches!(
        TrackRegistry::new(Vec::new()),
        Err(Error::EmptyPlaylist)
    ));
}

#[test]
fn parse_length_accepts_minutes_and_hours() {
    assert_eq!(parse_length("3:05"), Some(Duration::from_secs(185)));
    assert_eq!(parse_length(" 0:59 "), Some(Duration::from_secs(59)));
    assert_eq!(parse_length("1:02:03"), Some(Duration::from_secs(3723)));
    assert_eq!(parse_length("12:00"), Some(Duration::from_secs(720)));
}

#[test]
fn parse_length_rejects_garbage() {
    assert_eq!(parse_length(""), None);
    assert_eq!(parse_length("305"), None);
    assert_eq!(parse_length("3:75"), None);
    assert_eq!(parse_length("a:bc"), None);
    assert_eq!(parse_length("1:2:3:4"), None);
}

#[test]
fn parse_length_rejects_overflowing_fields() {
    assert_eq!(parse_length("18446744073709551615:00"), None);
    assert_eq!(parse_length("307445734561825860:59"), None);
    assert_eq!(parse_length("5124095576030432:00:00"), None);
}

#[test]
fn parse_playlist_resolves_relative_sources_and_defaults() {
    let text = r#"
[[tracks]]
name = "Salve Regina"
src = "chant/salve.ogg"
description = "Marian antiphon"
length = "3:05"
icon = "✠"

[[tracks]]
name = "Ave Maris Stella"
src = "https://example.org/ave.mp3"

[[tracks]]
name = "Te Deum"
src = "/srv/chant/te-deum.flac"
"#;
    let tracks = parse_playlist(text, Path::new("/home/monk/playlists")).unwrap();
    assert_eq!(tracks.len(), 3);

    assert_eq!(tracks[0].src, "/home/monk/playlists/chant/salve.ogg");
    assert_eq!(tracks[0].icon, "✠");
    assert_eq!(tracks[0].nominal_duration(), Some(Duration::from_secs(185)));

    assert_eq!(tracks[1].src, "https://example.org/ave.mp3");
    assert_eq!(tracks[1].icon, "♪");
    assert_eq!(tracks[1].description, "");
    assert_eq!(tracks[1].nominal_duration(), None);

    assert_eq!(tracks[2].src, "/srv/chant/te-deum.flac");
}

#[test]
fn load_playlist_reads_file_and_reports_errors() {
    let dir = tempfile::tempdir().unwrap();

    let good = dir.path().join("good.toml");
    std::fs::write(
        &good,
        "[[tracks]]\nname = \"Kyrie\"\nsrc = \"kyrie.ogg\"\nlength = \"2:10\"\n",
    )
    .unwrap();
    let reg = load_playlist(&good).unwrap();
    assert_eq!(reg.count(), 1);
    assert_eq!(
        reg.get(0).unwrap().src,
        dir.path().join("kyrie.ogg").to_string_lossy()
    );

    let empty = dir.path().join("empty.toml");
    std::fs::write(&empty, "").unwrap();
    assert!(matches!(load_playlist(&empty), Err(Error::EmptyPlaylist)));

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "[[tracks]]\nname = 3\n").unwrap();
    assert!(matches!(
        load_playlist(&broken),
        Err(Error::PlaylistParse { .. })
    ));

    assert!(matches!(
        load_playlist(&dir.path().join("missing.toml")),
        Err(Error::PlaylistRead { .. })
    ));
}
