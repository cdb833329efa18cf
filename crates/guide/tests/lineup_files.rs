use std::fs;
use std::path::Path;

use guide::{GuideError, Lineup, VideoLibrary, ViewState};
use tempfile::TempDir;

const LINEUP: &str = r#"
[[channel]]
id = 10
number = "61"
network = "WQHS"
video = "/videos/late night.mkv"
schedule = [
    { time = "11:00 PM", show = "Late Movie", duration = 60 },
    { time = "11:30 PM", show = "Overlaps", duration = 30 },
]
"#;

#[test]
fn loads_lineup_file_and_resolves_video() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("lineup.toml");
    fs::write(&path, LINEUP.replace("11:30 PM", "12:00 AM").replace("11:00 PM", "10:00 PM")).unwrap();
    // 10:00 PM + 60 = 11:00 PM, and 12:00 AM sorts as minute 0: an overlap.
    assert!(matches!(Lineup::load(&path), Err(GuideError::Invalid(_))));

    fs::write(&path, LINEUP.replace("11:30 PM", "12:00 PM").replace("11:00 PM", "10:00 AM")).unwrap();
    let lineup = Lineup::load(&path).unwrap();

    let mut view = ViewState::default();
    let channel = view.select_number(&lineup, "61").unwrap();
    assert_eq!(
        channel.video_path(Path::new("/srv/tv")),
        Path::new("/srv/tv/videos/late night.mkv")
    );
}

#[test]
fn overlapping_programs_are_rejected() {
    let err = Lineup::from_toml_str(LINEUP).unwrap_err();
    assert!(err.to_string().contains("Overlaps"));
}

#[test]
fn missing_lineup_file_reports_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nope.toml");
    match Lineup::load(&path) {
        Err(GuideError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected an io error, got {other:?}"),
    }
}

#[test]
fn unknown_keys_are_a_parse_error() {
    let err = Lineup::from_toml_str("[[channel]]\nid = 1\ncolour = \"red\"\n").unwrap_err();
    assert!(matches!(err, GuideError::Parse(_)));
}

#[test]
fn video_scan_filters_and_sorts() {
    let dir = TempDir::new().unwrap();
    for name in ["b.mkv", "a.mp4", "C.AVI", "readme.txt", "cover.jpg"] {
        fs::write(dir.path().join(name), b"").unwrap();
    }
    fs::create_dir(dir.path().join("nested.mp4")).unwrap();

    let library = VideoLibrary::scan(dir.path()).unwrap();
    let names: Vec<&str> = library.file_names().collect();
    assert_eq!(names, ["C.AVI", "a.mp4", "b.mkv"]);
    assert_eq!(library.path_of("a.mp4"), Some(dir.path().join("a.mp4")));
    assert_eq!(library.path_of("readme.txt"), None);
}

#[test]
fn empty_video_directory_scans_to_nothing() {
    let dir = TempDir::new().unwrap();
    let library = VideoLibrary::scan(dir.path()).unwrap();
    assert!(library.is_empty());
    assert_eq!(library.root(), dir.path());
}

#[test]
fn video_scan_reads_sizes_and_sidecars() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("news.mp4"), vec![0u8; 2048]).unwrap();
    fs::write(
        dir.path().join("news.json"),
        r#"{ "title": "Evening News", "channel_number": 3, "station_callsign": "WKYC", "start_time": "6:00 PM" }"#,
    )
    .unwrap();
    fs::write(dir.path().join("early.mkv"), b"abc").unwrap();
    fs::write(
        dir.path().join("early.json"),
        r#"{ "title": "Morning Show", "channel_number": 3, "start_time": "06:00 AM" }"#,
    )
    .unwrap();
    fs::write(dir.path().join("broken.avi"), b"").unwrap();
    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    fs::write(dir.path().join("bare.mp4"), b"").unwrap();

    let library = VideoLibrary::scan(dir.path()).unwrap();
    assert_eq!(library.entries().len(), 4);
    assert_eq!(library.total_size(), 2051);

    let news = &library.entries()[3];
    assert_eq!(news.file, "news.mp4");
    assert_eq!(news.size_bytes, 2048);
    assert_eq!(news.metadata.as_ref().unwrap().station_callsign, "WKYC");

    let channels = library.by_channel();
    assert_eq!(channels.keys().copied().collect::<Vec<_>>(), [3]);
    let titles: Vec<&str> = channels[&3]
        .iter()
        .map(|entry| entry.metadata.as_ref().unwrap().title.as_str())
        .collect();
    assert_eq!(titles, ["Morning Show", "Evening News"]);

    let unlisted: Vec<&str> = library.unlisted().map(|entry| entry.file.as_str()).collect();
    assert_eq!(unlisted, ["bare.mp4", "broken.avi"]);
}

#[test]
fn clearing_removes_only_videos() {
    let dir = TempDir::new().unwrap();
    for name in ["a.mp4", "b.MKV", "a.json", "notes.txt"] {
        fs::write(dir.path().join(name), b"x").unwrap();
    }
    fs::create_dir(dir.path().join("nested.avi")).unwrap();

    assert_eq!(VideoLibrary::clear(dir.path()).unwrap(), 2);
    assert!(VideoLibrary::scan(dir.path()).unwrap().is_empty());
    assert!(dir.path().join("a.json").exists());
    assert!(dir.path().join("notes.txt").exists());
    assert!(dir.path().join("nested.avi").is_dir());
    assert_eq!(VideoLibrary::clear(dir.path()).unwrap(), 0);
}
