use std::fs;
use tempfile::tempdir;

use playlist_upsync::playlist;

#[test]
fn directory_walk_finds_only_playlists() {
    let td = tempdir().unwrap();
    let root = td.path();
    fs::create_dir_all(root.join("sub").join("deeper")).unwrap();
    fs::write(root.join("Road.m3u"), "a.mp3\n").unwrap();
    fs::write(root.join("notes.txt"), "not a playlist\n").unwrap();
    fs::write(root.join("sub").join("Gym.M3U"), "b.mp3\n").unwrap();
    fs::write(root.join("sub").join("deeper").join("Chill.m3u"), "c.mp3\n").unwrap();
    fs::write(root.join("sub").join("cover.jpg"), "").unwrap();

    let found = playlist::discover_playlists(root, "m3u").unwrap();
    let mut names: Vec<&str> = found.iter().map(|s| s.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Chill", "Gym", "Road"]);
}

#[test]
fn single_file_input() {
    let td = tempdir().unwrap();
    let file = td.path().join("Road.m3u");
    fs::write(&file, "a.mp3\n").unwrap();
    let found = playlist::discover_playlists(&file, "m3u").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Road");
    assert_eq!(found[0].path, file);

    let other = td.path().join("Road.txt");
    fs::write(&other, "a.mp3\n").unwrap();
    assert!(playlist::discover_playlists(&other, "m3u").unwrap().is_empty());
}

#[test]
fn missing_input_is_an_error() {
    let td = tempdir().unwrap();
    assert!(playlist::discover_playlists(&td.path().join("nope"), "m3u").is_err());
}

#[test]
fn entries_keep_file_order_and_duplicates() {
    let td = tempdir().unwrap();
    let file = td.path().join("Road.m3u");
    let mut bytes = b"#EXTM3U\n#EXTINF:-1,First\nMusic\\First.mp3\r\n\nsecond.flac\n".to_vec();
    // invalid UTF-8 must not fail the read
    bytes.extend_from_slice(b"caf\xe9.mp3\n");
    bytes.extend_from_slice(b"Music/First.mp3\n");
    fs::write(&file, bytes).unwrap();

    let names: Vec<String> = playlist::read_entries(&file)
        .unwrap()
        .into_iter()
        .map(|e| e.display_name)
        .collect();
    assert_eq!(names.len(), 4);
    assert_eq!(names[0], "First");
    assert_eq!(names[1], "second");
    assert!(names[2].starts_with("caf"));
    assert_eq!(names[3], "First");
}
