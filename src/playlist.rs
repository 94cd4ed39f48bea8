use crate::models::LocalEntry;
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// A local playlist file found under the input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSource {
    /// Remote playlist name: the file stem.
    pub name: String,
    pub path: PathBuf,
}

/// Return true if the path's extension equals `ext` ("m3u" or ".m3u"), case-insensitive.
pub fn has_playlist_extension(path: &Path, ext: &str) -> bool {
    let want = ext.trim().trim_start_matches('.');
    match path.extension().and_then(|e| e.to_str()) {
        Some(e) => !want.is_empty() && e.eq_ignore_ascii_case(want),
        None => false,
    }
}

/// Find playlist files. `input` may be a single file or a directory walked recursively.
/// Files with another extension are ignored. Results follow walk order (sorted by file name).
pub fn discover_playlists(input: &Path, ext: &str) -> anyhow::Result<Vec<PlaylistSource>> {
    let meta = std::fs::metadata(input).with_context(|| format!("reading {}", input.display()))?;

    let paths: Vec<PathBuf> = if meta.is_dir() {
        WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    } else {
        vec![input.to_path_buf()]
    };

    Ok(paths
        .into_iter()
        .filter(|p| has_playlist_extension(p, ext))
        .filter_map(|p| {
            let name = p.file_stem()?.to_str()?.to_string();
            Some(PlaylistSource { name, path: p })
        })
        .collect())
}

/// Reduce one playlist line to a search name: backslashes become slashes and
/// the file stem of the last component is kept. Blank lines and `#` directives yield None.
pub fn entry_from_line(line: &str) -> Option<LocalEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let normalized = line.replace('\\', "/");
    let last = normalized.rsplit('/').next().unwrap_or("");
    let stem = match last.rsplit_once('.') {
        Some((base, _ext)) if !base.is_empty() => base,
        _ => last,
    };
    let stem = stem.trim();
    if stem.is_empty() {
        return None;
    }
    Some(LocalEntry { display_name: stem.to_string() })
}

/// Parse a playlist file into entries, in file order. Invalid UTF-8 is replaced, not fatal.
pub fn read_entries(path: &Path) -> anyhow::Result<Vec<LocalEntry>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading playlist {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.lines().filter_map(entry_from_line).collect())
}

/// Modification time in ms since the epoch.
pub fn modified_ms(path: &Path) -> anyhow::Result<i64> {
    let modified: SystemTime = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading modification time of {}", path.display()))?;
    Ok(chrono::DateTime::<chrono::Utc>::from(modified).timestamp_millis())
}
