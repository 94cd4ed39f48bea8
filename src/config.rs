use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Remote user owning the playlists. Looked up via the API when unset.
    #[serde(default)]
    pub user: Option<String>,
    /// Bearer token for the Spotify Web API. Falls back to SPOTIFY_ACCESS_TOKEN.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// SQLite file holding the per-playlist sync records.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Directory for the daily-rotated log file. Stdout only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Extension of local playlist files, with or without the leading dot.
    #[serde(default = "default_playlist_extension")]
    pub playlist_extension: String,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries_on_error: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_max_concurrent_playlists")]
    pub max_concurrent_playlists: usize,
}

fn default_api_base() -> String { "https://api.spotify.com/v1".into() }
fn default_playlist_extension() -> String { "m3u".into() }
fn default_max_batch_size() -> usize { crate::batch::MAX_BATCH_SIZE }
fn default_max_retries() -> u32 { 3 }
fn default_retry_base_delay_ms() -> u64 { 1000 }
fn default_max_concurrent_playlists() -> usize { 4 }

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playlist-upsync")
        .join("sync-state.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: None,
            access_token: None,
            api_base: default_api_base(),
            db_path: default_db_path(),
            log_dir: None,
            playlist_extension: default_playlist_extension(),
            max_batch_size: default_max_batch_size(),
            max_retries_on_error: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_concurrent_playlists: default_max_concurrent_playlists(),
        }
    }
}

impl Config {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Default config location: $UPSYNC_CONFIG, else `<config dir>/playlist-upsync/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("UPSYNC_CONFIG") {
            return Some(PathBuf::from(p));
        }
        dirs::config_dir().map(|d| d.join("playlist-upsync").join("config.toml"))
    }

    /// Load from the default location, or fall back to defaults when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        match Self::default_path() {
            Some(p) if p.exists() => Self::from_path(&p),
            _ => Ok(Self::default()),
        }
    }

    pub fn resolved_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("SPOTIFY_ACCESS_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}
