use crate::api::{spotify::SpotifyProvider, Provider, TrackResolver};
use crate::batch;
use crate::config::Config;
use crate::db::{self, SyncState};
use crate::error::SyncError;
use crate::models::{LocalEntry, MutationPlan, PlaylistOutcome, RemotePlaylists, SyncReport, TrackId};
use crate::playlist::{self, PlaylistSource};
use crate::reconcile::reconcile_around_unavailable;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;

/// Bounded exponential backoff for transient remote failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Server-provided Retry-After wins; otherwise base * 2^(attempt-1).
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(secs) = retry_after {
            return Duration::from_secs(secs);
        }
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub user: Option<String>,
    pub playlist_extension: String,
    pub batch_size: usize,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl SyncOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            user: cfg.user.clone().filter(|u| !u.trim().is_empty()),
            playlist_extension: cfg.playlist_extension.clone(),
            batch_size: cfg.max_batch_size.max(1),
            concurrency: cfg.max_concurrent_playlists.max(1),
            retry: RetryPolicy {
                max_retries: cfg.max_retries_on_error,
                base_delay: Duration::from_millis(cfg.retry_base_delay_ms),
            },
        }
    }
}

/// Read side of the run's cancellation flag.
#[derive(Debug, Clone)]
pub struct Cancellation(watch::Receiver<bool>);

impl Cancellation {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    /// A flag that is never raised.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    pub fn check(&self) -> Result<(), SyncError> {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    /// Resolves once the flag is raised; pends forever if the sender is gone.
    async fn raised(&self) {
        let mut rx = self.0.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Run `op`, retrying transient failures per `retry`. Cancellation is checked
/// before every attempt and interrupts the backoff sleep.
async fn with_retry<T, F, Fut>(retry: &RetryPolicy, cancel: &Cancellation, what: &str, mut op: F) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut attempt: u32 = 0;
    loop {
        cancel.check()?;
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt <= retry.max_retries => {
                let wait = retry.delay_for(attempt, e.retry_after());
                log::warn!("{} attempt {} failed: {}. Retrying in {:?}", what, attempt, e, wait);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = cancel.raised() => return Err(SyncError::Cancelled),
                }
            }
            Err(e) => {
                if e.is_transient() {
                    log::error!("{} failed after {} attempts: {}", what, attempt, e);
                }
                return Err(e);
            }
        }
    }
}

struct PlaylistDone {
    outcome: PlaylistOutcome,
    modified_ms: i64,
    unresolved: usize,
}

struct Resolved {
    tracks: Vec<TrackId>,
    misses: usize,
}

/// Per-run context shared by every playlist task.
struct Syncer<'a> {
    provider: &'a dyn Provider,
    resolver: &'a dyn TrackResolver,
    remote: &'a RemotePlaylists,
    user: &'a str,
    opts: &'a SyncOptions,
    cancel: &'a Cancellation,
}

impl<'a> Syncer<'a> {
    async fn retry<T, F, Fut>(&self, what: &str, op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        with_retry(&self.opts.retry, self.cancel, what, op).await
    }

    /// Resolve entries in file order. Only a miss drops the entry; a failed
    /// lookup fails the playlist so nothing is removed on partial information.
    async fn resolve_entries(&self, playlist_name: &str, entries: &[LocalEntry]) -> Result<Resolved, SyncError> {
        let resolver = self.resolver;
        let mut out = Resolved { tracks: Vec::with_capacity(entries.len()), misses: 0 };
        for entry in entries {
            let query = entry.display_name.as_str();
            match self.retry("track lookup", move || resolver.resolve(query)).await {
                Ok(Some(id)) => out.tracks.push(id),
                Ok(None) => {
                    log::warn!("No remote match for '{}' in playlist {}; skipping", query, playlist_name);
                    out.misses += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    async fn sync_playlist(&self, source: &PlaylistSource, previous: &SyncState) -> Result<PlaylistDone, SyncError> {
        let modified_ms = playlist::modified_ms(&source.path)?;

        let outcome_and_misses = match self.remote.id_for(&source.name) {
            None => {
                log::info!("Playlist {} does not exist remotely; creating it", source.name);
                self.create_playlist(source).await?
            }
            Some(_) if !previous.needs_sync(&source.name, modified_ms) => {
                log::debug!("Playlist {} unchanged since last sync", source.name);
                (PlaylistOutcome::Unchanged, 0)
            }
            Some(id) => {
                log::info!("Playlist {} changed locally; reconciling remote {}", source.name, id);
                self.update_playlist(source, id).await?
            }
        };

        let (outcome, unresolved) = outcome_and_misses;
        Ok(PlaylistDone { outcome, modified_ms, unresolved })
    }

    async fn create_playlist(&self, source: &PlaylistSource) -> Result<(PlaylistOutcome, usize), SyncError> {
        let entries = playlist::read_entries(&source.path)?;
        let resolved = self.resolve_entries(&source.name, &entries).await?;

        let provider = self.provider;
        let user = self.user;
        let name = source.name.as_str();
        let id = self.retry("create playlist", move || provider.create_playlist(user, name)).await?;
        let id = id.as_str();

        // the bulk-add endpoint takes at most batch_size tracks per call
        for chunk in batch::chunks(&resolved.tracks, self.opts.batch_size) {
            self.retry("add tracks", move || provider.add_tracks(id, chunk, None)).await?;
        }

        Ok((PlaylistOutcome::Created { tracks: resolved.tracks.len() }, resolved.misses))
    }

    async fn update_playlist(&self, source: &PlaylistSource, playlist_id: &str) -> Result<(PlaylistOutcome, usize), SyncError> {
        let entries = playlist::read_entries(&source.path)?;
        let resolved = self.resolve_entries(&source.name, &entries).await?;

        let provider = self.provider;
        let current = self.retry("fetch tracks", move || provider.fetch_tracks(playlist_id)).await?;

        let plan = reconcile_around_unavailable(&resolved.tracks, &current);
        log::info!(
            "Playlist {}: {} local, {} remote -> remove {}, insert {}, trim {}",
            source.name,
            resolved.tracks.len(),
            current.len(),
            plan.remove_all.len(),
            plan.insert_at.len(),
            plan.remove_at_position.len()
        );
        self.apply_plan(playlist_id, &plan).await?;

        Ok((
            PlaylistOutcome::Reconciled {
                removed: plan.remove_all.len(),
                inserted: plan.insert_at.len(),
                trimmed: plan.remove_at_position.len(),
            },
            resolved.misses,
        ))
    }

    /// Apply the three phases strictly in order: membership removals, then
    /// positional inserts one at a time, then positional tail removals.
    async fn apply_plan(&self, playlist_id: &str, plan: &MutationPlan) -> Result<(), SyncError> {
        let provider = self.provider;
        let limit = self.opts.batch_size;

        for chunk in batch::chunks(&plan.remove_all, limit) {
            self.retry("remove tracks", move || provider.remove_all_occurrences(playlist_id, chunk)).await?;
        }

        for (track, index) in &plan.insert_at {
            let one = std::slice::from_ref(track);
            let at = Some(*index);
            self.retry("insert track", move || provider.add_tracks(playlist_id, one, at)).await?;
        }

        // highest positions first so each chunk leaves the remaining positions valid
        let mut tail = plan.remove_at_position.clone();
        tail.sort_by(|a, b| b.1.cmp(&a.1));
        for chunk in batch::chunks(&tail, limit) {
            self.retry("remove track positions", move || provider.remove_at_positions(playlist_id, chunk)).await?;
        }
        Ok(())
    }
}

/// Keep the first source for each playlist name.
fn dedupe_by_name(sources: Vec<PlaylistSource>) -> Vec<PlaylistSource> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|s| {
            if seen.insert(s.name.clone()) {
                true
            } else {
                log::warn!(
                    "Ignoring {}: another playlist file is already synced as '{}'",
                    s.path.display(),
                    s.name
                );
                false
            }
        })
        .collect()
}

/// Synchronize every playlist file under `input`.
///
/// The remote listing is fetched once; playlists then run concurrently up to
/// `opts.concurrency`. Records of completed playlists are saved as a single
/// snapshot at the end, also when the run stops early on a fatal error or
/// cancellation.
pub async fn run_sync(
    opts: &SyncOptions,
    db_path: &Path,
    provider: &dyn Provider,
    resolver: &dyn TrackResolver,
    input: &Path,
    cancel: &Cancellation,
) -> Result<SyncReport, SyncError> {
    let sources = dedupe_by_name(playlist::discover_playlists(input, &opts.playlist_extension)?);
    if sources.is_empty() {
        log::info!("No .{} playlists found under {}", opts.playlist_extension.trim_start_matches('.'), input.display());
        return Ok(SyncReport::default());
    }

    let mut state = db::load_or_empty(db_path);
    let previous = state.clone();

    let user = match &opts.user {
        Some(u) => u.clone(),
        None => with_retry(&opts.retry, cancel, "fetch current user", move || provider.current_user()).await?,
    };
    let user_ref = user.as_str();
    let listing = with_retry(&opts.retry, cancel, "list playlists", move || provider.list_playlists(user_ref)).await?;
    let remote = RemotePlaylists::from_listing(listing);
    log::info!(
        "Syncing {} local playlists against {} remote playlists on {}",
        sources.len(),
        remote.len(),
        provider.name()
    );

    let syncer = Syncer { provider, resolver, remote: &remote, user: &user, opts, cancel };
    let syncer = &syncer;
    let previous_ref = &previous;

    let mut report = SyncReport::default();
    let mut abort: Option<SyncError> = None;
    {
        let mut results = stream::iter(sources.iter())
            .map(move |src| async move { (src, syncer.sync_playlist(src, previous_ref).await) })
            .buffer_unordered(opts.concurrency.max(1));

        while let Some((src, res)) = results.next().await {
            match res {
                Ok(done) => {
                    report.unresolved_entries += done.unresolved;
                    match done.outcome {
                        PlaylistOutcome::Unchanged => report.unchanged.push(src.name.clone()),
                        PlaylistOutcome::Created { tracks } => {
                            log::info!("Created playlist {} with {} tracks", src.name, tracks);
                            state.set(&src.name, done.modified_ms);
                            report.created.push(src.name.clone());
                        }
                        PlaylistOutcome::Reconciled { removed, inserted, trimmed } => {
                            log::info!(
                                "Reconciled playlist {} (removed {}, inserted {}, trimmed {})",
                                src.name,
                                removed,
                                inserted,
                                trimmed
                            );
                            state.set(&src.name, done.modified_ms);
                            report.reconciled.push(src.name.clone());
                        }
                    }
                }
                Err(e) if e.aborts_run() => {
                    log::error!("Stopping run at playlist {}: {}", src.name, e);
                    report.failed.push(src.name.clone());
                    abort = Some(e);
                    break;
                }
                Err(e) => {
                    log::error!("Playlist {} failed: {}; it will be retried on the next run", src.name, e);
                    report.failed.push(src.name.clone());
                }
            }
        }
    }

    let saved = db::save(db_path, &state);
    if let Some(e) = abort {
        if let Err(save_err) = saved {
            log::error!("Saving sync state failed: {}", save_err);
        }
        return Err(e);
    }
    saved?;
    Ok(report)
}

/// Build the Spotify client from `cfg` and run a sync of `input`.
pub async fn run_spotify_sync(cfg: &Config, input: &Path, cancel: &Cancellation) -> Result<SyncReport, SyncError> {
    let token = cfg.resolved_access_token().ok_or_else(|| {
        SyncError::RemoteFatal("no Spotify access token: set access_token in the config or SPOTIFY_ACCESS_TOKEN".into())
    })?;
    let spotify = SpotifyProvider::new(token, cfg.api_base.clone());
    let opts = SyncOptions::from_config(cfg);
    run_sync(&opts, &cfg.db_path, &spotify, &spotify, input, cancel).await
}
