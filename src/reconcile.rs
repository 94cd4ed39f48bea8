use crate::models::{MutationPlan, TrackId};
use std::collections::HashSet;

/// Compute the mutations that turn `current` into `desired`.
///
/// Three passes over a private copy of `current`:
/// 1. scrub: drop every id that does not occur in `desired` at all;
/// 2. align: walk `desired`, inserting the expected id wherever the working
///    list disagrees, so later indexes match the post-insert remote state;
/// 3. tail cleanup: whatever the inserts pushed past `desired.len()` is
///    removed by exact position.
///
/// The alignment is a greedy single pass, not a minimal edit script: a swap
/// of two neighbours costs two inserts and a positional removal.
pub fn reconcile(desired: &[TrackId], current: &[TrackId]) -> MutationPlan {
    let mut plan = MutationPlan::default();
    let mut working: Vec<TrackId> = current.to_vec();

    let wanted: HashSet<&TrackId> = desired.iter().collect();
    let mut scrubbed: HashSet<TrackId> = HashSet::new();
    working.retain(|id| {
        if wanted.contains(id) {
            return true;
        }
        if scrubbed.insert(id.clone()) {
            plan.remove_all.push(id.clone());
        }
        false
    });

    for (i, id) in desired.iter().enumerate() {
        if working.get(i) != Some(id) {
            plan.insert_at.push((id.clone(), i));
            working.insert(i, id.clone());
        }
    }

    plan.remove_at_position = working
        .into_iter()
        .enumerate()
        .skip(desired.len())
        .map(|(pos, id)| (id, pos))
        .collect();

    plan
}

/// Like [`reconcile`], for a remote sequence that may hold unavailable
/// placeholders.
///
/// Placeholders stay where they are: the plan is computed over the playable
/// tracks only and every position is then translated to the remote list as
/// it stands when that mutation is applied.
pub fn reconcile_around_unavailable(desired: &[TrackId], current: &[TrackId]) -> MutationPlan {
    if !current.iter().any(TrackId::is_unavailable) {
        return reconcile(desired, current);
    }
    let playable: Vec<TrackId> = current.iter().filter(|t| !t.is_unavailable()).cloned().collect();
    let plan = reconcile(desired, &playable);

    let removed: HashSet<&TrackId> = plan.remove_all.iter().collect();
    let mut remote: Vec<TrackId> = current
        .iter()
        .filter(|t| t.is_unavailable() || !removed.contains(t))
        .cloned()
        .collect();

    let mut insert_at = Vec::with_capacity(plan.insert_at.len());
    for (id, i) in &plan.insert_at {
        let at = remote_index(&remote, *i);
        remote.insert(at, id.clone());
        insert_at.push((id.clone(), at));
    }
    let remove_at_position = plan
        .remove_at_position
        .iter()
        .map(|(id, p)| (id.clone(), remote_index(&remote, *p)))
        .collect();

    MutationPlan { remove_all: plan.remove_all, insert_at, remove_at_position }
}

/// Index in `remote` of the `n`th playable track, or the end of the list.
fn remote_index(remote: &[TrackId], n: usize) -> usize {
    remote
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_unavailable())
        .nth(n)
        .map(|(idx, _)| idx)
        .unwrap_or(remote.len())
}
