/// Bulk-add ceiling documented by the Spotify Web API.
pub const MAX_BATCH_SIZE: usize = 100;

/// Split `items` into contiguous chunks of at most `limit`, keeping order.
/// A zero limit is treated as one.
pub fn batch<T: Clone>(items: &[T], limit: usize) -> Vec<Vec<T>> {
    chunks(items, limit).map(|c| c.to_vec()).collect()
}

/// Borrowing form of [`batch`].
pub fn chunks<T>(items: &[T], limit: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(limit.max(1))
}
