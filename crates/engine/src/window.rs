//! Recency window filter.

use mentora_core::message::ChatMessage;

/// Return the last `cap` messages of `history`, preserving order.
///
/// The decision is exactly `cap < len`: when the cap does not
/// undercut the history length the full slice is returned unchanged,
/// and a cap of zero on a non-empty history yields an empty slice.
pub fn last_n(history: &[ChatMessage], cap: usize) -> &[ChatMessage] {
    if cap < history.len() {
        &history[history.len() - cap..]
    } else {
        history
    }
}
