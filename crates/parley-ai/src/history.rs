//! Rebuild conversation turns from stored events.

use crate::prompt::Turn;
use crate::store::Event;

/// Keep the newest `max_messages` events, oldest first, dropping events
/// with empty content.
pub fn build_history(events: &[Event], max_messages: usize) -> Vec<Turn> {
    let start = events.len().saturating_sub(max_messages);
    events[start..]
        .iter()
        .filter(|event| !event.content.is_empty())
        .map(|event| Turn::new(event.role, event.content.clone()))
        .collect()
}
