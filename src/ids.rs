//! Identifier allocation for sibling collections.

use crate::error::ValidationError;
use crate::models::Node;

/// Next id for a new item appended to `siblings`: one past the current
/// maximum, or 1 for an empty list.
///
/// Ids are local maxima, not a monotonic counter. Deleting the item holding
/// the maximum id frees that id for the next insertion; deleting any other
/// item never does. Fails when the maximum is already `u32::MAX`.
pub fn next_id<T: Node>(siblings: &[T]) -> Result<u32, ValidationError> {
    match siblings.iter().map(Node::id).max() {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| {
            ValidationError::new("id", max.to_string(), "No identifier left after the current maximum")
        }),
    }
}
