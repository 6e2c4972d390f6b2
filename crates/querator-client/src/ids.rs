//! Identifier extraction from item collections.

use crate::wire::{QueueLeaseItem, StorageItem};

/// An item that carries a service-assigned identifier.
pub trait HasId {
    fn id(&self) -> &str;
}

impl HasId for QueueLeaseItem {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for StorageItem {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Collect the identifiers of `items`, in order.
///
/// # Examples
///
/// ```
/// use querator_client::{collect_ids, wire::QueueLeaseItem};
///
/// let items = vec![
///     QueueLeaseItem { id: "a".to_string(), ..Default::default() },
///     QueueLeaseItem { id: "b".to_string(), ..Default::default() },
/// ];
/// assert_eq!(collect_ids(&items), vec!["a", "b"]);
/// ```
pub fn collect_ids<I: HasId>(items: &[I]) -> Vec<String> {
    items.iter().map(|item| item.id().to_string()).collect()
}
