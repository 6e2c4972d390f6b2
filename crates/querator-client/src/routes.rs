//! Operation descriptors: the fixed mapping from logical operation to route.

use std::fmt;

/// One logical remote capability of the service.
///
/// Each operation is bound to exactly one route. Routes are constants and
/// are never assembled at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    QueueProduce,
    QueueLease,
    QueueComplete,
    QueueRetry,
    QueueClear,
    QueueStats,
    QueuesCreate,
    QueuesList,
    QueuesUpdate,
    QueuesDelete,
    QueuesInfo,
    StorageItemsList,
    StorageItemsImport,
    StorageItemsDelete,
    StorageScheduledList,
}

impl Operation {
    /// Every operation, each listed once.
    pub const ALL: [Operation; 15] = [
        Operation::QueueProduce,
        Operation::QueueLease,
        Operation::QueueComplete,
        Operation::QueueRetry,
        Operation::QueueClear,
        Operation::QueueStats,
        Operation::QueuesCreate,
        Operation::QueuesList,
        Operation::QueuesUpdate,
        Operation::QueuesDelete,
        Operation::QueuesInfo,
        Operation::StorageItemsList,
        Operation::StorageItemsImport,
        Operation::StorageItemsDelete,
        Operation::StorageScheduledList,
    ];

    /// Route path relative to the endpoint.
    pub const fn route(self) -> &'static str {
        match self {
            Operation::QueueProduce => "/v1/queue.produce",
            Operation::QueueLease => "/v1/queue.lease",
            Operation::QueueComplete => "/v1/queue.complete",
            Operation::QueueRetry => "/v1/queue.retry",
            Operation::QueueClear => "/v1/queue.clear",
            Operation::QueueStats => "/v1/queue.stats",
            Operation::QueuesCreate => "/v1/queues.create",
            Operation::QueuesList => "/v1/queues.list",
            Operation::QueuesUpdate => "/v1/queues.update",
            Operation::QueuesDelete => "/v1/queues.delete",
            Operation::QueuesInfo => "/v1/queues.info",
            Operation::StorageItemsList => "/v1/storage/items.list",
            Operation::StorageItemsImport => "/v1/storage/items.import",
            Operation::StorageItemsDelete => "/v1/storage/items.delete",
            Operation::StorageScheduledList => "/v1/storage/scheduled.list",
        }
    }

    /// Stable label used in logs and error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Operation::QueueProduce => "queue.produce",
            Operation::QueueLease => "queue.lease",
            Operation::QueueComplete => "queue.complete",
            Operation::QueueRetry => "queue.retry",
            Operation::QueueClear => "queue.clear",
            Operation::QueueStats => "queue.stats",
            Operation::QueuesCreate => "queues.create",
            Operation::QueuesList => "queues.list",
            Operation::QueuesUpdate => "queues.update",
            Operation::QueuesDelete => "queues.delete",
            Operation::QueuesInfo => "queues.info",
            Operation::StorageItemsList => "storage.items.list",
            Operation::StorageItemsImport => "storage.items.import",
            Operation::StorageItemsDelete => "storage.items.delete",
            Operation::StorageScheduledList => "storage.scheduled.list",
        }
    }

    /// Reverse lookup of [`Operation::route`].
    pub fn from_route(route: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.route() == route)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
