pub mod dispatcher;
pub mod handlers;
pub mod inventory;
pub mod sink;

// Re-export key types for convenience
pub use dispatcher::SideEffectDispatcher;
pub use handlers::{
    Audience, HandlerError, Notification, NotificationHandler, NotificationKind,
    NotificationPriority, Notifier, StoreNotifier, WorkflowEventHandler,
};
pub use inventory::{
    plan_decrement, DecrementPlan, InMemoryInventory, InventoryAdjustment,
    InventoryDecrementHandler, InventoryRecord, InventoryStatus, InventoryStore, Shortfall,
};
pub use sink::{AuditSink, EventSink, SinkError, StoreSideEffectSink};
