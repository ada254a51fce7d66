//! Infrastructure layer: event storage, command dispatch, read models.
//!
//! Everything here is in-process and in-memory. The event store is the source
//! of truth for a process run and doubles as the audit trail.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use projections::invoices::{InvoiceReadModel, InvoiceProjectionError, InvoicesProjection};
pub use read_model::{InMemoryTenantStore, TenantStore};
