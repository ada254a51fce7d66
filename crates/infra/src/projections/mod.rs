//! Event-driven read model maintenance.

pub mod invoices;

pub use invoices::{InvoiceProjectionError, InvoiceReadModel, InvoicesProjection};
