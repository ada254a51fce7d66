//! `lexbill-events` — event mechanics shared by domain and infra.
//!
//! Events are facts: immutable, versioned, append-only. This crate carries
//! the mechanics only (traits, envelopes, bus); business payloads live in
//! the domain crates.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
