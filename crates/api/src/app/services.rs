//! Service wiring for the API.
//!
//! Builds the in-memory event store + bus, the invoices projection, the
//! command dispatcher, and the realtime broadcast channel used by `/stream`.
//! The projection is updated by a background consumer subscribed to the bus,
//! so reads after a command are eventually consistent.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use lexbill_billing::InvoiceId;
use lexbill_core::{AggregateId, DomainError, TenantId};
use lexbill_events::{EventBus, EventEnvelope, InMemoryEventBus};
use lexbill_infra::{
    CommandDispatcher, DispatchError, InMemoryEventStore, InMemoryTenantStore, InvoiceReadModel,
    InvoicesProjection, StoredEvent,
};

/// Message fanned out to SSE subscribers after a projection update.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Projection = Arc<InvoicesProjection<Arc<InMemoryTenantStore<InvoiceId, InvoiceReadModel>>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

pub struct AppServices {
    dispatcher: Dispatcher,
    event_store: Arc<InMemoryEventStore>,
    invoices_projection: Projection,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

/// Wire up in-memory services and start the projection consumer.
pub fn build_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let invoices_projection: Projection =
        Arc::new(InvoicesProjection::new(Arc::new(InMemoryTenantStore::new())));

    // Lossy broadcast; tenant filtering happens in the SSE handler.
    let (realtime_tx, _) = broadcast::channel::<RealtimeMessage>(256);

    {
        let bus = bus.clone();
        let invoices_projection = invoices_projection.clone();
        let realtime_tx = realtime_tx.clone();
        tokio::task::spawn_blocking(move || {
            let sub = bus.subscribe();
            loop {
                match sub.recv() {
                    Ok(env) => {
                        let at = env.aggregate_type().to_string();

                        if at == "billing.invoice" {
                            if let Err(e) = invoices_projection.apply_envelope(&env) {
                                tracing::warn!("projection apply failed: {e}");
                                continue;
                            }
                        }

                        let _ = realtime_tx.send(RealtimeMessage {
                            tenant_id: env.tenant_id(),
                            topic: format!("{at}.projection_updated"),
                            payload: serde_json::json!({
                                "kind": "projection_update",
                                "aggregate_type": at,
                                "aggregate_id": env.aggregate_id().to_string(),
                                "sequence_number": env.sequence_number(),
                            }),
                        });
                    }
                    Err(_) => break,
                }
            }
        });
    }

    let dispatcher = CommandDispatcher::new(store.clone(), bus);
    AppServices {
        dispatcher,
        event_store: store,
        invoices_projection,
        realtime_tx,
    }
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: lexbill_core::Aggregate<Error = DomainError>,
        A::Event: lexbill_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch::<A>(tenant_id, aggregate_id, aggregate_type, command, make_aggregate)
    }

    pub fn invoices_get(&self, tenant_id: TenantId, id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.invoices_projection.get(tenant_id, id)
    }

    pub fn invoices_list(&self, tenant_id: TenantId) -> Vec<InvoiceReadModel> {
        self.invoices_projection.list(tenant_id)
    }

    /// Full event stream for one aggregate (audit trail).
    pub fn aggregate_events(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, lexbill_infra::EventStoreError> {
        use lexbill_infra::EventStore;
        self.event_store.load_stream(tenant_id, aggregate_id)
    }
}

/// Build an SSE stream for a tenant (used by `/stream`).
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
