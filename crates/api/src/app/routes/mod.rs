use axum::{Router, routing::get};

pub mod common;
pub mod compliance;
pub mod invoices;
pub mod lines;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/invoices", invoices::router())
}
