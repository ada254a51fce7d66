//! HTTP API for the invoice review service.
//!
//! Thin boundary layer: JWT auth middleware, per-request tenant/principal
//! context, RBAC checks at the command boundary, and route handlers that map
//! JSON to domain commands and read models.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
