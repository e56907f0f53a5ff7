//! Multi-tenant persistent job queue.
//!
//! Producers submit opaque payloads scoped to a tenant through the HTTP
//! API; worker processes lease jobs out of the shared SQLite store,
//! execute them, and apply the retry / dead-letter policy. Execution is
//! at-least-once: the lease is the only ownership primitive, and an
//! expired lease puts a job back into the pool.

pub mod app_state;
pub mod db;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;
pub mod shutdown;
