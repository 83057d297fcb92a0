//! # adreq-store — Request Persistence
//!
//! Everything that owns durable state lives here.
//!
//! ## Layers
//!
//! - [`Persistence`] — the storage port. Two backends implement it:
//!   [`MemoryStore`] (a `parking_lot` lock over in-process maps, for
//!   development and tests) and [`PgStore`] (PostgreSQL via SQLx, with
//!   embedded migrations).
//! - [`RequestTypeRegistry`] and [`StatusCodeRegistry`] — lookup and
//!   registration of reference data, turning missing rows into
//!   `NotFound` errors.
//! - [`RequestStore`] — request records and their status histories.
//!
//! ## Guarantees every backend provides
//!
//! - Request type names are unique. A racing duplicate registration
//!   returns the first writer's row.
//! - A request and its first status update become visible together.
//! - Appends to one request are serialized. Sequences are gap-free and
//!   strictly increasing, and `created_at` never decreases along them.

pub mod memory;
pub mod persistence;
pub mod postgres;
pub mod registry;
pub mod requests;

pub use memory::MemoryStore;
pub use persistence::Persistence;
pub use postgres::PgStore;
pub use registry::{RequestTypeRegistry, StatusCodeRegistry};
pub use requests::RequestStore;

use adreq_core::{RequestId, StatusCode, StatusCodeId, StatusUpdate, StatusUpdateId};
use chrono::{DateTime, SubsecRound, Utc};

/// Status codes seeded into a fresh store.
///
/// Mirrors `migrations/0002_seed_status_codes.sql`.
pub fn default_status_codes() -> Vec<StatusCode> {
    [
        ("submitted", "Submitted", "request_submitted", false),
        ("in-progress", "In Progress", "request_in_progress", false),
        ("approved", "Approved", "request_complete", true),
        ("rejected", "Rejected", "request_rejected", true),
    ]
    .into_iter()
    .map(|(name, display, template, completes)| StatusCode {
        id: StatusCodeId::new(),
        name: name.to_string(),
        display_name: display.to_string(),
        email_template: template.to_string(),
        completes_request: completes,
    })
    .collect()
}

/// The current time at the precision Postgres `TIMESTAMPTZ` keeps.
///
/// Every backend stamps records with this so a record returned from a
/// write equals the same record read back later.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Build the next entry in a request's history.
///
/// `latest` is the current last update, if any. The new entry takes the
/// next sequence number, and its timestamp is clamped so it is never
/// earlier than `latest.created_at`.
pub(crate) fn next_update(
    request_id: RequestId,
    latest: Option<(i64, DateTime<Utc>)>,
    status: &StatusCode,
    updating_user: &str,
    message: Option<&str>,
    now: DateTime<Utc>,
) -> StatusUpdate {
    let (sequence, created_at) = match latest {
        Some((seq, at)) => (seq + 1, now.max(at)),
        None => (1, now),
    };
    StatusUpdate {
        id: StatusUpdateId::new(),
        request_id,
        sequence,
        status: status.clone(),
        updating_user: updating_user.to_string(),
        message: message.map(str::to_string),
        created_at,
    }
}
