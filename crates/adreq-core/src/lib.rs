#![deny(missing_docs)]

//! # adreq-core — Foundational Types for Administrative Requests
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`RequestId`] cannot be passed
//!    where a [`RequestTypeId`] is expected.
//!
//! 2. **Status is data.** A request's state is whichever [`StatusCode`] its
//!    latest [`StatusUpdate`] references. Status codes are operator-managed
//!    reference data, so there is no status enum anywhere in the stack.
//!
//! 3. **Opaque details.** The submitter's `details` payload is a JSON object
//!    that the core stores and returns but never inspects.
//!
//! 4. **Ports, not transports.** Email, notification-agent, and group
//!    membership are consumed through the traits in [`channels`]. The HTTP
//!    adapters live in `adreq-clients`.

pub mod channels;
pub mod error;
pub mod identity;
pub mod model;
pub mod username;

// Re-export primary types at crate root for ergonomic imports.
pub use channels::{
    AgentNotice, EmailMessage, EmailSender, GroupDirectory, NoticePayload, NotificationSender,
};
pub use error::{ErrorKind, RequestError};
pub use identity::{RequestId, RequestTypeId, StatusCodeId, StatusUpdateId};
pub use model::{
    NewRequest, Request, RequestFilter, RequestSummary, RequestType, RequestTypeUpdate,
    StatusCode, StatusUpdate,
};
pub use username::UserDomain;
