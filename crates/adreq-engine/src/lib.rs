//! # adreq-engine — Request Lifecycle and Notification Fan-out
//!
//! - [`RequestLifecycleManager`] validates operations against the
//!   registries, commits through the request store, then hands the
//!   committed update to the dispatcher.
//! - [`NotificationDispatcher`] emails and notifies the requester and the
//!   administrators, recording every failed attempt without failing the
//!   operation.
//! - [`AdminDistributionResolver`] turns the administrator group into a set
//!   of usernames on each call.
//!
//! Every component is `Send + Sync` and shared through `Arc`.

pub mod dispatcher;
pub mod lifecycle;
pub mod resolver;

pub use dispatcher::{Channel, ChannelFailure, DispatchResult, NotificationDispatcher};
pub use lifecycle::{Dispatched, RequestLifecycleManager, DEFAULT_INITIAL_STATUS};
pub use resolver::AdminDistributionResolver;
