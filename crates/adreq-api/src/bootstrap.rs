//! # Service Bootstrap
//!
//! Turns a loaded [`ServiceConfig`] into an [`AppState`]:
//!
//! 1. **Store**: Postgres when a database URI is configured (migrations
//!    applied on connect), otherwise the in-memory store seeded with the
//!    default status codes.
//! 2. **Clients**: email relay, notification agent and group service,
//!    sharing one HTTP client with the configured timeout.
//! 3. **Engine**: resolver, dispatcher and lifecycle manager wired over
//!    the store and clients.

use std::sync::Arc;

use adreq_clients::{ClientError, ServiceClients};
use adreq_core::UserDomain;
use adreq_engine::{AdminDistributionResolver, NotificationDispatcher, RequestLifecycleManager};
use adreq_store::{MemoryStore, Persistence, PgStore};

use crate::config::{ConfigError, ServiceConfig};
use crate::state::AppState;

/// Errors during bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database initialization failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unable to build service clients: {0}")]
    Clients(#[from] ClientError),
}

/// Open the configured store.
pub async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Persistence>, BootstrapError> {
    match config.database_uri() {
        Some(uri) => {
            let store = PgStore::connect(uri).await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(
                "no database URI configured, running on the in-memory store. \
                 State will not survive restarts."
            );
            Ok(Arc::new(MemoryStore::with_default_status_codes()))
        }
    }
}

/// Wire the engine over `store` according to `config`.
pub fn build_state(
    config: &ServiceConfig,
    store: Arc<dyn Persistence>,
) -> Result<AppState, BootstrapError> {
    let clients = ServiceClients::new(config.client_config()?)?;

    let resolver = AdminDistributionResolver::new(
        Arc::new(clients.groups().clone()),
        config.iplant_groups.admin_group.clone(),
    );
    let mut dispatcher = NotificationDispatcher::new(
        Arc::new(clients.email().clone()),
        Arc::new(clients.notification_agent().clone()),
        resolver,
        UserDomain::new(config.users.domain.clone()),
    );
    if let Some(address) = &config.email.request {
        dispatcher = dispatcher.with_admin_email(address.clone());
    }

    let lifecycle = RequestLifecycleManager::new(store.clone(), dispatcher)
        .with_initial_status(config.requests.initial_status.clone());

    tracing::info!(
        admin_group = %config.iplant_groups.admin_group,
        user_domain = %config.users.domain,
        initial_status = %lifecycle.initial_status(),
        admin_email = config.email.request.as_deref().unwrap_or("-"),
        "request lifecycle configured"
    );
    Ok(AppState::new(lifecycle, store))
}
