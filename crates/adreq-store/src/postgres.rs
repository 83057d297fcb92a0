//! # PostgreSQL Backend
//!
//! [`Persistence`] over a SQLx `PgPool`. Schema and seed data live in
//! `migrations/` and are embedded at compile time.
//!
//! ## Ordering
//!
//! `append_status` runs in a transaction that first takes
//! `SELECT … FOR UPDATE` on the parent `requests` row. Concurrent appends
//! to the same request therefore queue on that row lock and each observes
//! the previous writer's sequence. The `UNIQUE (request_id, sequence)`
//! constraint backs this up: a writer that somehow loses the slot gets a
//! unique violation, reported as `Conflict`.
//!
//! ## Registration races
//!
//! `insert_request_type` uses `INSERT … ON CONFLICT (name) DO NOTHING`
//! followed by a read, so concurrent registrations of one name settle on
//! the first committed row.

use std::time::Duration;

use adreq_core::{
    NewRequest, Request, RequestError, RequestFilter, RequestId, RequestSummary, RequestType,
    RequestTypeId, RequestTypeUpdate, StatusCode, StatusCodeId, StatusUpdate, StatusUpdateId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::persistence::Persistence;

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `uri` and apply the embedded migrations.
    pub async fn connect(uri: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .connect(uri)
            .await?;
        tracing::info!("connected to PostgreSQL");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");

        Ok(Self { pool })
    }

    async fn updates_for(&self, request_id: RequestId) -> Result<Vec<StatusUpdate>, RequestError> {
        let rows = sqlx::query_as::<_, UpdateRow>(
            "SELECT u.id, u.request_id, u.sequence, u.updating_user, u.message, u.created_at,
                    s.id AS status_id, s.name AS status_name, s.display_name,
                    s.email_template, s.completes_request
             FROM request_updates u
             JOIN request_status_codes s ON s.id = u.request_status_code_id
             WHERE u.request_id = $1
             ORDER BY u.sequence",
        )
        .bind(request_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(UpdateRow::into_update).collect())
    }
}

fn storage(e: sqlx::Error) -> RequestError {
    RequestError::Storage(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

const REQUEST_TYPE_COLUMNS: &str =
    "id, name, maximum_requests_per_user, maximum_concurrent_requests_per_user";

const STATUS_CODE_COLUMNS: &str =
    "id, name, display_name, email_template, completes_request";

const SUMMARY_SELECT: &str =
    "SELECT r.id, r.requesting_user, r.details, r.created_at,
            t.id AS type_id, t.name AS type_name,
            t.maximum_requests_per_user, t.maximum_concurrent_requests_per_user,
            u.id AS update_id, u.sequence, u.updating_user, u.message,
            u.created_at AS updated_at,
            s.id AS status_id, s.name AS status_name, s.display_name,
            s.email_template, s.completes_request
     FROM requests r
     JOIN request_types t ON t.id = r.request_type_id
     JOIN LATERAL (
         SELECT * FROM request_updates
         WHERE request_id = r.id
         ORDER BY created_at DESC, sequence DESC
         LIMIT 1
     ) u ON TRUE
     JOIN request_status_codes s ON s.id = u.request_status_code_id";

#[async_trait]
impl Persistence for PgStore {
    async fn insert_request_type(
        &self,
        candidate: RequestType,
    ) -> Result<RequestType, RequestError> {
        sqlx::query(
            "INSERT INTO request_types
             (id, name, maximum_requests_per_user, maximum_concurrent_requests_per_user)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(candidate.id.as_uuid())
        .bind(&candidate.name)
        .bind(candidate.maximum_requests_per_user)
        .bind(candidate.maximum_concurrent_requests_per_user)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        self.find_request_type(&candidate.name)
            .await?
            .ok_or_else(|| {
                RequestError::Conflict(format!(
                    "request type {} vanished after registration",
                    candidate.name
                ))
            })
    }

    async fn update_request_type(
        &self,
        name: &str,
        update: &RequestTypeUpdate,
    ) -> Result<Option<RequestType>, RequestError> {
        let row = sqlx::query_as::<_, RequestTypeRow>(&format!(
            "UPDATE request_types SET
                maximum_requests_per_user =
                    CASE WHEN $2 THEN $3 ELSE maximum_requests_per_user END,
                maximum_concurrent_requests_per_user =
                    CASE WHEN $4 THEN $5 ELSE maximum_concurrent_requests_per_user END
             WHERE name = $1
             RETURNING {REQUEST_TYPE_COLUMNS}"
        ))
        .bind(name)
        .bind(update.maximum_requests_per_user.is_some())
        .bind(update.maximum_requests_per_user.flatten())
        .bind(update.maximum_concurrent_requests_per_user.is_some())
        .bind(update.maximum_concurrent_requests_per_user.flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(RequestTypeRow::into_request_type))
    }

    async fn find_request_type(&self, name: &str) -> Result<Option<RequestType>, RequestError> {
        let row = sqlx::query_as::<_, RequestTypeRow>(&format!(
            "SELECT {REQUEST_TYPE_COLUMNS} FROM request_types WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(RequestTypeRow::into_request_type))
    }

    async fn list_request_types(&self) -> Result<Vec<RequestType>, RequestError> {
        let rows = sqlx::query_as::<_, RequestTypeRow>(&format!(
            "SELECT {REQUEST_TYPE_COLUMNS} FROM request_types ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(RequestTypeRow::into_request_type).collect())
    }

    async fn find_status_code(&self, name: &str) -> Result<Option<StatusCode>, RequestError> {
        let row = sqlx::query_as::<_, StatusCodeRow>(&format!(
            "SELECT {STATUS_CODE_COLUMNS} FROM request_status_codes WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(StatusCodeRow::into_status_code))
    }

    async fn list_status_codes(&self) -> Result<Vec<StatusCode>, RequestError> {
        let rows = sqlx::query_as::<_, StatusCodeRow>(&format!(
            "SELECT {STATUS_CODE_COLUMNS} FROM request_status_codes ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(StatusCodeRow::into_status_code).collect())
    }

    async fn create_request(
        &self,
        request: NewRequest,
        initial_status: &StatusCode,
    ) -> Result<Request, RequestError> {
        let id = RequestId::new();
        let now = crate::now();
        let first = crate::next_update(
            id,
            None,
            initial_status,
            &request.requesting_user,
            None,
            now,
        );

        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            "INSERT INTO requests (id, request_type_id, requesting_user, details, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id.as_uuid())
        .bind(request.request_type.id.as_uuid())
        .bind(&request.requesting_user)
        .bind(&request.details)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        insert_update(&mut tx, &first).await?;

        tx.commit().await.map_err(storage)?;

        Ok(Request {
            id,
            requesting_user: request.requesting_user,
            request_type: request.request_type,
            details: request.details,
            created_at: now,
            updates: vec![first],
        })
    }

    async fn append_status(
        &self,
        request_id: RequestId,
        status: &StatusCode,
        updating_user: &str,
        message: Option<&str>,
    ) -> Result<Option<StatusUpdate>, RequestError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Serialize appends to this request on its row lock.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM requests WHERE id = $1 FOR UPDATE")
                .bind(request_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage)?;
        if locked.is_none() {
            tx.rollback().await.map_err(storage)?;
            return Ok(None);
        }

        let latest: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT sequence, created_at FROM request_updates
             WHERE request_id = $1
             ORDER BY sequence DESC
             LIMIT 1",
        )
        .bind(request_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let update = crate::next_update(
            request_id,
            latest,
            status,
            updating_user,
            message,
            crate::now(),
        );
        insert_update(&mut tx, &update).await?;

        tx.commit().await.map_err(storage)?;
        Ok(Some(update))
    }

    async fn find_request(&self, request_id: RequestId) -> Result<Option<Request>, RequestError> {
        let row = sqlx::query_as::<_, RequestRow>(
            "SELECT r.id, r.requesting_user, r.details, r.created_at,
                    t.id AS type_id, t.name AS type_name,
                    t.maximum_requests_per_user, t.maximum_concurrent_requests_per_user
             FROM requests r
             JOIN request_types t ON t.id = r.request_type_id
             WHERE r.id = $1",
        )
        .bind(request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let updates = self.updates_for(request_id).await?;
        Ok(Some(row.into_request(updates)))
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestSummary>, RequestError> {
        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            "{SUMMARY_SELECT}
             WHERE ($1::text IS NULL OR r.requesting_user = $1)
               AND ($2::text IS NULL OR s.name = $2)
               AND ($3::text IS NULL OR t.name = $3)
               AND ($4::boolean IS NULL OR $4 OR NOT s.completes_request)
             ORDER BY r.created_at DESC, r.id DESC"
        ))
        .bind(filter.requesting_user.as_deref())
        .bind(filter.status.as_deref())
        .bind(filter.request_type.as_deref())
        .bind(filter.include_completed)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(SummaryRow::into_summary).collect())
    }

    async fn count_requests(
        &self,
        requesting_user: &str,
        request_type: RequestTypeId,
        open_only: bool,
    ) -> Result<u64, RequestError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM ({SUMMARY_SELECT}
                 WHERE r.requesting_user = $1
                   AND r.request_type_id = $2
                   AND (NOT $3 OR NOT s.completes_request)) counted"
        ))
        .bind(requesting_user)
        .bind(request_type.as_uuid())
        .bind(open_only)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), RequestError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

async fn insert_update(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    update: &StatusUpdate,
) -> Result<(), RequestError> {
    sqlx::query(
        "INSERT INTO request_updates
         (id, request_id, sequence, request_status_code_id, updating_user, message, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(update.id.as_uuid())
    .bind(update.request_id.as_uuid())
    .bind(update.sequence)
    .bind(update.status.id.as_uuid())
    .bind(&update.updating_user)
    .bind(&update.message)
    .bind(update.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RequestError::Conflict(format!(
                "status update {} for request {} was already written",
                update.sequence, update.request_id
            ))
        } else {
            storage(e)
        }
    })?;
    Ok(())
}

// -- Row types ----------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct RequestTypeRow {
    id: Uuid,
    name: String,
    maximum_requests_per_user: Option<i32>,
    maximum_concurrent_requests_per_user: Option<i32>,
}

impl RequestTypeRow {
    fn into_request_type(self) -> RequestType {
        RequestType {
            id: RequestTypeId::from_uuid(self.id),
            name: self.name,
            maximum_requests_per_user: self.maximum_requests_per_user,
            maximum_concurrent_requests_per_user: self.maximum_concurrent_requests_per_user,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatusCodeRow {
    id: Uuid,
    name: String,
    display_name: String,
    email_template: String,
    completes_request: bool,
}

impl StatusCodeRow {
    fn into_status_code(self) -> StatusCode {
        StatusCode {
            id: StatusCodeId::from_uuid(self.id),
            name: self.name,
            display_name: self.display_name,
            email_template: self.email_template,
            completes_request: self.completes_request,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UpdateRow {
    id: Uuid,
    request_id: Uuid,
    sequence: i64,
    updating_user: String,
    message: Option<String>,
    created_at: DateTime<Utc>,
    status_id: Uuid,
    status_name: String,
    display_name: String,
    email_template: String,
    completes_request: bool,
}

impl UpdateRow {
    fn into_update(self) -> StatusUpdate {
        StatusUpdate {
            id: StatusUpdateId::from_uuid(self.id),
            request_id: RequestId::from_uuid(self.request_id),
            sequence: self.sequence,
            status: StatusCode {
                id: StatusCodeId::from_uuid(self.status_id),
                name: self.status_name,
                display_name: self.display_name,
                email_template: self.email_template,
                completes_request: self.completes_request,
            },
            updating_user: self.updating_user,
            message: self.message,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    requesting_user: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
    type_id: Uuid,
    type_name: String,
    maximum_requests_per_user: Option<i32>,
    maximum_concurrent_requests_per_user: Option<i32>,
}

impl RequestRow {
    fn into_request(self, updates: Vec<StatusUpdate>) -> Request {
        Request {
            id: RequestId::from_uuid(self.id),
            requesting_user: self.requesting_user,
            request_type: RequestType {
                id: RequestTypeId::from_uuid(self.type_id),
                name: self.type_name,
                maximum_requests_per_user: self.maximum_requests_per_user,
                maximum_concurrent_requests_per_user: self.maximum_concurrent_requests_per_user,
            },
            details: self.details,
            created_at: self.created_at,
            updates,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    requesting_user: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
    type_id: Uuid,
    type_name: String,
    maximum_requests_per_user: Option<i32>,
    maximum_concurrent_requests_per_user: Option<i32>,
    update_id: Uuid,
    sequence: i64,
    updating_user: String,
    message: Option<String>,
    updated_at: DateTime<Utc>,
    status_id: Uuid,
    status_name: String,
    display_name: String,
    email_template: String,
    completes_request: bool,
}

impl SummaryRow {
    fn into_summary(self) -> RequestSummary {
        let id = RequestId::from_uuid(self.id);
        RequestSummary {
            id,
            requesting_user: self.requesting_user,
            request_type: RequestType {
                id: RequestTypeId::from_uuid(self.type_id),
                name: self.type_name,
                maximum_requests_per_user: self.maximum_requests_per_user,
                maximum_concurrent_requests_per_user: self.maximum_concurrent_requests_per_user,
            },
            details: self.details,
            created_at: self.created_at,
            current: StatusUpdate {
                id: StatusUpdateId::from_uuid(self.update_id),
                request_id: id,
                sequence: self.sequence,
                status: StatusCode {
                    id: StatusCodeId::from_uuid(self.status_id),
                    name: self.status_name,
                    display_name: self.display_name,
                    email_template: self.email_template,
                    completes_request: self.completes_request,
                },
                updating_user: self.updating_user,
                message: self.message,
                created_at: self.updated_at,
            },
        }
    }
}
