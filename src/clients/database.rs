use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgPoolOptions};
use tracing::{debug, error, info};

use crate::{
    clients::{IdempotencyStore, MessageStore, RecipientDirectory},
    config::Config,
    error::WorkerError,
    models::{
        message::{EventType, UserType},
        queue::{NotifyType, ReceivedQueue},
        recipient::{Admin, NewMessage, User},
    },
};

/// PostgreSQL access for idempotency records, recipients and in-app messages.
#[derive(Clone)]
pub struct DatabaseClient {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct ReceivedQueueRow {
    id: String,
    notify_type: String,
    event_type: String,
    user_type: String,
    user_ids: Vec<String>,
    done: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReceivedQueueRow> for ReceivedQueue {
    fn from(row: ReceivedQueueRow) -> Self {
        Self {
            id: row.id,
            notify_type: NotifyType::from_string(&row.notify_type),
            event_type: EventType::from_string(&row.event_type),
            user_type: UserType::from_string(&row.user_type),
            user_ids: row.user_ids,
            done: row.done,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AdminRow {
    id: String,
    lastname: String,
    firstname: String,
    email: String,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
}

impl DatabaseClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self { pool })
    }

    async fn device_tokens(&self, table: &str, ids: &[String]) -> Result<Vec<String>, WorkerError> {
        let sql = format!(
            "SELECT device FROM {} WHERE id = ANY($1) AND deleted_at IS NULL AND device <> ''",
            table
        );

        let tokens: Vec<String> = sqlx::query_scalar(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        debug!(table, requested = ids.len(), found = tokens.len(), "Device tokens fetched");

        Ok(tokens)
    }
}

#[async_trait]
impl IdempotencyStore for DatabaseClient {
    async fn get(&self, queue_id: &str) -> Result<ReceivedQueue, WorkerError> {
        let row = sqlx::query_as::<_, ReceivedQueueRow>(
            r#"
            SELECT id, notify_type, event_type, user_type, user_ids, done, created_at, updated_at
            FROM received_queues
            WHERE id = $1
            "#,
        )
        .bind(queue_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReceivedQueue::from)
            .ok_or_else(|| WorkerError::NotFound(format!("received queue {}", queue_id)))
    }

    async fn update_done(&self, queue_id: &str, done: bool) -> Result<(), WorkerError> {
        let result = sqlx::query(
            r#"
            UPDATE received_queues
            SET done = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(queue_id)
        .bind(done)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, queue_id, "Failed to update received queue");
            WorkerError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(WorkerError::NotFound(format!("received queue {}", queue_id)));
        }

        debug!(queue_id, done, "Received queue updated");

        Ok(())
    }
}

#[async_trait]
impl RecipientDirectory for DatabaseClient {
    async fn admins(&self, ids: &[String]) -> Result<Vec<Admin>, WorkerError> {
        let rows = sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT id, lastname, firstname, email
            FROM admins
            WHERE id = ANY($1) AND deleted_at IS NULL
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Admin {
                id: row.id,
                lastname: row.lastname,
                firstname: row.firstname,
                email: row.email,
            })
            .collect())
    }

    async fn users(&self, ids: &[String]) -> Result<Vec<User>, WorkerError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email
            FROM users
            WHERE id = ANY($1) AND deleted_at IS NULL
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| User {
                id: row.id,
                username: row.username,
                email: row.email,
            })
            .collect())
    }

    async fn admin_device_tokens(&self, ids: &[String]) -> Result<Vec<String>, WorkerError> {
        self.device_tokens("admins", ids).await
    }

    async fn user_device_tokens(&self, ids: &[String]) -> Result<Vec<String>, WorkerError> {
        self.device_tokens("users", ids).await
    }
}

#[async_trait]
impl MessageStore for DatabaseClient {
    async fn create_messages(&self, messages: &[NewMessage]) -> Result<(), WorkerError> {
        if messages.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO messages (id, user_type, user_id, type, title, body, link, \
             received_at, created_at, updated_at) ",
        );

        builder.push_values(messages, |mut row, message| {
            row.push_bind(message.id)
                .push_bind(message.user_type.as_str().to_string())
                .push_bind(message.user_id.clone())
                .push_bind(message.message_type.as_str().to_string())
                .push_bind(message.title.clone())
                .push_bind(message.body.clone())
                .push_bind(message.link.clone())
                .push_bind(message.received_at)
                .push_bind(now)
                .push_bind(now);
        });

        builder.build().execute(&self.pool).await.map_err(|e| {
            error!(error = %e, count = messages.len(), "Failed to insert messages");
            WorkerError::from(e)
        })?;

        debug!(count = messages.len(), "Messages written to database");

        Ok(())
    }
}
