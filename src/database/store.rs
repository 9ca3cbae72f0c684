//! Storage seam.
//!
//! Everything above this trait (repository, batch executor, handlers) talks
//! to a `dyn Store`. [`PgStore`] is the production implementation; the
//! in-memory store in `crate::testing` backs unit and router tests.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, error};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{NewUser, User, UserLookup};
use crate::database::query_builder::{bind_params, SelectQuery, WriteOp};
use crate::types::Operation;

/// Result of one write inside a transaction
#[derive(Debug, Clone, Serialize)]
pub struct OpResult {
    pub operation: Operation,
    pub rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Map<String, Value>>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Active rows matching the query, in the entity's order
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Map<String, Value>>, DatabaseError>;

    async fn count(&self, query: &SelectQuery) -> Result<i64, DatabaseError>;

    /// Apply every operation or none of them. A single-row operation that
    /// matches nothing fails with [`DatabaseError::NotFound`] and rolls back
    /// the whole list.
    async fn transact(&self, ops: &[WriteOp]) -> Result<Vec<OpResult>, DatabaseError>;

    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<User>, DatabaseError>;

    /// Fails with a unique violation on duplicate email or username
    async fn insert_user(&self, user: &NewUser) -> Result<User, DatabaseError>;

    /// Idempotent on email
    async fn join_waitlist(&self, email: &str, name: Option<&str>) -> Result<(), DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

fn row_object(row: &sqlx::postgres::PgRow) -> Result<Map<String, Value>, DatabaseError> {
    match row.try_get::<Value, _>("row")? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::QueryError(format!("Expected a row object, got {}", other))),
    }
}

const USER_COLUMNS: &str =
    "id, email, username, name, password_hash, role, headline, bio, avatar_url, is_active, created_at, updated_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply(tx: &mut Transaction<'static, Postgres>, op: &WriteOp) -> Result<OpResult, DatabaseError> {
        let statement = op.to_sql();
        debug!("{} on {}: {}", op_name(op), op.def().table, statement.query);
        let query = bind_params(sqlx::query(&statement.query), &statement.params);

        if op.targets_single_row() {
            let row = query.fetch_optional(&mut **tx).await?;
            let Some(row) = row else {
                return Err(DatabaseError::NotFound(describe_missing(op)));
            };
            Ok(OpResult {
                operation: op.operation(),
                rows: 1,
                record: Some(row_object(&row)?),
            })
        } else {
            let done = query.execute(&mut **tx).await?;
            Ok(OpResult {
                operation: op.operation(),
                rows: done.rows_affected(),
                record: None,
            })
        }
    }
}

fn op_name(op: &WriteOp) -> &'static str {
    match op {
        WriteOp::Insert { .. } => "insert",
        WriteOp::Update { .. } => "update",
        WriteOp::SoftDelete { .. } => "soft delete",
        WriteOp::UpdateMatching { .. } => "update matching",
        WriteOp::DeleteMatching { .. } => "delete matching",
    }
}

pub(crate) fn describe_missing(op: &WriteOp) -> String {
    match op {
        WriteOp::Update { def, id, .. } | WriteOp::SoftDelete { def, id, .. } => {
            format!("No active {} {} in this scope", def.label, id)
        }
        other => format!("{} on {} matched no row", op_name(other), other.def().table),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Map<String, Value>>, DatabaseError> {
        let statement = query.to_sql();
        let rows = bind_params(sqlx::query(&statement.query), &statement.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_object).collect()
    }

    async fn count(&self, query: &SelectQuery) -> Result<i64, DatabaseError> {
        let statement = query.to_count_sql();
        let row = bind_params(sqlx::query(&statement.query), &statement.params)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn transact(&self, ops: &[WriteOp]) -> Result<Vec<OpResult>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(ops.len());
        for (index, op) in ops.iter().enumerate() {
            match Self::apply(&mut tx, op).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("Operation {} of {} failed, rolling back: {}", index + 1, ops.len(), e);
                    if let Err(rollback) = tx.rollback().await {
                        error!("Rollback failed: {}", rollback);
                    }
                    return Err(e);
                }
            }
        }
        tx.commit().await?;
        Ok(results)
    }

    async fn find_user(&self, lookup: UserLookup<'_>) -> Result<Option<User>, DatabaseError> {
        let user = match lookup {
            UserLookup::Id(id) => {
                sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1 AND is_active", USER_COLUMNS))
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            UserLookup::Email(email) => {
                sqlx::query_as::<_, User>(&format!(
                    "SELECT {} FROM users WHERE lower(email) = lower($1) AND is_active",
                    USER_COLUMNS
                ))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
            }
            UserLookup::Username(username) => {
                sqlx::query_as::<_, User>(&format!(
                    "SELECT {} FROM users WHERE username = $1 AND is_active",
                    USER_COLUMNS
                ))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(user)
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User, DatabaseError> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, username, name, password_hash, role) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from)
        .map_err(|e| {
            if e.is_unique_violation() {
                DatabaseError::Duplicate(format!("user {} / {}", user.email, user.username))
            } else {
                e
            }
        })?;
        Ok(created)
    }

    async fn join_waitlist(&self, email: &str, name: Option<&str>) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO waitlist (email, name) VALUES (lower($1), $2) ON CONFLICT (email) DO NOTHING")
            .bind(email)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
