//! Postgres-backed credential store.
//!
//! One table, `hydra_users`. The `data` column holds an opaque JSON document
//! as text; it is decoded on read and must round-trip without loss. Password
//! hashes never leave this module except through [`User::password`], which
//! handlers are careful not to serialize.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use utoipa::ToSchema;

/// Full user record, including the PHC password hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone: String,
    pub data: Value,
}

/// `{id, username}` pair returned by listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
}

/// Closed set of columns `find_user` may filter on. Keeps the SQL static,
/// there is no string-built WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    Id,
    Username,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created,
    /// The id or username already exists (unique constraint).
    Conflict,
}

/// Create the users table when missing; runs once at startup.
///
/// # Errors
/// Returns an error when the DDL fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    let query = r"
        CREATE TABLE IF NOT EXISTS hydra_users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            data TEXT NOT NULL DEFAULT '{}'
        )
    ";
    sqlx::query(query)
        .execute(pool)
        .await
        .context("Failed to create hydra_users table")?;

    Ok(())
}

/// Insert a new user row. The password must already be hashed.
///
/// # Errors
/// Returns an error on any database failure other than a unique violation,
/// which maps to [`CreateOutcome::Conflict`].
pub async fn create_user(pool: &PgPool, user: &User) -> Result<CreateOutcome> {
    let query = r"
        INSERT INTO hydra_users (id, username, password, email, phone, data)
        VALUES ($1, $2, $3, $4, $5, $6)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let data =
        serde_json::to_string(&user.data).context("Failed to encode user data column")?;

    let result = sqlx::query(query)
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&data)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
        Err(err) => Err(err).context("Failed to insert user"),
    }
}

/// Delete a user by id. Idempotent: deleting a missing row is not an error.
///
/// # Errors
/// Returns an error on database failure.
pub async fn delete_user(pool: &PgPool, id: &str) -> Result<()> {
    let query = "DELETE FROM hydra_users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("Failed to delete user")?;

    Ok(())
}

/// List up to `limit` users, storage order.
///
/// # Errors
/// Returns an error on database failure.
pub async fn list_users(pool: &PgPool, limit: i64) -> Result<Vec<UserSummary>> {
    let query = "SELECT id, username FROM hydra_users LIMIT $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(limit)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("Failed to list users")?;

    Ok(rows
        .into_iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            username: row.get("username"),
        })
        .collect())
}

/// Fetch at most one user by an equality filter on a declared column,
/// decoding the `data` column from JSON. Zero rows is `Ok(None)`.
///
/// # Errors
/// Returns an error on database failure or a corrupt `data` column.
pub async fn find_user(pool: &PgPool, column: UserColumn, value: &str) -> Result<Option<User>> {
    let query = match column {
        UserColumn::Id => {
            "SELECT id, username, password, email, phone, data FROM hydra_users WHERE id = $1"
        }
        UserColumn::Username => {
            "SELECT id, username, password, email, phone, data FROM hydra_users WHERE username = $1"
        }
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(value)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("Failed to find user")?;

    row.map(|row| {
        let data: String = row.get("data");
        let data = serde_json::from_str(&data).context("Failed to decode user data column")?;

        Ok(User {
            id: row.get("id"),
            username: row.get("username"),
            password: row.get("password"),
            email: row.get("email"),
            phone: row.get("phone"),
            data,
        })
    })
    .transpose()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
