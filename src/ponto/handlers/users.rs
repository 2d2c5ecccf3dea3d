//! User management endpoints, guarded by the admin bearer token.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cli::globals::GlobalArgs;
use crate::ponto::{
    error::ApiError,
    password,
    storage::{self, CreateOutcome, User, UserColumn},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUser {
    pub id: Option<String>,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub data: Option<Value>,
}

/// User record as returned to clients; the password hash stays out.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub data: Value,
}

impl From<User> for UserRecord {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
            data: user.data,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

fn require_admin(headers: &HeaderMap, globals: &GlobalArgs) -> Result<(), ApiError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::InvalidAdminToken)?;

    if presented == globals.admin_token.expose_secret() {
        Ok(())
    } else {
        Err(ApiError::InvalidAdminToken)
    }
}

#[utoipa::path(
    post,
    path = "/@users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserRecord),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 409, description = "Id or username already exists"),
    ),
    tag = "users"
)]
pub async fn create(
    headers: HeaderMap,
    Extension(globals): Extension<Arc<GlobalArgs>>,
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<CreateUser>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &globals)?;

    let user = User {
        id: payload
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        username: payload.username,
        password: password::hash_blocking(globals.hash_scheme, payload.password).await?,
        email: payload.email.unwrap_or_default(),
        phone: payload.phone.unwrap_or_default(),
        data: payload.data.unwrap_or_else(|| json!({})),
    };

    match storage::create_user(&pool, &user).await? {
        CreateOutcome::Created => Ok((
            StatusCode::CREATED,
            Json(UserRecord::from(user)),
        )
            .into_response()),
        CreateOutcome::Conflict => Err(ApiError::Conflict("user already exists".to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/@users",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum rows returned, default 1000")
    ),
    responses(
        (status = 200, description = "Id/username pairs", body = [storage::UserSummary]),
        (status = 401, description = "Missing or invalid admin token"),
    ),
    tag = "users"
)]
pub async fn list(
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
    Extension(globals): Extension<Arc<GlobalArgs>>,
    Extension(pool): Extension<PgPool>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &globals)?;

    let users = storage::list_users(&pool, query.limit.unwrap_or(1000)).await?;

    Ok(Json(users).into_response())
}

#[utoipa::path(
    get,
    path = "/@users/{userid}",
    params(
        ("userid" = String, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Full record, password hash excluded", body = UserRecord),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "Unknown user id"),
    ),
    tag = "users"
)]
pub async fn detail(
    Path(userid): Path<String>,
    headers: HeaderMap,
    Extension(globals): Extension<Arc<GlobalArgs>>,
    Extension(pool): Extension<PgPool>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &globals)?;

    let user = storage::find_user(&pool, UserColumn::Id, &userid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{userid} does not exist")))?;

    Ok(Json(UserRecord::from(user)).into_response())
}

#[utoipa::path(
    delete,
    path = "/@users/{userid}",
    params(
        ("userid" = String, Path, description = "User id")
    ),
    responses(
        (status = 204, description = "Deleted, or nothing to delete"),
        (status = 401, description = "Missing or invalid admin token"),
    ),
    tag = "users"
)]
pub async fn remove(
    Path(userid): Path<String>,
    headers: HeaderMap,
    Extension(globals): Extension<Arc<GlobalArgs>>,
    Extension(pool): Extension<PgPool>,
) -> Result<Response, ApiError> {
    require_admin(&headers, &globals)?;

    storage::delete_user(&pool, &userid).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
