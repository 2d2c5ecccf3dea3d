//! Login challenge resolution.
//!
//! `GET /@login` starts (or skips) a challenge hydra redirected to us;
//! `POST /@login` resolves it with credentials. The hub `GET` always comes
//! before the `PUT` for the same challenge.

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::cli::globals::GlobalArgs;
use crate::ponto::{
    csrf,
    error::ApiError,
    handlers::{redirect_field, redirect_with_csrf, require_hydra},
    hydra::HydraClient,
    password,
    storage::{self, UserColumn},
};

#[derive(Debug, Deserialize)]
pub struct BeginLogin {
    pub login_challenge: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitLogin {
    pub challenge: String,
    /// `username` with `login` accepted as an alias.
    pub username: Option<String>,
    pub login: Option<String>,
    pub password: String,
    pub remember: Option<bool>,
    pub csrf: Option<String>,
}

#[utoipa::path(
    get,
    path = "/@login",
    params(
        ("login_challenge" = Option<String>, Query, description = "Challenge minted by hydra")
    ),
    responses(
        (status = 200, description = "Credentials required; render a login prompt"),
        (status = 302, description = "Hydra already trusts this session; redirect"),
        (status = 400, description = "Missing challenge or admin URL not configured"),
    ),
    tag = "login"
)]
pub async fn begin(
    Query(query): Query<BeginLogin>,
    headers: HeaderMap,
    Extension(hydra): Extension<Option<HydraClient>>,
) -> Result<Response, ApiError> {
    let Some(challenge) = query.login_challenge else {
        return Err(ApiError::BadRequest("login_challenge not present".to_string()));
    };
    let hydra = require_hydra(&hydra)?;

    let token = csrf::from_cookie(&headers);
    let cookie = token.as_deref().map(csrf::cookie_header);

    let login_request = hydra.get_login(&challenge, cookie.as_deref()).await?;

    if login_request["skip"].as_bool().unwrap_or(false) {
        // already authenticated! skip and return token immediately
        let accept = hydra
            .accept_login(
                &challenge,
                json!({ "subject": login_request["subject"] }),
                cookie.as_deref(),
            )
            .await?;

        return redirect_with_csrf(redirect_field(&accept)?, cookie.as_deref());
    }

    Ok(Json(json!({
        "type": "login",
        "challenge": challenge,
        "csrf": token,
    }))
    .into_response())
}

#[utoipa::path(
    post,
    path = "/@login",
    request_body = SubmitLogin,
    responses(
        (status = 302, description = "Credentials accepted; redirect to hydra"),
        (status = 400, description = "Admin URL not configured or username missing"),
        (status = 401, description = "Login failed"),
    ),
    tag = "login"
)]
pub async fn submit(
    headers: HeaderMap,
    Extension(hydra): Extension<Option<HydraClient>>,
    Extension(globals): Extension<Arc<GlobalArgs>>,
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<SubmitLogin>,
) -> Result<Response, ApiError> {
    let hydra = require_hydra(&hydra)?;

    let username = payload
        .username
        .or(payload.login)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("username not present".to_string()))?;

    // Unknown user and wrong password answer identically, no enumeration.
    let user = storage::find_user(&pool, UserColumn::Username, &username)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let verified =
        password::verify_blocking(globals.hash_scheme, user.password, payload.password).await?;
    if !verified {
        return Err(ApiError::Unauthorized);
    }

    let token = csrf::extract(payload.csrf.as_deref(), &headers);
    let cookie = token.as_deref().map(csrf::cookie_header);

    let accept = hydra
        .accept_login(
            &payload.challenge,
            json!({
                "subject": user.id,
                "remember": payload.remember.unwrap_or(false),
                "remember_for": 3600,

                // acr is a value to represent level of authentication.
                // this can be used with 2-factor auth schemes
                "acr": "0",
            }),
            cookie.as_deref(),
        )
        .await?;

    redirect_with_csrf(redirect_field(&accept)?, cookie.as_deref())
}
