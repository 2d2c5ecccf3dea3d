//! Consent challenge resolution.
//!
//! Session claims assembled here end up inside the tokens hydra mints:
//! `access_token.username` plus `id_token.{username,email,phone,data}`.
//! The password hash never enters the outgoing payload.

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::ponto::{
    csrf,
    error::ApiError,
    handlers::{redirect_field, redirect_with_csrf, require_hydra},
    hydra::HydraClient,
    storage::{self, UserColumn},
};

#[derive(Debug, Deserialize)]
pub struct BeginConsent {
    pub consent_challenge: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitConsent {
    pub challenge: String,
    /// Hub subject; re-checked against the challenge record before use.
    pub subject: String,
    pub requested_scope: Vec<String>,
    pub remember: Option<bool>,
    pub csrf: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DenyConsent {
    pub challenge: String,
    pub csrf: Option<String>,
}

#[utoipa::path(
    get,
    path = "/@consent",
    params(
        ("consent_challenge" = Option<String>, Query, description = "Challenge minted by hydra")
    ),
    responses(
        (status = 200, description = "Scope grant required; render a consent prompt"),
        (status = 302, description = "Hydra already trusts this session; redirect"),
        (status = 400, description = "Missing challenge or admin URL not configured"),
    ),
    tag = "consent"
)]
pub async fn begin(
    Query(query): Query<BeginConsent>,
    headers: HeaderMap,
    Extension(hydra): Extension<Option<HydraClient>>,
) -> Result<Response, ApiError> {
    let hydra = require_hydra(&hydra)?;

    let Some(challenge) = query.consent_challenge else {
        return Err(ApiError::BadRequest(
            "consent_challenge not present".to_string(),
        ));
    };

    let token = csrf::from_cookie(&headers);
    let cookie = token.as_deref().map(csrf::cookie_header);

    let consent_request = hydra.get_consent(&challenge, cookie.as_deref()).await?;

    if consent_request["skip"].as_bool().unwrap_or(false) {
        // already authenticated! skip and return token immediately
        let accept = hydra
            .accept_consent(
                &challenge,
                json!({
                    "grant_scope": consent_request["requested_scope"],
                    // The session allows us to set session data for id
                    // and access tokens; nothing to add on the skip path.
                    "session": {},
                }),
                cookie.as_deref(),
            )
            .await?;

        return redirect_with_csrf(redirect_field(&accept)?, cookie.as_deref());
    }

    Ok(Json(json!({
        "type": "consent",
        "challenge": challenge,
        "requested_scope": consent_request["requested_scope"],
        "subject": consent_request["subject"],
        "client": consent_request["client"],
        "csrf": token,
    }))
    .into_response())
}

#[utoipa::path(
    post,
    path = "/@consent",
    request_body = SubmitConsent,
    responses(
        (status = 302, description = "Scopes granted; redirect to hydra"),
        (status = 400, description = "Admin URL not configured"),
        (status = 401, description = "Unknown subject or subject mismatch"),
    ),
    tag = "consent"
)]
pub async fn submit(
    headers: HeaderMap,
    Extension(hydra): Extension<Option<HydraClient>>,
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<SubmitConsent>,
) -> Result<Response, ApiError> {
    let hydra = require_hydra(&hydra)?;

    let token = csrf::extract(payload.csrf.as_deref(), &headers);
    let cookie = token.as_deref().map(csrf::cookie_header);

    // The request body names a subject, but hydra's challenge record is the
    // authority; a mismatch means someone is substituting identities.
    let consent_request = hydra
        .get_consent(&payload.challenge, cookie.as_deref())
        .await?;
    if consent_request["subject"].as_str() != Some(payload.subject.as_str()) {
        return Err(ApiError::Unauthorized);
    }

    let user = storage::find_user(&pool, UserColumn::Id, &payload.subject)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let accept = hydra
        .accept_consent(
            &payload.challenge,
            json!({
                "grant_scope": payload.requested_scope,
                // The session allows us to set session data for id
                // and access tokens
                "session": {
                    "access_token": {
                        "username": user.username,
                    },
                    "id_token": {
                        "username": user.username,
                        "email": user.email,
                        "phone": user.phone,
                        "data": user.data,
                    },
                },
                "remember": payload.remember.unwrap_or(false),
                "remember_for": 3600,
            }),
            cookie.as_deref(),
        )
        .await?;

    redirect_with_csrf(redirect_field(&accept)?, cookie.as_deref())
}

#[utoipa::path(
    delete,
    path = "/@consent",
    request_body = DenyConsent,
    responses(
        (status = 200, description = "Challenge rejected; hydra's answer passed through"),
        (status = 400, description = "Admin URL not configured"),
    ),
    tag = "consent"
)]
pub async fn deny(
    headers: HeaderMap,
    Extension(hydra): Extension<Option<HydraClient>>,
    Json(payload): Json<DenyConsent>,
) -> Result<Response, ApiError> {
    let hydra = require_hydra(&hydra)?;

    let token = csrf::extract(payload.csrf.as_deref(), &headers);
    let cookie = token.as_deref().map(csrf::cookie_header);

    let rejected = hydra
        .reject_consent(&payload.challenge, cookie.as_deref())
        .await?;

    Ok(Json(rejected).into_response())
}
