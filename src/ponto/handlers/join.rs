//! Self-service registration gate.
//!
//! Exactly one trust path has to succeed: a payload sealed with the shared
//! join key, or a reCAPTCHA check. A valid request only publishes a
//! [`UserJoined`] event; provisioning is asynchronous and not awaited.

use axum::{extract::Extension, Json};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

use crate::cli::globals::GlobalArgs;
use crate::ponto::{
    error::ApiError,
    handlers::{valid_email, verify_recaptcha},
    join::{SharedJoinSink, UserJoined},
    join_token,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub data: Option<Value>,
    pub allowed_scopes: Option<Vec<String>>,
    /// reCAPTCHA response token, trust path (b).
    pub recaptcha: Option<String>,
    /// Sealed payload, trust path (a); replaces the rest of the body.
    pub encrypted: Option<String>,
}

impl JoinRequest {
    fn into_payload(self) -> JoinPayload {
        JoinPayload {
            id: self.id,
            name: self.name,
            password: self.password,
            email: self.email,
            phone: self.phone,
            data: self.data,
            allowed_scopes: self.allowed_scopes,
        }
    }
}

/// Effective identity data, either from the plain body or from a sealed
/// payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub data: Option<Value>,
    pub allowed_scopes: Option<Vec<String>>,
}

#[utoipa::path(
    post,
    path = "/@join",
    request_body = JoinRequest,
    responses(
        (status = 200, description = "Registration queued for provisioning"),
        (status = 400, description = "Missing password or missing/invalid email"),
        (status = 412, description = "Registration disabled or client validation failed"),
    ),
    tag = "join"
)]
pub async fn join(
    Extension(globals): Extension<Arc<GlobalArgs>>,
    Extension(sink): Extension<SharedJoinSink>,
    Json(body): Json<JoinRequest>,
) -> Result<Json<Value>, ApiError> {
    if !globals.allow_registration {
        return Err(ApiError::Precondition(
            "registration is not allowed".to_string(),
        ));
    }

    let key = globals
        .join_key
        .as_ref()
        .map(|key| join_token::decode_key(key.expose_secret()))
        .transpose()?;

    let sealed = body.encrypted.clone().filter(|s| !s.is_empty());
    let recaptcha = body.recaptcha.clone().filter(|s| !s.is_empty());

    let mut payload: Option<JoinPayload> = None;

    if let Some(sealed) = sealed {
        if let Some(key) = &key {
            // A payload that fails to open is merely unvalidated, not fatal.
            match join_token::open::<JoinPayload>(key, &sealed) {
                Ok(decoded) => payload = Some(decoded),
                Err(err) => debug!("sealed join payload rejected: {err}"),
            }
        }
    } else if let Some(secret) = &globals.recaptcha_secret {
        if let Some(token) = recaptcha {
            if verify_recaptcha(secret.expose_secret(), &token).await {
                payload = Some(body.into_payload());
            }
        }
    }

    let Some(mut payload) = payload else {
        return Err(ApiError::Precondition(
            "invalid client validation".to_string(),
        ));
    };

    let email = payload
        .email
        .clone()
        .filter(|email| valid_email(email))
        .ok_or_else(|| ApiError::BadRequest("valid email required".to_string()))?;

    // A passwordless payload would provision an account nobody can log into.
    if payload.password.as_deref().map_or(true, str::is_empty) {
        return Err(ApiError::BadRequest("password required".to_string()));
    }

    let id = payload.id.clone().unwrap_or_else(|| email.clone());
    payload.id = Some(id.clone());

    // The token is redeemed later by the provisioning consumer; it carries
    // the full payload, password included, sealed under the join key.
    let key = key.ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("join key required to mint validation token"))
    })?;
    let validation_token = join_token::seal(&key, &payload)?;

    sink.publish(UserJoined {
        id,
        email,
        name: payload.name.unwrap_or_default(),
        data: payload.data.unwrap_or_else(|| json!({})),
        allowed_scopes: payload.allowed_scopes.unwrap_or_default(),
        validation_token,
    })?;

    Ok(Json(json!({ "status": "ok" })))
}
