pub mod health;
pub use self::health::health;

pub mod consent;
pub mod join;
pub mod login;
pub mod users;

// common functions for the handlers
use axum::{
    body::Body,
    http::{header, Response, StatusCode},
};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::ponto::{error::ApiError, hydra::HydraClient};
use crate::APP_USER_AGENT;

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// Challenge endpoints are useless without the admin API; answer 400 before
/// doing any work.
pub(crate) fn require_hydra(hydra: &Option<HydraClient>) -> Result<&HydraClient, ApiError> {
    hydra
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("hydra_admin_url not configured".to_string()))
}

/// The `redirect_to` URL hydra hands back on accept/reject.
pub(crate) fn redirect_field(accept: &Value) -> Result<&str, ApiError> {
    accept["redirect_to"].as_str().ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("hydra response missing redirect_to"))
    })
}

/// 302 to the hub-provided URL, re-setting the CSRF cookie on the browser.
pub(crate) fn redirect_with_csrf(
    redirect_to: &str,
    csrf_cookie: Option<&str>,
) -> Result<Response<Body>, ApiError> {
    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, redirect_to);

    if let Some(cookie) = csrf_cookie {
        builder = builder.header(header::SET_COOKIE, cookie);
    }

    builder
        .body(Body::empty())
        .map_err(|err| ApiError::Internal(err.into()))
}

/// Check a reCAPTCHA response token against the verification service.
#[instrument(skip(secret, token))]
pub async fn verify_recaptcha(secret: &str, token: &str) -> bool {
    verify_recaptcha_at(RECAPTCHA_VERIFY_URL, secret, token).await
}

pub(crate) async fn verify_recaptcha_at(url: &str, secret: &str, token: &str) -> bool {
    let client = match Client::builder().user_agent(APP_USER_AGENT).build() {
        Ok(client) => client,
        Err(e) => {
            error!("Error creating reqwest client: {:?}", e);

            return false;
        }
    };

    match client
        .post(url)
        .query(&[("secret", secret), ("response", token)])
        .send()
        .await
    {
        Ok(response) => match response.json::<Value>().await {
            Ok(body) => {
                let success = body["success"].as_bool().unwrap_or(false);
                if !success {
                    debug!("recaptcha verification refused: {body}");
                }
                success
            }
            Err(e) => {
                error!("Error decoding recaptcha response: {:?}", e);

                false
            }
        },
        Err(e) => {
            error!("Error validating recaptcha: {:?}", e);

            false
        }
    }
}
