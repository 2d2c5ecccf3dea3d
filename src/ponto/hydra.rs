//! Client for the hydra admin challenge API.
//!
//! All challenge traffic goes through `{admin_url}/oauth2/auth/requests/...`.
//! The `GET` that fetches challenge state must always precede the `PUT` that
//! resolves it; callers hold that ordering, this client only performs single
//! calls. Every call re-attaches the browser's CSRF cookie as a `Set-Cookie`
//! header so hydra can correlate the admin decision with the end-user session.

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::APP_USER_AGENT;

const ADMIN_PREFIX: &str = "/oauth2/auth/requests";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Normalized non-success answer from the admin API.
///
/// `status` is the hub's own status code and is re-raised verbatim. A 404
/// body gets `reason: "invalid configuration"` but keeps the hub's original
/// cause under `hub_status`/`hub_reason`, since a 404 can mean either a
/// misconfigured admin URL or an unknown/expired challenge.
#[derive(Debug)]
pub struct HubError {
    pub status: u16,
    pub body: Value,
}

impl HubError {
    fn transport(err: &reqwest::Error) -> Self {
        Self {
            status: 502,
            body: json!({ "reason": err.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HydraClient {
    base: String,
    http: Client,
}

impl HydraClient {
    /// Build a client for the given admin base URL.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(admin_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build hydra admin client")?;

        Ok(Self {
            base: admin_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}/{}", self.base, ADMIN_PREFIX, path.trim_matches('/'))
    }

    #[instrument(skip(self, body, csrf_cookie))]
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        csrf_cookie: Option<&str>,
    ) -> Result<Value, HubError> {
        let url = self.endpoint(path);

        debug!("hydra admin request: {} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(cookie) = csrf_cookie {
            request = request.header(header::SET_COOKIE, cookie);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| HubError::transport(&err))?;

        let status = response.status();
        if status.as_u16() < 200 || status.as_u16() > 302 {
            let text = response.text().await.unwrap_or_default();
            // Anything but a JSON object gets wrapped so the 404 rewrite
            // below always has a `reason` slot to work with.
            let mut content = match serde_json::from_str::<Value>(&text) {
                Ok(value @ Value::Object(_)) => value,
                _ => json!({ "reason": text }),
            };

            if status == StatusCode::NOT_FOUND {
                if let Some(object) = content.as_object_mut() {
                    if let Some(reason) = object.get("reason").cloned() {
                        object.insert("hub_reason".to_string(), reason);
                    }
                    object.insert("hub_status".to_string(), json!(404));
                    object.insert("reason".to_string(), json!("invalid configuration"));
                }
            }

            return Err(HubError {
                status: status.as_u16(),
                body: content,
            });
        }

        response
            .json()
            .await
            .map_err(|err| HubError::transport(&err))
    }

    /// Fetch the state of a pending login challenge.
    ///
    /// # Errors
    /// Returns a [`HubError`] when the hub answers outside 200..=302 or the
    /// call fails at the transport level.
    pub async fn get_login(
        &self,
        challenge: &str,
        csrf_cookie: Option<&str>,
    ) -> Result<Value, HubError> {
        self.request(
            Method::GET,
            &format!("login/{challenge}"),
            None,
            csrf_cookie,
        )
        .await
    }

    /// Resolve a login challenge; consumes it on the hub side.
    ///
    /// # Errors
    /// See [`Self::get_login`].
    pub async fn accept_login(
        &self,
        challenge: &str,
        body: Value,
        csrf_cookie: Option<&str>,
    ) -> Result<Value, HubError> {
        self.request(
            Method::PUT,
            &format!("login/{challenge}/accept"),
            Some(body),
            csrf_cookie,
        )
        .await
    }

    /// Fetch the state of a pending consent challenge.
    ///
    /// # Errors
    /// See [`Self::get_login`].
    pub async fn get_consent(
        &self,
        challenge: &str,
        csrf_cookie: Option<&str>,
    ) -> Result<Value, HubError> {
        self.request(
            Method::GET,
            &format!("consent/{challenge}"),
            None,
            csrf_cookie,
        )
        .await
    }

    /// Accept a consent challenge with grant scopes and session claims.
    ///
    /// # Errors
    /// See [`Self::get_login`].
    pub async fn accept_consent(
        &self,
        challenge: &str,
        body: Value,
        csrf_cookie: Option<&str>,
    ) -> Result<Value, HubError> {
        self.request(
            Method::PUT,
            &format!("consent/{challenge}/accept"),
            Some(body),
            csrf_cookie,
        )
        .await
    }

    /// Reject a consent challenge; the hub's answer is passed back verbatim.
    ///
    /// # Errors
    /// See [`Self::get_login`].
    pub async fn reject_consent(
        &self,
        challenge: &str,
        csrf_cookie: Option<&str>,
    ) -> Result<Value, HubError> {
        self.request(
            Method::PUT,
            &format!("consent/{challenge}/reject"),
            None,
            csrf_cookie,
        )
        .await
    }
}
