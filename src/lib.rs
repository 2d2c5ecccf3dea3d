//! # Ponto (Hydra login & consent provider)
//!
//! `ponto` answers the login and consent challenges issued by an Ory Hydra
//! admin API, validating credentials against a local Postgres user store and
//! telling Hydra whether to accept or reject each challenge.
//!
//! ## Challenge flow
//!
//! Hydra redirects the browser here with a `login_challenge` (or
//! `consent_challenge`) query parameter. Ponto fetches the challenge state
//! from the admin API, auto-accepts when Hydra reports `skip`, and otherwise
//! returns a payload for the frontend to render a credential or scope prompt.
//! Submitted credentials are verified with Argon2id and resolved into a
//! `PUT .../accept` (or `/reject`) call against the admin API.
//!
//! ## CSRF binding
//!
//! Hydra correlates the admin decision with the end-user browser session via
//! the `oauth2_authentication_csrf` cookie. Every admin call re-attaches that
//! cookie as a `Set-Cookie` header so a challenge can only be resolved by the
//! session that started it.
//!
//! ## Registration
//!
//! Self-service registration (`POST /@join`) is gated by either a sealed
//! payload (ChaCha20-Poly1305, pre-shared key) or a reCAPTCHA check, and ends
//! with a `UserJoined` event handed to a sink; account provisioning happens
//! asynchronously outside this service.

pub mod cli;
pub mod ponto;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
