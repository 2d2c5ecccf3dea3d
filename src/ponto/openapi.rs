//! OpenAPI document for the HTTP surface, served at `/docs`.

use utoipa::OpenApi;

use crate::ponto::handlers::{consent, health, join, login, users};
use crate::ponto::storage;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ponto",
        description = "OAuth2 login & consent provider for Ory Hydra"
    ),
    paths(
        health::health,
        login::begin,
        login::submit,
        consent::begin,
        consent::submit,
        consent::deny,
        users::create,
        users::list,
        users::detail,
        users::remove,
        join::join,
    ),
    components(schemas(
        login::SubmitLogin,
        consent::SubmitConsent,
        consent::DenyConsent,
        users::CreateUser,
        users::UserRecord,
        storage::UserSummary,
        join::JoinRequest,
        join::JoinPayload,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_challenge_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/@login"));
        assert!(paths.contains_key("/@consent"));
        assert!(paths.contains_key("/@users"));
        assert!(paths.contains_key("/@users/{userid}"));
        assert!(paths.contains_key("/@join"));
        assert!(paths.contains_key("/health"));
    }
}
