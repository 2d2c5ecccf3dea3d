use crate::ponto::password::HashScheme;
use secrecy::SecretString;

/// Service-wide settings shared by every request handler.
///
/// `hydra_admin_url` stays optional on purpose: the challenge endpoints must
/// answer with a 400 when the admin API is not configured instead of refusing
/// to boot, so operators can run the user-management surface alone.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub hydra_admin_url: Option<String>,
    pub admin_token: SecretString,
    pub allow_registration: bool,
    pub recaptcha_secret: Option<SecretString>,
    pub join_key: Option<SecretString>,
    pub hash_scheme: HashScheme,
    pub pool_size: u32,
    pub pool_min: u32,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(admin_token: SecretString) -> Self {
        Self {
            hydra_admin_url: None,
            admin_token,
            allow_registration: false,
            recaptcha_secret: None,
            join_key: None,
            hash_scheme: HashScheme::default(),
            pool_size: 20,
            pool_min: 2,
        }
    }
}
