use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::ponto::{join_token, new};
use anyhow::{anyhow, Result};
use secrecy::ExposeSecret;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            // Fail fast on malformed DSNs instead of at first pool checkout
            let dsn = Url::parse(&dsn)?;

            if globals.allow_registration {
                let key = globals
                    .join_key
                    .as_ref()
                    .ok_or_else(|| anyhow!("--join-key is required with --allow-registration"))?;
                join_token::decode_key(key.expose_secret())?;
            }

            new(port, dsn.to_string(), globals.clone()).await?;
        }
    }

    Ok(())
}
