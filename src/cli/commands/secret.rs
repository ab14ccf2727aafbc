use clap::Subcommand;
use serde_json::json;

use crate::auth::{generate_api_key, generate_password, CredentialVerifier, PasswordPolicy};
use crate::cli::{
    utils::{load_config, output_success, output_value},
    OutputFormat,
};

#[derive(Subcommand)]
pub enum SecretCommands {
    #[command(about = "Hash a secret with bcrypt")]
    Hash {
        #[arg(help = "Secret to hash")]
        secret: String,
    },

    #[command(about = "Check a secret against a bcrypt digest")]
    Verify {
        #[arg(help = "Secret to check")]
        secret: String,
        #[arg(help = "bcrypt digest")]
        digest: String,
    },

    #[command(about = "Generate a random API key")]
    ApiKey,

    #[command(about = "Generate a random password")]
    Password {
        #[arg(long, default_value_t = 16, help = "Password length")]
        length: usize,
        #[arg(long, help = "Leave symbols out of the alphabet")]
        no_symbols: bool,
    },
}

pub async fn handle(cmd: SecretCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SecretCommands::Hash { secret } => {
            let verifier = verifier()?;
            let digest = verifier.hash_async(secret).await?;
            output_value(output_format, "digest", &digest)
        }
        SecretCommands::Verify { secret, digest } => {
            let matches = verifier()?.verify_async(secret, digest).await;
            if !matches {
                anyhow::bail!("secret does not match digest");
            }
            output_success(output_format, "Secret matches digest", Some(json!({ "matches": true })))
        }
        SecretCommands::ApiKey => output_value(output_format, "api_key", &generate_api_key()?),
        SecretCommands::Password { length, no_symbols } => {
            let policy = PasswordPolicy {
                length,
                symbols: !no_symbols,
                ..PasswordPolicy::default()
            };
            output_value(output_format, "password", &generate_password(&policy)?)
        }
    }
}

fn verifier() -> anyhow::Result<CredentialVerifier> {
    let config = load_config()?;
    Ok(CredentialVerifier::new(config.security.bcrypt_cost)?)
}
