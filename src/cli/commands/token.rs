use clap::Subcommand;
use serde_json::json;

use crate::auth::{AuthServices, Claims, TokenKind};
use crate::cli::{
    utils::{load_config, output_success, output_value},
    OutputFormat,
};

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue a signed token")]
    Issue {
        #[arg(long, help = "Subject (user id)")]
        sub: String,
        #[arg(long = "role", help = "Role to grant (repeatable)")]
        roles: Vec<String>,
        #[arg(long = "permission", help = "Permission to grant (repeatable)")]
        permissions: Vec<String>,
        #[arg(long, help = "Issue a refresh token instead of an access token")]
        refresh: bool,
    },

    #[command(about = "Verify an access token and print its claims")]
    Verify {
        #[arg(help = "Token to verify")]
        token: String,
        #[arg(long, help = "Expect a refresh token")]
        refresh: bool,
    },
}

pub fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config()?;
    let auth = AuthServices::from_config(&config.security)?;

    match cmd {
        TokenCommands::Issue {
            sub,
            roles,
            permissions,
            refresh,
        } => {
            let (kind, ttl) = if refresh {
                (TokenKind::Refresh, auth.tokens.refresh_ttl())
            } else {
                (TokenKind::Access, auth.tokens.access_ttl())
            };
            let claims = Claims::new(sub).with_roles(roles).with_permissions(permissions);
            let token = auth.tokens.issue(claims, kind, ttl)?;
            output_value(output_format, "token", token.as_str())
        }
        TokenCommands::Verify { token, refresh } => {
            let kind = if refresh { TokenKind::Refresh } else { TokenKind::Access };
            let claims = auth.tokens.verify(&token, kind)?;
            output_success(output_format, "Token is valid", Some(json!({ "claims": claims })))
        }
    }
}
