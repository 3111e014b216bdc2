use std::sync::Arc;

use chrono::{TimeZone, Utc};
use clap::Subcommand;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::json;

use crate::auth::Claims;
use crate::cli::config::open_token_store;
use crate::cli::utils::{output_principal, output_principals, output_success, resolve_password};
use crate::cli::OutputFormat;
use crate::client::{ApiClient, TokenStore};

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Register new account and start a session")]
    Register {
        #[arg(help = "Username (names containing \"admin\" become administrators)")]
        username: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout from server")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "List user accounts (administrators only)")]
    Users {
        #[arg(long, help = "Role hint sent with the request, e.g. admin")]
        role: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, server: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let tokens: Arc<dyn TokenStore> = Arc::new(open_token_store()?);
    let client = ApiClient::connect(server, tokens.clone())?;

    match cmd {
        AuthCommands::Login { username, password } => {
            let password = resolve_password(password)?;
            let session = client.login(&username, &password).await?;
            output_success(
                &output_format,
                &format!("Logged in as {} ({})", session.principal.username, session.principal.role),
                Some(json!({ "principal": session.principal })),
            )
        }
        AuthCommands::Register { username, password } => {
            let password = resolve_password(password)?;
            let session = client.register(&username, &password).await?;
            output_success(
                &output_format,
                &format!("Registered {} ({})", session.principal.username, session.principal.role),
                Some(json!({ "principal": session.principal })),
            )
        }
        AuthCommands::Logout => {
            client.logout();
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => status(tokens.as_ref(), &output_format),
        AuthCommands::Refresh => {
            client.refresh().await?;
            output_success(&output_format, "Token refreshed", None)
        }
        AuthCommands::Whoami => {
            let principal = client.whoami().await?;
            output_principal(&output_format, &principal)
        }
        AuthCommands::Users { role } => {
            let users = client.users(role.as_deref()).await?;
            output_principals(&output_format, &users)
        }
    }
}

fn status(tokens: &dyn TokenStore, output_format: &OutputFormat) -> anyhow::Result<()> {
    let Some(access_token) = tokens.access_token() else {
        return output_success(output_format, "Not logged in", Some(json!({ "authenticated": false })));
    };

    let expires_at = peek_expiry(&access_token);
    let expired = expires_at.map(|exp| exp <= Utc::now().timestamp()).unwrap_or(false);
    let expires = expires_at
        .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
        .map(|at| at.to_rfc3339());

    let message = match (&expires, expired) {
        (Some(at), true) => format!("Logged in, access token expired at {} (will refresh on next call)", at),
        (Some(at), false) => format!("Logged in, access token valid until {}", at),
        (None, _) => "Logged in".to_string(),
    };

    output_success(
        output_format,
        &message,
        Some(json!({
            "authenticated": true,
            "accessTokenExpired": expired,
            "accessTokenExpiresAt": expires,
            "hasRefreshToken": tokens.refresh_token().is_some(),
        })),
    )
}

/// Read `exp` without the signing secret. Display only.
fn peek_expiry(token: &str) -> Option<i64> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .and_then(|data| data.claims.exp)
}
