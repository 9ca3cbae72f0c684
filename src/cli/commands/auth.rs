use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Role;
use crate::cli::client::ApiClient;
use crate::cli::state::{load_state, save_state, SessionAction, SessionUser};
use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Create an account on the current server and log in")]
    Register {
        #[arg(help = "Email")]
        email: String,
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Display name (defaults to the username)")]
        name: Option<String>,
        #[arg(long, env = "BOARD_PASSWORD", help = "Password")]
        password: String,
        #[arg(long, help = "candidate or recruiter")]
        role: Option<String>,
    },

    #[command(about = "Login to the current server")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, env = "BOARD_PASSWORD", help = "Password")]
        password: String,
        #[arg(long, help = "Keep the session for the long (remember-me) lifetime")]
        remember: bool,
    },

    #[command(about = "Logout and forget the stored token")]
    Logout,

    #[command(about = "Show the stored session")]
    Status,

    #[command(about = "Show current user information from the server")]
    Whoami,
}

/// Session owner from a login/register response body
fn session_user(data: &Value) -> anyhow::Result<(String, SessionUser)> {
    let token = data["token"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Response has no token"))?
        .to_string();
    let user = &data["user"];
    let id = user["id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| anyhow::anyhow!("Response has no user id"))?;
    let role = user["role"].as_str().and_then(Role::parse).unwrap_or(Role::Candidate);
    let expires_at = data["expires_at"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    Ok((
        token,
        SessionUser {
            id,
            username: user["username"].as_str().unwrap_or_default().to_string(),
            role,
            expires_at,
        },
    ))
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut state = load_state()?;

    match cmd {
        AuthCommands::Register { email, username, name, password, role } => {
            let body = json!({
                "email": email,
                "name": name.unwrap_or_else(|| username.clone()),
                "username": username,
                "password": password,
                "role": role,
            });
            let data = ApiClient::from_state(&state)?.post("/api/auth/register", &body).await?;
            let (token, user) = session_user(&data)?;
            let username = user.username.clone();
            state.apply(SessionAction::LoggedIn { token, user })?;
            save_state(&state)?;
            output_success(&output_format, &format!("Registered and logged in as {}", username), None)
        }
        AuthCommands::Login { email, password, remember } => {
            let body = json!({ "email": email, "password": password, "remember": remember });
            let data = ApiClient::from_state(&state)?.post("/api/auth/login", &body).await?;
            let (token, user) = session_user(&data)?;
            let username = user.username.clone();
            state.apply(SessionAction::LoggedIn { token, user })?;
            save_state(&state)?;
            output_success(&output_format, &format!("Logged in as {}", username), None)
        }
        AuthCommands::Logout => {
            // The server only expires its cookie; the local token is what matters here
            if let Err(e) = ApiClient::from_state(&state)?.post("/api/auth/logout", &json!({})).await {
                tracing::debug!("Logout request failed: {}", e);
            }
            state.apply(SessionAction::LoggedOut)?;
            save_state(&state)?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => match &state.session {
            Some(session) => output_data(
                &output_format,
                &format!("Logged in to '{}' as {}", session.server, session.user.username),
                &json!({
                    "server": session.server,
                    "user": session.user,
                }),
            ),
            None => output_success(&output_format, "Not logged in", None),
        },
        AuthCommands::Whoami => {
            let data = ApiClient::from_state(&state)?.get("/api/auth/me").await?;
            output_data(&output_format, "Current user", &data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_session_from_login_response() {
        let id = Uuid::new_v4();
        let (token, user) = session_user(&json!({
            "token": "abc",
            "expires_at": "2026-01-01T00:00:00Z",
            "user": { "id": id.to_string(), "username": "ada", "role": "recruiter" }
        }))
        .unwrap();
        assert_eq!(token, "abc");
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Recruiter);
        assert!(user.expires_at.is_some());
        assert!(session_user(&json!({ "user": {} })).is_err());
    }
}
