//! Client session state.
//!
//! Every change goes through [`SessionState::apply`] with a typed
//! [`SessionAction`]; commands load the state, apply actions and save it back
//! to `session.json` in the config directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub url: String,
    pub added_at: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
    Unknown,
}

/// Who the stored token belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A session is bound to the server it was opened against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub server: String,
    pub token: String,
    pub user: SessionUser,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub servers: BTreeMap<String, ServerInfo>,
    pub current_server: Option<String>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    AddServer { name: String, url: String },
    RemoveServer(String),
    UseServer(String),
    Pinged { name: String, status: ServerStatus },
    LoggedIn { token: String, user: SessionUser },
    LoggedOut,
}

impl SessionState {
    /// Apply one action. Invalid transitions (unknown server, login with no
    /// server selected) are errors and leave the state untouched.
    pub fn apply(&mut self, action: SessionAction) -> anyhow::Result<()> {
        match action {
            SessionAction::AddServer { name, url } => {
                let url = url.trim_end_matches('/').to_string();
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("Server URL must start with http:// or https://");
                }
                self.servers.insert(
                    name.clone(),
                    ServerInfo {
                        url,
                        added_at: Utc::now(),
                        last_ping: None,
                        status: ServerStatus::Unknown,
                    },
                );
                if self.current_server.is_none() {
                    self.current_server = Some(name);
                }
            }
            SessionAction::RemoveServer(name) => {
                if self.servers.remove(&name).is_none() {
                    anyhow::bail!("Server '{}' not found", name);
                }
                if self.current_server.as_deref() == Some(name.as_str()) {
                    self.current_server = None;
                }
                if self.session.as_ref().is_some_and(|s| s.server == name) {
                    self.session = None;
                }
            }
            SessionAction::UseServer(name) => {
                if !self.servers.contains_key(&name) {
                    anyhow::bail!("Server '{}' not found", name);
                }
                self.current_server = Some(name);
            }
            SessionAction::Pinged { name, status } => {
                let server = self
                    .servers
                    .get_mut(&name)
                    .ok_or_else(|| anyhow::anyhow!("Server '{}' not found", name))?;
                server.status = status;
                server.last_ping = Some(Utc::now());
            }
            SessionAction::LoggedIn { token, user } => {
                let server = self
                    .current_server
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("No current server set"))?;
                self.session = Some(Session { server, token, user });
            }
            SessionAction::LoggedOut => self.session = None,
        }
        Ok(())
    }

    pub fn current(&self) -> anyhow::Result<(&str, &ServerInfo)> {
        let name = self
            .current_server
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No current server set; run `board server add <name> <url>`"))?;
        let info = self
            .servers
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Server '{}' not found", name))?;
        Ok((name, info))
    }

    /// Token for the current server, if the session belongs to it
    pub fn token(&self) -> Option<&str> {
        let current = self.current_server.as_deref()?;
        self.session
            .as_ref()
            .filter(|s| s.server == current)
            .map(|s| s.token.as_str())
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("BOARD_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("jobboard").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn load_state() -> anyhow::Result<SessionState> {
    let state_file = get_config_dir()?.join("session.json");
    if !state_file.exists() {
        return Ok(SessionState::default());
    }

    let content = fs::read_to_string(state_file)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_state(state: &SessionState) -> anyhow::Result<()> {
    let state_file = get_config_dir()?.join("session.json");
    let content = serde_json::to_string_pretty(state)?;
    fs::write(state_file, content)?;
    Ok(())
}
