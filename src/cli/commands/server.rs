use clap::Subcommand;
use serde_json::json;

use crate::cli::client::{ping_server, ApiClient};
use crate::cli::state::{load_state, save_state, SessionAction};
use crate::cli::utils::{output_data, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Register remote server")]
    Add {
        #[arg(help = "Server name")]
        name: String,
        #[arg(help = "Server URL, e.g. http://localhost:3000")]
        url: String,
    },

    #[command(about = "List all servers")]
    List,

    #[command(about = "Switch to server (persistent selection)")]
    Use {
        #[arg(help = "Server name to switch to")]
        name: String,
    },

    #[command(about = "Remove server from registry")]
    Delete {
        #[arg(help = "Server name to delete")]
        name: String,
    },

    #[command(about = "Health check the current server and record the result")]
    Ping,

    #[command(about = "Show server information from API root endpoint")]
    Info,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut state = load_state()?;

    match cmd {
        ServerCommands::Add { name, url } => {
            state.apply(SessionAction::AddServer { name: name.clone(), url })?;
            save_state(&state)?;
            output_success(&output_format, &format!("Server '{}' added", name), None)
        }
        ServerCommands::List => {
            let current = state.current_server.as_deref();
            let servers: Vec<_> = state
                .servers
                .iter()
                .map(|(name, info)| {
                    json!({
                        "name": name,
                        "url": info.url,
                        "status": info.status,
                        "last_ping": info.last_ping,
                        "current": Some(name.as_str()) == current,
                    })
                })
                .collect();
            output_data(&output_format, &format!("{} server(s)", servers.len()), &json!(servers))
        }
        ServerCommands::Use { name } => {
            state.apply(SessionAction::UseServer(name.clone()))?;
            save_state(&state)?;
            output_success(&output_format, &format!("Switched to server '{}'", name), None)
        }
        ServerCommands::Delete { name } => {
            state.apply(SessionAction::RemoveServer(name.clone()))?;
            save_state(&state)?;
            output_success(&output_format, &format!("Server '{}' deleted", name), None)
        }
        ServerCommands::Ping => {
            let (name, info) = state.current()?;
            let name = name.to_string();
            let status = ping_server(info).await;
            state.apply(SessionAction::Pinged { name: name.clone(), status })?;
            save_state(&state)?;
            output_success(
                &output_format,
                &format!("Server '{}' is {:?}", name, status),
                Some(json!({ "status": status })),
            )
        }
        ServerCommands::Info => {
            let data = ApiClient::from_state(&state)?.get("/").await?;
            output_data(&output_format, "Server info", &data)
        }
    }
}
