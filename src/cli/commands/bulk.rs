use clap::Subcommand;

use crate::cli::client::ApiClient;
use crate::cli::state::load_state;
use crate::cli::utils::{output_data, read_payload};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum BulkCommands {
    #[command(about = "Create many records in one transaction ({items: [...]} or a bare array)")]
    Create {
        #[arg(help = "Entity name")]
        entity: String,
        #[arg(long, short, help = "Payload file ('-' for stdin)")]
        file: Option<String>,
    },

    #[command(about = "Apply new_/updated_/deleted_ lists for one parent in one transaction")]
    Sync {
        #[arg(help = "Entity name")]
        entity: String,
        #[arg(long, short, help = "Payload file ('-' for stdin)")]
        file: Option<String>,
    },
}

pub async fn handle(cmd: BulkCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::from_state(&load_state()?)?;

    match cmd {
        BulkCommands::Create { entity, file } => {
            let body = read_payload(file.as_deref())?;
            let data = client.post(&format!("/api/v1/{}/bulk", entity), &body).await?;
            output_data(&output_format, &format!("Created {} {} record(s)", data["created"], entity), &data)
        }
        BulkCommands::Sync { entity, file } => {
            let body = read_payload(file.as_deref())?;
            let data = client.put(&format!("/api/v1/{}/bulk", entity), &body).await?;
            let summary = format!(
                "{}: {} created, {} updated, {} deleted",
                entity, data["created"], data["updated"], data["deleted"]
            );
            output_data(&output_format, &summary, &data)
        }
    }
}
