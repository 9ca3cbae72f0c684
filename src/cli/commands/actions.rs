use clap::Subcommand;

use crate::cli::client::ApiClient;
use crate::cli::state::load_state;
use crate::cli::utils::{output_data, read_payload};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ActionCommands {
    #[command(about = "Apply skill actions (add/update/delete/replace) to a job")]
    Skills {
        #[arg(help = "Job ID")]
        job_id: String,
        #[arg(long, short, help = "Action list file ('-' for stdin)")]
        file: Option<String>,
    },

    #[command(about = "Apply question actions (add/update/delete/replace) to a job")]
    Questions {
        #[arg(help = "Job ID")]
        job_id: String,
        #[arg(long, short, help = "Action list file ('-' for stdin)")]
        file: Option<String>,
    },
}

pub async fn handle(cmd: ActionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::from_state(&load_state()?)?;

    let (job_id, target, file) = match cmd {
        ActionCommands::Skills { job_id, file } => (job_id, "skills", file),
        ActionCommands::Questions { job_id, file } => (job_id, "questions", file),
    };
    let body = read_payload(file.as_deref())?;
    let data = client.put(&format!("/api/v1/jobs/{}/{}", job_id, target), &body).await?;
    output_data(
        &output_format,
        &format!("{} operation(s) applied to {} of job {}", data["total"], target, job_id),
        &data,
    )
}
