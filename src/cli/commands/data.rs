use clap::Subcommand;

use crate::cli::client::ApiClient;
use crate::cli::state::load_state;
use crate::cli::utils::{output_data, read_payload};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "List active records, optionally for one parent")]
    List {
        #[arg(help = "Entity name, e.g. companies, job-skills, certificates")]
        entity: String,
        #[arg(long, help = "Parent filter as column=uuid, e.g. company_id=<uuid>")]
        scope: Option<String>,
    },

    #[command(about = "Get one record")]
    Get {
        #[arg(help = "Entity name")]
        entity: String,
        #[arg(help = "Record ID")]
        id: String,
    },

    #[command(about = "Get one page of records (10 per page)")]
    Page {
        #[arg(help = "Entity name")]
        entity: String,
        #[arg(help = "1-based page number")]
        page: String,
        #[arg(long, help = "Parent filter as column=uuid")]
        scope: Option<String>,
    },

    #[command(about = "Create a record from a YAML/JSON file or stdin")]
    Create {
        #[arg(help = "Entity name")]
        entity: String,
        #[arg(long, short, help = "Payload file ('-' for stdin)")]
        file: Option<String>,
    },

    #[command(about = "Update a record from a YAML/JSON file or stdin")]
    Update {
        #[arg(help = "Entity name")]
        entity: String,
        #[arg(help = "Record ID to update")]
        id: String,
        #[arg(long, short, help = "Payload file ('-' for stdin)")]
        file: Option<String>,
    },

    #[command(about = "Soft delete a record")]
    Delete {
        #[arg(help = "Entity name")]
        entity: String,
        #[arg(help = "Record ID to delete")]
        id: String,
    },

    #[command(about = "Companies whose size lies in [low, high]")]
    Size {
        #[arg(long)]
        low: i64,
        #[arg(long)]
        high: i64,
    },

    #[command(about = "Show a user's public portfolio")]
    Portfolio {
        #[arg(help = "Username")]
        username: String,
    },

    #[command(about = "Upload a file to object storage")]
    Upload {
        #[arg(help = "Category, e.g. avatars or resumes")]
        category: String,
        #[arg(help = "File to upload")]
        path: String,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    #[command(about = "Search stock images")]
    Images {
        #[arg(help = "Search terms")]
        query: String,
        #[arg(long)]
        per_page: Option<u32>,
    },
}

fn query_suffix(scope: Option<&str>) -> anyhow::Result<String> {
    match scope {
        None => Ok(String::new()),
        Some(filter) => {
            let (column, value) = filter
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("--scope must look like column=uuid"))?;
            Ok(format!("?{}={}", column.trim(), value.trim()))
        }
    }
}

pub async fn handle(cmd: DataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = ApiClient::from_state(&load_state()?)?;

    match cmd {
        DataCommands::List { entity, scope } => {
            let path = format!("/api/v1/{}{}", entity, query_suffix(scope.as_deref())?);
            let data = client.get(&path).await?;
            let count = data.as_array().map(Vec::len).unwrap_or(0);
            output_data(&output_format, &format!("{} {} record(s)", count, entity), &data)
        }
        DataCommands::Get { entity, id } => {
            let data = client.get(&format!("/api/v1/{}/{}", entity, id)).await?;
            output_data(&output_format, &format!("{} {}", entity, id), &data)
        }
        DataCommands::Page { entity, page, scope } => {
            let path = format!("/api/v1/{}/page/{}{}", entity, page, query_suffix(scope.as_deref())?);
            let data = client.get(&path).await?;
            let summary = format!(
                "Page {} of {} ({} total)",
                data["page"], data["total_pages"], data["total"]
            );
            output_data(&output_format, &summary, &data)
        }
        DataCommands::Create { entity, file } => {
            let body = read_payload(file.as_deref())?;
            let data = client.post(&format!("/api/v1/{}", entity), &body).await?;
            output_data(&output_format, &format!("Created {} {}", entity, data["id"]), &data)
        }
        DataCommands::Update { entity, id, file } => {
            let body = read_payload(file.as_deref())?;
            let data = client.put(&format!("/api/v1/{}/{}", entity, id), &body).await?;
            output_data(&output_format, &format!("Updated {} {}", entity, id), &data)
        }
        DataCommands::Delete { entity, id } => {
            let data = client.delete(&format!("/api/v1/{}/{}", entity, id)).await?;
            output_data(&output_format, &format!("Deleted {} {}", entity, id), &data)
        }
        DataCommands::Size { low, high } => {
            let data = client
                .get(&format!("/api/v1/companies/size?low={}&high={}", low, high))
                .await?;
            output_data(&output_format, &format!("{} company(ies)", data["total"]), &data)
        }
        DataCommands::Portfolio { username } => {
            let data = client.get(&format!("/api/v1/portfolio/{}", username)).await?;
            output_data(&output_format, &format!("Portfolio of {}", username), &data)
        }
        DataCommands::Upload { category, path, content_type } => {
            let ext = std::path::Path::new(&path)
                .extension()
                .and_then(|e| e.to_str())
                .ok_or_else(|| anyhow::anyhow!("{} has no file extension", path))?
                .to_string();
            let bytes = std::fs::read(&path).map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path, e))?;
            let data = client
                .post_bytes(&format!("/api/v1/uploads?category={}&ext={}", category, ext), &content_type, bytes)
                .await?;
            output_data(&output_format, &format!("Uploaded {}", data["key"]), &data)
        }
        DataCommands::Images { query, per_page } => {
            let mut params = url::form_urlencoded::Serializer::new(String::new());
            params.append_pair("query", &query);
            if let Some(n) = per_page {
                params.append_pair("per_page", &n.to_string());
            }
            let data = client.get(&format!("/api/v1/images/search?{}", params.finish())).await?;
            output_data(&output_format, &format!("Images for '{}'", query), &data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_becomes_query_string() {
        assert_eq!(query_suffix(None).unwrap(), "");
        assert_eq!(query_suffix(Some("company_id = abc")).unwrap(), "?company_id=abc");
        assert!(query_suffix(Some("abc")).is_err());
    }
}
