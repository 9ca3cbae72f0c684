use std::io::Read;

use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print an API result: pretty JSON in both modes, prefixed by a summary line in text mode
pub fn output_data(output_format: &OutputFormat, summary: &str, data: &Value) -> anyhow::Result<()> {
    if let OutputFormat::Text = output_format {
        println!("{}", summary);
    }
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Parse a YAML or JSON payload (JSON is valid YAML)
pub fn parse_payload(content: &str) -> anyhow::Result<Value> {
    if content.trim().is_empty() {
        anyhow::bail!("Payload is empty");
    }
    serde_json::from_str(content)
        .or_else(|_| serde_yaml::from_str::<Value>(content))
        .map_err(|e| anyhow::anyhow!("Payload is neither JSON nor YAML: {}", e))
}

/// Payload from `--file <path>`, or stdin when no file is given or the path is `-`
pub fn read_payload(file: Option<&str>) -> anyhow::Result<Value> {
    let content = match file {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path, e))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    parse_payload(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_batches() {
        let payload = parse_payload(
            "user_id: 6f1c2f0e-0000-4000-8000-000000000001\nnew_certificates:\n  - title: AWS SAA\n    issuer: AWS\n",
        )
        .unwrap();
        assert_eq!(payload["new_certificates"][0]["title"], "AWS SAA");
    }

    #[test]
    fn parses_json_and_rejects_empty() {
        assert_eq!(parse_payload(r#"[{"action":"delete","skill_id":"x"}]"#).unwrap()[0]["action"], "delete");
        assert!(parse_payload("  \n").is_err());
    }
}
