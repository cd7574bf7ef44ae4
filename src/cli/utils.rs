use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::database::record::Record;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    let mut response = json!({
        "success": true,
        "message": message
    });
    if let Some(data) = data {
        response["data"] = data;
    }

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&response)?),
        OutputFormat::Text => println!("✓ {}", message),
    }
    Ok(())
}

/// Structured value as JSON or YAML; `text` is used for the text format
pub fn output_value<T: Serialize>(output_format: OutputFormat, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}

/// Records as a table of the given columns, or as a JSON/YAML list
pub fn output_records(output_format: OutputFormat, records: &[Record], columns: &[&str]) -> anyhow::Result<()> {
    output_value(output_format, &records, || {
        if records.is_empty() {
            println!("No records");
            return;
        }

        let header: Vec<String> = columns.iter().map(|c| format!("{:<24}", c.to_uppercase())).collect();
        println!("{}", header.join(" "));
        println!("{}", "-".repeat(25 * columns.len()));
        for record in records {
            let row: Vec<String> = columns
                .iter()
                .map(|c| format!("{:<24}", truncate(&cell(record.get(c)), 24)))
                .collect();
            println!("{}", row.join(" "));
        }
    })
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
