use colored::Colorize;
use serde_json::Value;

use crate::registry::Extractor;

/// Colour the `[scope]` column of formatted command rows.
pub fn render_stream(formatted: &str) -> String {
    formatted
        .lines()
        .map(|line| match (line.find('['), line.find(']')) {
            (Some(open), Some(close)) if open < close => format!(
                "{}{}{}",
                &line[..open],
                line[open..=close].cyan(),
                &line[close + 1..]
            ),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render extractor output as indented `key: value` text, one block per section.
pub fn render_sections(sections: &[(&str, Value)]) -> String {
    let mut out = Vec::new();
    for (name, value) in sections {
        if !out.is_empty() {
            out.push(String::new());
        }
        out.push(format!("{} {}", name.bold(), count_label(value).dimmed()));
        if crate::registry::is_empty_output(value) {
            out.push("  - none".to_string());
        } else {
            render_value(value, 1, &mut out);
        }
    }
    out.join("\n")
}

/// Render the extractor catalogue.
pub fn render_extractors(extractors: &[&Extractor]) -> String {
    let width = extractors.iter().map(|e| e.name.len()).max().unwrap_or(0);
    extractors
        .iter()
        .map(|e| format!("{}  {}", format!("{:<width$}", e.name).bold(), e.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

fn count_label(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("({})", items.len()),
        Value::Null => "(absent)".to_string(),
        _ => String::new(),
    }
}

fn render_value(value: &Value, level: usize, out: &mut Vec<String>) {
    let indent = "  ".repeat(level);
    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        let mut nested = Vec::new();
                        render_value(item, level + 1, &mut nested);
                        // first nested line carries the list marker
                        if let Some(first) = nested.first_mut() {
                            let trimmed = first.trim_start().to_string();
                            *first = format!("{indent}- {trimmed}");
                        }
                        out.extend(nested);
                    }
                    scalar => out.push(format!("{indent}- {}", scalar_text(scalar))),
                }
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                match field {
                    Value::Array(items) if items.is_empty() => {}
                    Value::Array(items) if items.iter().all(is_scalar) => {
                        let joined: Vec<String> = items.iter().map(scalar_text).collect();
                        out.push(format!("{indent}{key}: {}", joined.join(", ")));
                    }
                    Value::Object(_) | Value::Array(_) => {
                        out.push(format!("{indent}{key}:"));
                        render_value(field, level + 1, out);
                    }
                    scalar => out.push(format!("{indent}{key}: {}", scalar_text(scalar))),
                }
            }
        }
        scalar => out.push(format!("{indent}{}", scalar_text(scalar))),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
