//! Stateless producers for exporting document content as a standalone HTML
//! page, plain text or JSON.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use rte_core::markup::{character_count, escape_html, extract_title, plain_text, word_count};
use rte_core::Timestamp;
use serde::Serialize;
use tracing::debug;

const FALLBACK_NAME: &str = "document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Html => "text/html",
            ExportFormat::Text => "text/plain",
            ExportFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Html => "html",
            ExportFormat::Text => "text",
            ExportFormat::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!("unknown export format: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    pub file_name: String,
    pub mime_type: &'static str,
    pub body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonExport<'a> {
    title: &'a str,
    content: &'a str,
    exported_at: Timestamp,
    metadata: JsonMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMetadata {
    word_count: usize,
    character_count: usize,
}

pub fn export(content: &str, format: ExportFormat, now: Timestamp) -> Result<Exported> {
    let title = match extract_title(content) {
        title if title.is_empty() => FALLBACK_NAME.to_string(),
        title => title,
    };

    let body = match format {
        ExportFormat::Html => html_page(content, &title),
        ExportFormat::Text => plain_text(content),
        ExportFormat::Json => {
            let text = plain_text(content);
            let document = JsonExport {
                title: &title,
                content,
                exported_at: now,
                metadata: JsonMetadata {
                    word_count: word_count(&text),
                    character_count: character_count(&text),
                },
            };
            serde_json::to_string_pretty(&document).context("failed to encode JSON export")?
        }
    };

    let file_name = format!("{}.{}", file_stem(&title), format.extension());
    debug!(%format, file_name = %file_name, bytes = body.len(), "exported document");
    Ok(Exported {
        file_name,
        mime_type: format.mime_type(),
        body,
    })
}

/// Titles become file names; path separators and control characters are not
/// allowed through.
fn file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|ch| match ch {
            '/' | '\\' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    if stem.trim_matches(['.', ' ']).is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        stem
    }
}

fn html_page(content: &str, title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            font-family: Georgia, 'Times New Roman', serif;
            line-height: 1.6;
            max-width: 800px;
            margin: 0 auto;
            padding: 2rem;
            color: #333;
        }}
        h1, h2, h3, h4, h5, h6 {{ margin-top: 2rem; margin-bottom: 1rem; }}
        p {{ margin-bottom: 1rem; }}
        ul, ol {{ margin: 1rem 0; padding-left: 2rem; }}
        table {{ border-collapse: collapse; width: 100%; margin: 1rem 0; }}
        table td, table th {{ border: 1px solid #ddd; padding: 8px; }}
        table th {{ background-color: #f2f2f2; }}
        img {{ max-width: 100%; height: auto; }}
    </style>
</head>
<body>
    {content}
</body>
</html>"#,
        title = escape_html(title),
        content = content,
    )
}
