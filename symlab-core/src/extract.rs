//! Symphony discovery from locally archived Discord export files.
//!
//! Exports are JSON documents with a `messages` array; messages carry embeds,
//! and embeds whose URL points at `app.composer.trade/symphony` identify one
//! symphony each. Individual malformed messages or embeds are skipped with a
//! warning; a file that is not a valid export is an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::symphony_id_from_url;

/// Metadata for one discovered symphony. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymphonyRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub timestamp: String,
    pub author: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read export directory {dir}: {source}")]
    ReadDir {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read export file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("export file {path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("export file {path} has no 'messages' array")]
    MissingMessages { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    author: Option<MessageAuthor>,
    #[serde(default)]
    embeds: Vec<Embed>,
}

#[derive(Debug, Deserialize)]
struct MessageAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Embed {
    url: Option<String>,
    title: Option<String>,
    timestamp: Option<String>,
    #[serde(default)]
    fields: Vec<EmbedField>,
}

#[derive(Debug, Deserialize)]
struct EmbedField {
    name: Option<String>,
    value: Option<String>,
}

/// Extract symphony records from every `.json` export file in a directory.
///
/// Files are visited in sorted filename order and their results merged with
/// last-write-wins semantics on id collision. Re-running over an unchanged
/// directory yields an identical mapping.
pub fn extract_symphonies(dir: &Path) -> Result<BTreeMap<String, SymphonyRecord>, ExtractError> {
    let entries = fs::read_dir(dir).map_err(|source| ExtractError::ReadDir {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut merged = BTreeMap::new();
    for path in &files {
        let records = extract_file(path)?;
        // later files overwrite earlier ones on key collision
        merged.extend(records);
    }

    info!(
        files = files.len(),
        symphonies = merged.len(),
        "export extraction complete"
    );
    Ok(merged)
}

/// Extract symphony records from a single export file.
pub fn extract_file(path: &Path) -> Result<BTreeMap<String, SymphonyRecord>, ExtractError> {
    let raw = fs::read_to_string(path).map_err(|source| ExtractError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Value = serde_json::from_str(&raw).map_err(|source| ExtractError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;

    let messages = doc
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::MissingMessages {
            path: path.to_path_buf(),
        })?;

    let mut records = BTreeMap::new();
    for raw_message in messages {
        let message: Message = match serde_json::from_value(raw_message.clone()) {
            Ok(m) => m,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping malformed message");
                continue;
            }
        };

        let message_author = message
            .author
            .and_then(|a| a.name)
            .unwrap_or_else(|| "Unknown".to_string());

        for embed in message.embeds {
            let Some(url) = embed.url else { continue };
            if !url.contains("app.composer.trade/symphony") {
                continue;
            }

            let id = match symphony_id_from_url(&url) {
                Ok(id) => id,
                Err(e) => {
                    warn!(%url, error = %e, "skipping embed with unparseable symphony URL");
                    continue;
                }
            };

            // An embed field named "Author" overrides the message author.
            let author = embed
                .fields
                .iter()
                .find(|f| f.name.as_deref() == Some("Author"))
                .and_then(|f| f.value.clone())
                .unwrap_or_else(|| message_author.clone());

            records.insert(
                id.clone(),
                SymphonyRecord {
                    id,
                    title: embed.title.unwrap_or_else(|| "Unknown Title".to_string()),
                    url,
                    timestamp: embed.timestamp.unwrap_or_default(),
                    author,
                },
            );
        }
    }

    Ok(records)
}
