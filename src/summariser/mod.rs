pub mod ollama;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Line prefix the model uses to flag a risky command
pub const SECURITY_MARKER: &str = "SECURITY WARNING:";

/// A chat model that answers a prompt with streamed text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>>;
}

/// Finds a usable model. One call is one attempt; `Ok(None)` means nothing
/// is available yet.
#[async_trait]
pub trait ModelSelector: Send + Sync {
    async fn select(&self) -> Result<Option<Arc<dyn LanguageModel>>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub summary: String,
    pub security_warning: Option<String>,
}

/// Selects a model, retrying while the model host comes up.
pub async fn select_model(
    selector: &dyn ModelSelector,
    attempts: u32,
    delay: Duration,
) -> Result<Arc<dyn LanguageModel>> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match selector.select().await {
            Ok(Some(model)) => {
                log::info!("Using language model {}", model.name());
                return Ok(model);
            }
            Ok(None) => log::debug!("No language model available (attempt {}/{})", attempt, attempts),
            Err(e) => {
                log::debug!("Model selection attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
            }
        }

        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    let reason = match last_error {
        Some(e) => format!("no language model available after {} attempts: {}", attempts, e),
        None => format!("no language model available after {} attempts", attempts),
    };
    Err(Error::Unavailable(reason))
}

/// Asks the model for a one or two sentence summary of a command.
///
/// There is no metadata-derived stand-in: an empty answer is an
/// `EmptyResult` error.
pub async fn summarise(
    model: &dyn LanguageModel,
    label: &str,
    command_type: &str,
    command: &str,
    content: &str,
    max_chars: usize,
) -> Result<Summary> {
    let prompt = build_prompt(label, command_type, command, truncate(content, max_chars));

    let mut stream = model.stream(&prompt).await?;
    let mut response = String::new();
    while let Some(chunk) = stream.next().await {
        response.push_str(&chunk?);
    }

    parse_response(&response).ok_or_else(|| {
        Error::EmptyResult(format!("model {} returned no summary for {}", model.name(), label))
    })
}

/// Cuts text to at most `max_chars` grapheme clusters
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.grapheme_indices(true).nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn build_prompt(label: &str, command_type: &str, command: &str, content: &str) -> String {
    format!(
        "Summarise what the following {command_type} command does in one or two plain sentences.\n\
         If running it writes credentials or secrets, deletes files, modifies system \
         configuration, or downloads and runs untrusted code, put a first line starting with \
         \"{SECURITY_MARKER}\" followed by a short description of the risk, then the summary \
         on the next line. Otherwise reply with the summary only.\n\n\
         Name: {label}\n\
         Command: {command}\n\
         Content:\n{content}\n"
    )
}

/// Splits the model's answer into summary and optional warning. Returns
/// `None` when no summary text remains.
fn parse_response(raw: &str) -> Option<Summary> {
    let mut warning: Option<String> = None;
    let mut summary_lines = Vec::new();

    for line in raw.lines() {
        let stripped = line
            .trim()
            .trim_start_matches(|c: char| c == '*' || c == '⚠' || c == '\u{fe0f}' || c.is_whitespace());
        match strip_marker(stripped) {
            Some(rest) => {
                let rest = rest.trim().trim_start_matches('*').trim();
                if !rest.is_empty() && warning.is_none() {
                    warning = Some(rest.to_string());
                }
            }
            None => {
                if !line.trim().is_empty() {
                    summary_lines.push(line.trim());
                }
            }
        }
    }

    let summary = summary_lines.join(" ");
    if summary.is_empty() {
        return None;
    }
    Some(Summary {
        summary,
        security_warning: warning,
    })
}

fn strip_marker(line: &str) -> Option<&str> {
    let head = line.get(..SECURITY_MARKER.len())?;
    head.eq_ignore_ascii_case(SECURITY_MARKER)
        .then(|| &line[SECURITY_MARKER.len()..])
}
