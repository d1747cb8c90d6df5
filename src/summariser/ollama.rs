use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{LanguageModel, ModelSelector};
use crate::error::{Error, Result};

/// Chat client for an Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ollama reports untagged models as `name:latest`
    fn matches_model(&self, name: &str) -> bool {
        name == self.model
            || (!self.model.contains(':') && name.strip_suffix(":latest") == Some(self.model.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Parses one NDJSON line of a streamed chat response into
/// `(text, done)`. Blank lines yield `None`.
fn parse_chunk(line: &[u8]) -> Result<Option<(String, bool)>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: ChatChunk = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Err(Error::Unavailable(format!("model error: {}", error)));
    }
    let text = chunk.message.map(|m| m.content).unwrap_or_default();
    Ok(Some((text, chunk.done)))
}

#[async_trait]
impl ModelSelector for OllamaClient {
    async fn select(&self) -> Result<Option<Arc<dyn LanguageModel>>> {
        let resp = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| Error::Unavailable(format!("ollama unreachable: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Unavailable(format!(
                "ollama tags request failed ({})",
                resp.status()
            )));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| Error::Parse(format!("bad tags response: {}", e)))?;

        if tags.models.iter().any(|m| self.matches_model(&m.name)) {
            Ok(Some(Arc::new(self.clone())))
        } else {
            log::debug!("Model {} not listed by ollama", self.model);
            Ok(None)
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        let resp = self
            .client
            .post(self.url("/api/chat"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Unavailable(format!("chat request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Unavailable(format!(
                "ollama chat error ({}): {}",
                status, text
            )));
        }

        let (tx, rx) = mpsc::channel::<Result<String>>(64);

        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut buf: Vec<u8> = Vec::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::Unavailable(format!("stream interrupted: {}", e))))
                            .await;
                        return;
                    }
                };
                buf.extend_from_slice(&chunk);

                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    match parse_chunk(&line) {
                        Ok(Some((text, done))) => {
                            if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                                return;
                            }
                            if done {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }

            // final line without a trailing newline
            match parse_chunk(&buf) {
                Ok(Some((text, _))) if !text.is_empty() => {
                    let _ = tx.send(Ok(text)).await;
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
                _ => {}
            }
        });

        let chunks = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(chunks.boxed())
    }
}
