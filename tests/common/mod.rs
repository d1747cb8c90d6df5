#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cmdseek::db::Store;
use cmdseek::discovery::{CommandItem, ContentSource};
use cmdseek::embedder::Embedder;
use cmdseek::lifecycle::{EmbedderLoader, LifecycleManager, StoreOpener};
use cmdseek::summariser::{LanguageModel, ModelSelector};
use cmdseek::{Error, Result};

/// Three npm commands from the same package.json
pub fn sample_commands() -> Vec<CommandItem> {
    let file = PathBuf::from("/workspace/package.json");
    vec![
        CommandItem::new("npm", &file, "build", "npm run build"),
        CommandItem::new("npm", &file, "test", "npm run test"),
        CommandItem::new("npm", &file, "lint", "npm run lint"),
    ]
}

/// Content keyed by command id
pub struct MapContent(pub HashMap<String, String>);

impl MapContent {
    pub fn for_commands(commands: &[CommandItem]) -> Self {
        Self(
            commands
                .iter()
                .map(|c| (c.id.clone(), format!("#!/bin/sh\n{}\n", c.command)))
                .collect(),
        )
    }
}

#[async_trait]
impl ContentSource for MapContent {
    async fn read_content(&self, item: &CommandItem) -> Result<String> {
        self.0
            .get(&item.id)
            .cloned()
            .ok_or_else(|| Error::Io(format!("no content for {}", item.id)))
    }
}

/// Language model that answers every prompt the same way
pub struct FixedModel {
    reply: Result<String>,
    pub calls: AtomicUsize,
}

impl FixedModel {
    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(error: Error) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LanguageModel for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn stream(&self, _prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.reply.clone()?;
        // split the reply so collection across chunks is exercised
        let mid = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
        let chunks = vec![Ok(text[..mid].to_string()), Ok(text[mid..].to_string())];
        Ok(stream::iter(chunks).boxed())
    }
}

/// Selector that always returns the same model, or none
pub struct FixedSelector {
    model: Option<Arc<dyn LanguageModel>>,
    pub attempts: AtomicUsize,
}

impl FixedSelector {
    pub fn with(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model: Some(model),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn none() -> Self {
        Self {
            model: None,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelSelector for FixedSelector {
    async fn select(&self) -> Result<Option<Arc<dyn LanguageModel>>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(self.model.clone())
    }
}

/// Embedder returning one vector for every text
pub struct FixedEmbedder {
    vector: Vec<f32>,
    fail: bool,
    pub calls: AtomicUsize,
    pub disposed: AtomicBool,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            vector,
            fail: false,
            calls: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            vector: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Unavailable("embedding backend down".into()));
        }
        Ok(self.vector.clone())
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// Opens in-memory stores, counting opens; the first `failures` opens fail
pub struct CountingOpener {
    pub opens: AtomicUsize,
    failures: usize,
    delay: Duration,
}

impl CountingOpener {
    pub fn new(delay: Duration) -> Arc<Self> {
        Self::failing_first(0, delay)
    }

    pub fn failing_first(failures: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            opens: AtomicUsize::new(0),
            failures,
            delay,
        })
    }
}

#[async_trait]
impl StoreOpener for CountingOpener {
    async fn open(&self, _root: &Path) -> Result<Store> {
        let n = self.opens.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if n < self.failures {
            return Err(Error::Storage("disk unavailable".into()));
        }
        Store::open_in_memory()
    }
}

/// Hands out a prepared embedder, or fails as if the model were missing
pub struct FixedLoader {
    embedder: Option<Arc<FixedEmbedder>>,
    pub loads: AtomicUsize,
}

impl FixedLoader {
    pub fn with(embedder: Arc<FixedEmbedder>) -> Arc<Self> {
        Arc::new(Self {
            embedder: Some(embedder),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            embedder: None,
            loads: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmbedderLoader for FixedLoader {
    async fn load(&self, _root: &Path) -> Result<Arc<dyn Embedder>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.embedder {
            Some(e) => Ok(e.clone() as Arc<dyn Embedder>),
            None => Err(Error::Unavailable("embedding model not available in this build".into())),
        }
    }
}

pub fn manager(opener: Arc<CountingOpener>, loader: Arc<FixedLoader>) -> LifecycleManager {
    LifecycleManager::new(opener, loader)
}

pub fn root() -> &'static Path {
    Path::new("/workspace")
}
