use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config;
use crate::db::Store;
use crate::embedder::{Embedder, OnnxEmbedder, ProgressFn};
use crate::error::{Error, Result};

type InitFuture<T> = Shared<BoxFuture<'static, Result<Arc<T>>>>;

enum Slot<T: ?Sized> {
    Idle,
    InFlight { generation: u64, future: InitFuture<T> },
    Ready(Arc<T>),
}

struct SlotState<T: ?Sized> {
    slot: Slot<T>,
    generation: u64,
}

/// Single-flight cell: idle, initializing (late arrivals await the same
/// future), or ready with a cached handle. A failed initialization leaves
/// the cell idle so the next caller starts over.
pub struct SingleFlight<T: ?Sized> {
    state: Mutex<SlotState<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                slot: Slot::Idle,
                generation: 0,
            }),
        }
    }

    /// Returns the cached value, joins the in-flight initialization, or
    /// starts one with `init`.
    pub async fn get_or_init<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Arc<T>>>,
    {
        let (generation, future) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match &state.slot {
                Slot::Ready(value) => return Ok(Arc::clone(value)),
                Slot::InFlight { generation, future } => (*generation, future.clone()),
                Slot::Idle => {
                    state.generation += 1;
                    let future = init().shared();
                    state.slot = Slot::InFlight {
                        generation: state.generation,
                        future: future.clone(),
                    };
                    (state.generation, future)
                }
            }
        };

        let outcome = future.await;

        // Whoever observes the outcome first settles the slot; a reset in the
        // meantime (dispose) bumps the generation and wins.
        let mut state = self.state.lock();
        let current = matches!(
            &state.slot,
            Slot::InFlight { generation: g, .. } if *g == generation
        );
        if current {
            state.slot = match &outcome {
                Ok(value) => Slot::Ready(Arc::clone(value)),
                Err(e) => {
                    log::debug!("Initialization failed, slot reset: {}", e);
                    Slot::Idle
                }
            };
        }

        outcome
    }

    /// The cached value, if initialization has completed
    pub fn get(&self) -> Option<Arc<T>> {
        match &self.state.lock().slot {
            Slot::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Resets the cell, returning the cached value if there was one.
    /// An initialization still in flight will not be cached when it lands.
    pub fn take(&self) -> Option<Arc<T>> {
        let mut state = self.state.lock();
        state.generation += 1;
        match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::Ready(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens the store for a workspace root.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    async fn open(&self, root: &Path) -> Result<Store>;
}

/// Loads the embedding model.
#[async_trait]
pub trait EmbedderLoader: Send + Sync {
    async fn load(&self, root: &Path) -> Result<Arc<dyn Embedder>>;
}

/// Opens `<root>/.cmdseek/commands.db`
pub struct SqliteOpener;

#[async_trait]
impl StoreOpener for SqliteOpener {
    async fn open(&self, root: &Path) -> Result<Store> {
        Store::open(&config::db_path(root))
    }
}

/// Loads all-MiniLM-L6-v2 from a shared model cache
pub struct OnnxLoader {
    cache_dir: PathBuf,
    on_progress: Option<Arc<ProgressFn>>,
}

impl OnnxLoader {
    pub fn new(cache_dir: PathBuf, on_progress: Option<Arc<ProgressFn>>) -> Self {
        Self {
            cache_dir,
            on_progress,
        }
    }
}

#[async_trait]
impl EmbedderLoader for OnnxLoader {
    async fn load(&self, _root: &Path) -> Result<Arc<dyn Embedder>> {
        let cache_dir = self.cache_dir.clone();
        let on_progress = self.on_progress.clone();

        let embedder = tokio::task::spawn_blocking(move || {
            OnnxEmbedder::create(&cache_dir, on_progress.as_deref())
        })
        .await
        .map_err(|e| Error::Unavailable(format!("model load task failed: {}", e)))??;

        Ok(Arc::new(embedder))
    }
}

/// Holds the only long-lived store and embedder handles of the process.
///
/// Both are created lazily and at most once at a time: concurrent first
/// callers share one in-flight initialization instead of opening the
/// database or loading the model twice.
pub struct LifecycleManager {
    store_opener: Arc<dyn StoreOpener>,
    embedder_loader: Arc<dyn EmbedderLoader>,
    store: SingleFlight<Store>,
    embedder: SingleFlight<dyn Embedder>,
}

impl LifecycleManager {
    pub fn new(store_opener: Arc<dyn StoreOpener>, embedder_loader: Arc<dyn EmbedderLoader>) -> Self {
        Self {
            store_opener,
            embedder_loader,
            store: SingleFlight::new(),
            embedder: SingleFlight::new(),
        }
    }

    /// SQLite store and ONNX embedder with the model cached in `models_dir`
    pub fn with_defaults(models_dir: PathBuf, on_progress: Option<Arc<ProgressFn>>) -> Self {
        Self::new(
            Arc::new(SqliteOpener),
            Arc::new(OnnxLoader::new(models_dir, on_progress)),
        )
    }

    pub async fn init_store(&self, root: &Path) -> Result<Arc<Store>> {
        let opener = Arc::clone(&self.store_opener);
        let root = root.to_path_buf();
        self.store
            .get_or_init(move || {
                async move {
                    log::info!("Opening command store for {:?}", root);
                    opener.open(&root).await.map(Arc::new)
                }
                .boxed()
            })
            .await
    }

    /// The open store; never triggers initialization
    pub fn get_store(&self) -> Result<Arc<Store>> {
        self.store.get().ok_or(Error::NotInitialized("store"))
    }

    pub async fn get_or_create_embedder(&self, root: &Path) -> Result<Arc<dyn Embedder>> {
        let loader = Arc::clone(&self.embedder_loader);
        let root = root.to_path_buf();
        self.embedder
            .get_or_init(move || {
                async move {
                    log::info!("Loading embedding model");
                    loader.load(&root).await
                }
                .boxed()
            })
            .await
    }

    /// Closes the store and frees the model. Idempotent.
    pub async fn dispose_all(&self) {
        if let Some(store) = self.store.take() {
            store.close();
        }
        if let Some(embedder) = self.embedder.take() {
            embedder.dispose().await;
        }
    }
}
