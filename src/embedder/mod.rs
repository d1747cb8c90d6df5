pub mod model;

use async_trait::async_trait;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Embedding dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Progress reported while the embedding model is prepared
#[derive(Debug, Clone, PartialEq)]
pub enum LoadProgress {
    Downloading {
        file: String,
        downloaded: u64,
        total: Option<u64>,
    },
    Loading,
    Ready,
}

pub type ProgressFn = dyn Fn(LoadProgress) + Send + Sync;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Best-effort release of model memory. Never fails.
    async fn dispose(&self);
}

/// Wrapper around ONNX Runtime for generating text embeddings
pub struct OnnxEmbedder {
    model: Arc<Mutex<Option<OnnxModel>>>,
}

struct OnnxModel {
    session: ort::session::Session,
    tokenizer: tokenizers::Tokenizer,
    max_tokens: usize,
}

impl OnnxEmbedder {
    /// Loads the model, downloading it into `model_cache_dir` first if needed.
    /// Blocking; callers on the runtime go through `spawn_blocking`.
    pub fn create(model_cache_dir: &Path, on_progress: Option<&ProgressFn>) -> Result<Self> {
        let report = |p: LoadProgress| {
            if let Some(cb) = on_progress {
                cb(p);
            }
        };

        let model_dir = model::ensure_model(model_cache_dir, &report)?;
        report(LoadProgress::Loading);

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        let unavailable = |e: &dyn std::fmt::Display| {
            Error::Unavailable(format!(
                "failed to load ONNX model from {:?}: {}",
                model_path, e
            ))
        };
        let session = ort::session::Session::builder()
            .map_err(|e| unavailable(&e))?
            .with_intra_threads(1)
            .map_err(|e| unavailable(&e))?
            .commit_from_file(&model_path)
            .map_err(|e| unavailable(&e))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::Unavailable(format!("failed to load tokenizer: {}", e)))?;

        report(LoadProgress::Ready);
        log::info!("Embedding model loaded from {:?}", model_dir);

        Ok(Self {
            model: Arc::new(Mutex::new(Some(OnnxModel {
                session,
                tokenizer,
                max_tokens: 256,
            }))),
        })
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = model.lock();
            match guard.as_mut() {
                Some(m) => m.embed(&text),
                None => Err(Error::NotInitialized("embedder")),
            }
        })
        .await
        .map_err(|e| Error::Unavailable(format!("embedding task failed: {}", e)))?
    }

    async fn dispose(&self) {
        if self.model.lock().take().is_some() {
            log::debug!("Embedding model released");
        }
    }
}

impl OnnxModel {
    /// Generates an embedding for the given text. Summaries are short, so
    /// anything past `max_tokens` is cut rather than chunked.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIM]);
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::Unavailable(format!("tokenization failed: {}", e)))?;

        let mut ids = encoding.get_ids().to_vec();
        if ids.len() > self.max_tokens {
            ids.truncate(self.max_tokens - 1);
            ids.push(102); // [SEP]
        }
        let mask = vec![1u32; ids.len()];

        self.embed_tokens(&ids, &mask)
    }

    fn embed_tokens(&mut self, input_ids: &[u32], attention_mask: &[u32]) -> Result<Vec<f32>> {
        let seq_len = input_ids.len();
        let shape = vec![1i64, seq_len as i64];

        let to_tensor = |values: Vec<i64>, name: &str| {
            Tensor::from_array((shape.clone(), values))
                .map_err(|e| Error::Unavailable(format!("failed to create {} tensor: {}", name, e)))
        };
        let input_ids_tensor = to_tensor(input_ids.iter().map(|&x| x as i64).collect(), "input_ids")?;
        let attention_mask_tensor =
            to_tensor(attention_mask.iter().map(|&x| x as i64).collect(), "attention_mask")?;
        let token_type_ids_tensor = to_tensor(vec![0i64; seq_len], "token_type_ids")?;

        let outputs = self
            .session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            })
            .map_err(|e| Error::Unavailable(format!("ONNX inference failed: {}", e)))?;

        // last_hidden_state: [1, seq_len, 384]
        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Unavailable(format!("failed to extract output tensor: {}", e)))?;

        let mask_f32: Vec<f32> = attention_mask.iter().map(|&x| x as f32).collect();
        let pooled = mean_pool_flat(data, &mask_f32, seq_len, EMBEDDING_DIM);

        Ok(l2_normalize(&pooled))
    }
}

/// Mean pooling on a flat f32 slice with shape [1, seq_len, embedding_dim]
fn mean_pool_flat(data: &[f32], mask: &[f32], seq_len: usize, dim: usize) -> Vec<f32> {
    let mut result = vec![0.0f32; dim];
    let mut total_weight = 0.0f32;

    for (i, &w) in mask.iter().enumerate().take(seq_len) {
        total_weight += w;
        let token = &data[i * dim..(i + 1) * dim];
        for (acc, v) in result.iter_mut().zip(token) {
            *acc += v * w;
        }
    }

    if total_weight > 0.0 {
        for val in &mut result {
            *val /= total_weight;
        }
    }

    result
}

fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.iter().map(|x| x / norm).collect()
    } else {
        vec.to_vec()
    }
}
