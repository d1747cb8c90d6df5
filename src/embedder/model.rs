use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::LoadProgress;
use crate::error::{Error, Result};

const MODEL_NAME: &str = "all-MiniLM-L6-v2";

const MODEL_FILES: &[(&str, &str)] = &[
    (
        "model.onnx",
        "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json",
    ),
];

/// Returns the model directory inside the cache
pub fn model_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MODEL_NAME)
}

/// Checks if every model file is already cached
pub fn is_model_downloaded(cache_dir: &Path) -> bool {
    let dir = model_dir(cache_dir);
    MODEL_FILES
        .iter()
        .all(|(filename, _)| dir.join(filename).exists())
}

/// Downloads the model files if not already present
pub fn ensure_model(cache_dir: &Path, on_progress: &dyn Fn(LoadProgress)) -> Result<PathBuf> {
    let dir = model_dir(cache_dir);

    if is_model_downloaded(cache_dir) {
        log::debug!("Model already downloaded at {:?}", dir);
        return Ok(dir);
    }

    log::info!("Downloading embedding model {} into {:?}", MODEL_NAME, dir);
    fs::create_dir_all(&dir)?;

    for (filename, url) in MODEL_FILES {
        let dest = dir.join(filename);
        if dest.exists() {
            log::debug!("{} already exists, skipping", filename);
            continue;
        }

        download_file(url, &dest, filename, on_progress)?;
    }

    Ok(dir)
}

/// Streams one file to disk. The partial file is written next to the
/// destination and renamed on completion, so an interrupted download is
/// never mistaken for a cached model.
fn download_file(
    url: &str,
    dest: &Path,
    file: &str,
    on_progress: &dyn Fn(LoadProgress),
) -> Result<()> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| Error::Unavailable(format!("failed to download {}: {}", url, e)))?;

    let total = response
        .header("content-length")
        .and_then(|s| s.parse::<u64>().ok());

    let partial = dest.with_extension("part");
    let mut out = fs::File::create(&partial)?;

    let mut reader = response.into_reader();
    let mut buffer = [0u8; 8192];
    let mut downloaded = 0u64;
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        out.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        on_progress(LoadProgress::Downloading {
            file: file.to_string(),
            downloaded,
            total,
        });
    }

    out.flush()?;
    fs::rename(&partial, dest)?;
    Ok(())
}
