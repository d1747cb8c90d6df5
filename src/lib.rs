pub mod config;
pub mod db;
pub mod discovery;
pub mod embedder;
pub mod error;
pub mod lifecycle;
pub mod migration;
pub mod pipeline;
pub mod search;
pub mod summariser;

pub use error::{Error, Result};
