pub mod embedder;
pub mod generator;

pub use embedder::{Embedder, GeminiEmbedder};
pub use generator::{GeminiGenerator, TextGenerator};
