pub mod chat_completion;
pub mod client;
pub mod embedding;
pub mod models;
pub mod registration;
pub mod settings;
pub mod text_generation;

pub use chat_completion::OllamaChatCompletion;
pub use client::OllamaClient;
pub use embedding::OllamaEmbeddingGenerator;
pub use registration::OllamaKernelBuilderExt;
pub use settings::OllamaSettings;
pub use text_generation::OllamaTextGeneration;

pub const SERVICE_NAME: &str = "Ollama";
