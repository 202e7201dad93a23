pub mod chat_completion;
pub mod embedding;
pub mod error;
pub mod registration;
pub mod settings;

pub use chat_completion::OpenAIChatCompletion;
pub use embedding::OpenAIEmbeddingGenerator;
pub use registration::OpenAIKernelBuilderExt;
pub use settings::OpenAISettings;

pub const SERVICE_NAME: &str = "OpenAI";
