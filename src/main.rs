use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kernel_connectors_common::{ChatCompletionService, EmbeddingGenerator, VectorStore};
use kernel_connectors_core::Kernel;
use kernel_connectors_ollama::{
    OllamaChatCompletion, OllamaEmbeddingGenerator, OllamaKernelBuilderExt, OllamaSettings,
};
use kernel_connectors_openai::{
    OpenAIChatCompletion, OpenAIEmbeddingGenerator, OpenAIKernelBuilderExt, OpenAISettings,
};
use kernel_connectors_qdrant::{QdrantKernelBuilderExt, QdrantSettings, QdrantVectorStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

mod chat_service;
mod knowledge_service;

use chat_service::ChatService;
use knowledge_service::{KnowledgeService, DEFAULT_COLLECTION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Provider {
    Ollama,
    Openai,
}

impl Provider {
    fn default_dimensions(self) -> usize {
        match self {
            Provider::Ollama => 768,
            Provider::Openai => 1536,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "connectors-cli", version, about = "Knowledge base and chat over Qdrant, Ollama and OpenAI")]
struct Cli {
    #[arg(long, value_enum, env = "CHAT_PROVIDER", default_value = "ollama")]
    chat_provider: Provider,

    #[arg(long, value_enum, env = "EMBEDDING_PROVIDER", default_value = "ollama")]
    embedding_provider: Provider,

    #[arg(long, env = "KNOWLEDGE_COLLECTION", default_value = DEFAULT_COLLECTION)]
    collection: String,

    /// Vector size of the collection; defaults to what the embedding model reports.
    #[arg(long)]
    dimensions: Option<usize>,

    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the collections in Qdrant
    Collections,
    /// Chunk, embed and store a document
    Ingest {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "cli")]
        source: String,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        text: Option<String>,
    },
    /// Semantic search over stored documents
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Ask a question, grounded on the knowledge base
    Chat {
        message: Option<String>,
        #[arg(long, default_value = "default")]
        session: String,
        #[arg(long)]
        interactive: bool,
    },
    /// Show the configured models
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match &cli.command {
        Command::Collections => {
            let kernel = build_kernel(&cli, false, false)?;
            let store = kernel.get_required_service::<dyn VectorStore>(None)?;
            let mut names = store.list_collection_names().await?;
            names.sort();
            if names.is_empty() {
                println!("No collections in {}", store.store_name());
            }
            for name in names {
                println!("{}", name);
            }
        }
        Command::Ingest {
            title,
            source,
            tags,
            file,
            text,
        } => {
            let content = match (file, text) {
                (Some(path), _) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, Some(text)) => text.clone(),
                (None, None) => bail!("Provide the document text or --file"),
            };

            let kernel = build_kernel(&cli, false, true)?;
            let knowledge = knowledge_service(&cli, &kernel)?;
            knowledge.ensure_collection().await?;
            let response = knowledge
                .store_document(title.clone(), content, source.clone(), tags.clone())
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Search { query, limit, tag } => {
            let kernel = build_kernel(&cli, false, true)?;
            let knowledge = knowledge_service(&cli, &kernel)?;
            let matches = knowledge.search_documents(query, *limit, tag.as_deref()).await?;
            if matches.is_empty() {
                println!("No matches in '{}'", knowledge.collection_name());
            }
            for m in matches {
                println!("{:.3}  {} #{} ({})", m.score, m.title, m.chunk_index, m.source);
                println!("       {}", m.content.replace('\n', " "));
            }
        }
        Command::Chat {
            message,
            session,
            interactive,
        } => {
            let kernel = build_kernel(&cli, true, true)?;
            let chat = kernel.get_required_service::<dyn ChatCompletionService>(None)?;
            let knowledge = knowledge_service(&cli, &kernel)?;
            knowledge.ensure_collection().await?;
            let service = ChatService::new(chat).with_knowledge(Arc::new(knowledge));

            if let Some(message) = message {
                println!("{}", service.process_message(message, session).await?);
            } else if !interactive {
                bail!("Provide a message or --interactive");
            }
            if *interactive {
                run_interactive(&service, session).await?;
            }
        }
        Command::Models => {
            let kernel = build_kernel(&cli, true, true)?;
            for chat in kernel.get_services::<dyn ChatCompletionService>() {
                println!("chat       {} ({})", chat.model_id(), chat.service_name());
            }
            for generator in kernel.get_services::<dyn EmbeddingGenerator>() {
                match generator.dimensions() {
                    Some(dims) => println!("embedding  {} ({} dims)", generator.model_id(), dims),
                    None => println!("embedding  {}", generator.model_id()),
                }
            }

            if cli.chat_provider == Provider::Ollama || cli.embedding_provider == Provider::Ollama {
                let client = OllamaSettings::from_env()?.build_client()?;
                println!("\nAvailable at {}:", client.endpoint());
                for model in client.list_models().await? {
                    println!("  {}", model.name);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kernel_connectors=info,connectors_cli=info,warn".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Registers the Qdrant store plus the chat and embedding services the command needs.
fn build_kernel(cli: &Cli, with_chat: bool, with_embedding: bool) -> Result<Kernel> {
    let mut builder = Kernel::builder()
        .add_qdrant_vector_store(QdrantVectorStore::from_settings(&QdrantSettings::from_env()?)?, None);

    if with_chat {
        builder = match cli.chat_provider {
            Provider::Ollama => builder.add_ollama_chat_completion(
                OllamaChatCompletion::from_settings(&OllamaSettings::from_env()?)?,
                None,
            ),
            Provider::Openai => builder.add_openai_chat_completion(
                OpenAIChatCompletion::from_settings(&OpenAISettings::from_env()?)?,
                None,
            ),
        };
    }

    if with_embedding {
        builder = match cli.embedding_provider {
            Provider::Ollama => builder.add_ollama_embedding_generator(
                ollama_embedding_generator(&OllamaSettings::from_env()?, cli.dimensions)?,
                None,
            ),
            Provider::Openai => builder.add_openai_embedding_generator(
                openai_embedding_generator(&OpenAISettings::from_env()?, cli.dimensions)?,
                None,
            ),
        };
    }

    debug!("Kernel built (chat: {}, embedding: {})", with_chat, with_embedding);
    Ok(builder.build())
}

/// The generator must produce vectors of the size the collection is created with.
fn ollama_embedding_generator(
    settings: &OllamaSettings,
    dimensions: Option<usize>,
) -> Result<OllamaEmbeddingGenerator> {
    let generator = OllamaEmbeddingGenerator::from_settings(settings)?;
    Ok(match dimensions {
        Some(dimensions) => generator.with_dimensions(dimensions),
        None => generator,
    })
}

fn openai_embedding_generator(
    settings: &OpenAISettings,
    dimensions: Option<usize>,
) -> Result<OpenAIEmbeddingGenerator> {
    let generator = OpenAIEmbeddingGenerator::from_settings(settings)?;
    Ok(match dimensions {
        Some(dimensions) => {
            let dimensions = u32::try_from(dimensions).context("--dimensions is out of range")?;
            generator.with_dimensions(dimensions)
        }
        None => generator,
    })
}

fn knowledge_service(cli: &Cli, kernel: &Kernel) -> Result<KnowledgeService> {
    let store = kernel.get_required_service::<QdrantVectorStore>(None)?;
    let embedder = kernel.get_required_service::<dyn EmbeddingGenerator>(None)?;
    let dimensions = cli
        .dimensions
        .or_else(|| embedder.dimensions())
        .unwrap_or_else(|| cli.embedding_provider.default_dimensions());

    info!(
        "Using collection '{}' with {} dimensions ({})",
        cli.collection,
        dimensions,
        embedder.model_id()
    );
    KnowledgeService::new(&store, embedder, &cli.collection, dimensions)
}

async fn run_interactive(service: &ChatService, session: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                service.clear_session(session).await;
                println!("Session cleared");
            }
            message => println!("{}\n", service.process_message(message, session).await?),
        }
    }

    Ok(())
}
