use anyhow::Result;
use kernel_connectors_common::{ChatCompletionService, ChatHistory, PromptExecutionSettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::knowledge_service::KnowledgeService;

const CONTEXT_RESULTS: usize = 3;

/// Non-system messages kept per session.
const HISTORY_LIMIT: usize = 20;

type Session = Arc<Mutex<ChatHistory>>;

/// Chat sessions over a configured chat service, grounded on the knowledge base when one is set.
///
/// Turns within one session run one at a time; different sessions run concurrently.
pub struct ChatService {
    chat: Arc<dyn ChatCompletionService>,
    knowledge: Option<Arc<KnowledgeService>>,
    settings: PromptExecutionSettings,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl ChatService {
    pub fn new(chat: Arc<dyn ChatCompletionService>) -> Self {
        Self {
            chat,
            knowledge: None,
            settings: PromptExecutionSettings::new().with_max_tokens(800).with_temperature(0.7),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_knowledge(mut self, knowledge: Arc<KnowledgeService>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn with_settings(mut self, settings: PromptExecutionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn process_message(&self, message: &str, session_id: &str) -> Result<String> {
        debug!("Processing message for session: {}", session_id);

        let session = self.session(session_id).await;
        let mut history = session.lock().await;

        let mut request = history.clone();
        if let Some(context) = self.retrieve_context(message).await {
            request.add_system_message(context);
        }
        request.add_user_message(message);

        let reply = self
            .chat
            .get_chat_message_content(&request, &self.settings)
            .await?;
        let text = reply.text().to_string();

        // Retrieved context is per turn and stays out of the stored history.
        history.add_user_message(message);
        history.add_message(reply);
        history.truncate_to(HISTORY_LIMIT);

        info!("Generated response for session: {}", session_id);
        Ok(text)
    }

    async fn session(&self, session_id: &str) -> Session {
        if let Some(session) = self.sessions.read().await.get(session_id) {
            return session.clone();
        }
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ChatHistory::with_system_message(system_prompt()))))
            .clone()
    }

    async fn retrieve_context(&self, message: &str) -> Option<String> {
        let knowledge = self.knowledge.as_ref()?;
        match knowledge.search_documents(message, CONTEXT_RESULTS, None).await {
            Ok(matches) if !matches.is_empty() => {
                let notes: Vec<String> = matches
                    .iter()
                    .map(|m| format!("[{}] {}", m.title, m.content))
                    .collect();
                Some(format!(
                    "Relevant notes from the knowledge base:\n{}",
                    notes.join("\n---\n")
                ))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Knowledge lookup failed, answering without context: {}", e);
                None
            }
        }
    }

    pub async fn clear_session(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    pub async fn session_history(&self, session_id: &str) -> Option<ChatHistory> {
        let session = self.sessions.read().await.get(session_id).cloned()?;
        let history = session.lock().await.clone();
        Some(history)
    }
}

fn system_prompt() -> &'static str {
    "You are a helpful personal AI assistant. Keep your responses concise and relevant. \
     When notes from the knowledge base are provided, prefer them and say which note you used. \
     If you don't know something, be honest about it."
}
