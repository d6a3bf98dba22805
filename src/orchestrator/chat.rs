use super::TutorService;
use crate::{
    error::GatewayError,
    extraction::OperationKind,
    prompts::{self, CHAT_HISTORY_WINDOW},
    schemas::{ChatMessage, ChatResponse},
    store::HistoryEntry,
    Result,
};
use chrono::Utc;
use tracing::info;

impl TutorService {
    /// One conversational turn grounded in the session's document.
    ///
    /// The turn is appended to the session history only after the upstream
    /// call succeeds.
    pub async fn chat(&self, session: &str, message: &ChatMessage) -> Result<ChatResponse> {
        if message.message.trim().is_empty() {
            return Err(GatewayError::validation("Message cannot be empty"));
        }

        let document = self.document(session)?;
        let recent = self.store.recent_history(session, CHAT_HISTORY_WINDOW);
        let prompt = prompts::chat_prompt(&document, &recent, &message.message);

        let reply = self.call_upstream(OperationKind::Chat, prompt).await?;

        let timestamp = Utc::now().to_rfc3339();
        self.store.append_history(
            session,
            HistoryEntry {
                user: message.message.clone(),
                assistant: reply.clone(),
                timestamp: timestamp.clone(),
            },
        );
        info!(session, filename = %document.filename, reply_len = reply.len(), "Chat turn completed");

        Ok(ChatResponse {
            response: reply,
            timestamp,
        })
    }
}
