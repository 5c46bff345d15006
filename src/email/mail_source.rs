//! The mail provider's wire protocol is out of scope (base spec §1); this
//! module specifies only the interface the ingestor consumes, plus an
//! in-memory mock for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct MessageMetadata {
    pub gmail_message_id: String,
    pub gmail_thread_id: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MessageContent {
    pub plain_text: String,
    pub html_text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailSourceError {
    #[error("mail source unavailable: {0}")]
    Unavailable(String),
    #[error("message {0} not found")]
    NotFound(String),
}

/// What the ingestor needs from a mail provider: metadata-only listing
/// (phase 1) and full-body fetch for a specific message (phase 2).
#[async_trait]
pub trait MailSource: Send + Sync {
    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<MessageMetadata>, MailSourceError>;

    async fn fetch_content(&self, gmail_message_id: &str) -> Result<MessageContent, MailSourceError>;
}

/// In-memory mail source for tests (base spec §0.5): a fixed message list
/// and a content map keyed by message id.
pub struct MockMailSource {
    messages: Vec<MessageMetadata>,
    content: std::collections::HashMap<String, MessageContent>,
}

impl MockMailSource {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            content: std::collections::HashMap::new(),
        }
    }

    pub fn with_message(mut self, metadata: MessageMetadata, content: MessageContent) -> Self {
        self.content.insert(metadata.gmail_message_id.clone(), content);
        self.messages.push(metadata);
        self
    }
}

impl Default for MockMailSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailSource for MockMailSource {
    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<MessageMetadata>, MailSourceError> {
        Ok(self.messages.iter().filter(|m| m.date >= since).cloned().collect())
    }

    async fn fetch_content(&self, gmail_message_id: &str) -> Result<MessageContent, MailSourceError> {
        self.content
            .get(gmail_message_id)
            .cloned()
            .ok_or_else(|| MailSourceError::NotFound(gmail_message_id.to_string()))
    }
}
