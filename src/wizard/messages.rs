//! User-facing messages raised while resolving prerequisites

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::request::WizardRequest;

/// Severity of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

/// A message queued for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

/// Receives messages the wizard wants shown to the user
pub trait MessageSink: Send + Sync {
    fn add_message(&self, request: &WizardRequest, level: MessageLevel, message: &str);
}

/// In-memory message store; messages stay queued until taken
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of queued messages
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Remove and return all queued messages
    pub fn take(&self) -> Vec<Message> {
        self.messages
            .lock()
            .map(|mut m| std::mem::take(&mut *m))
            .unwrap_or_default()
    }
}

impl MessageSink for MessageLog {
    fn add_message(&self, _request: &WizardRequest, level: MessageLevel, message: &str) {
        match self.messages.lock() {
            Ok(mut messages) => messages.push(Message {
                level,
                text: message.to_string(),
            }),
            Err(_) => tracing::warn!(text = message, "Message log is poisoned, dropping message"),
        }
    }
}
