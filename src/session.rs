//! In-memory chat transcript driven by a front-end.
//!
//! The session owns the mutable history; every request gets an explicit
//! snapshot of it.

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::client::StreamingClient;
use crate::prompt::SqlContext;
use crate::types::{GenerationOptions, Role, Turn};

/// Reply recorded when no LLM client could be constructed.
pub const NO_CLIENT_MESSAGE: &str =
    "❌ No se pudo conectar con el servidor de IA. Verifica la configuración";

/// Export text for an empty transcript.
pub const EMPTY_EXPORT: &str = "No hay mensajes para exportar";

/// Message counters shown next to the chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub total_messages: usize,
    pub user_messages: usize,
}

/// Ordered chat transcript plus the prompt template used for new questions.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<Turn>,
    context: SqlContext,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different SQL directive for future questions.
    pub fn with_context(mut self, context: SqlContext) -> Self {
        self.context = context;
        self
    }

    pub fn messages(&self) -> &[Turn] {
        &self.messages
    }

    pub fn add_message(&mut self, role: Role, text: impl Into<String>) {
        self.messages.push(Turn::new(role, text));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            total_messages: self.messages.len(),
            user_messages: self.messages.iter().filter(|m| m.is_user()).count(),
        }
    }

    /// Render the transcript as Markdown.
    pub fn export_markdown(&self) -> String {
        if self.messages.is_empty() {
            return EMPTY_EXPORT.to_string();
        }

        let mut export = String::from("# Historial de Chat - MartAI\n\n");
        for (i, message) in self.messages.iter().enumerate() {
            let label = match message.role {
                Role::User => "👤 Usuario",
                Role::Assistant => " 🕵️‍♀️ MartAI",
            };
            export.push_str(&format!("## Mensaje {i} - {label}\n\n"));
            export.push_str(&message.text);
            export.push_str("\n\n---\n\n");
        }
        export
    }

    /// Ask a question and record both sides of the exchange.
    ///
    /// The user turn is recorded first, so the history sent to the model ends
    /// with the question itself. `on_fragment` sees every fragment as it
    /// arrives; the concatenated reply is recorded and returned. Without a
    /// client, [`NO_CLIENT_MESSAGE`] is recorded instead.
    pub async fn respond<F>(
        &mut self,
        client: Option<&StreamingClient>,
        question: &str,
        options: &GenerationOptions,
        mut on_fragment: F,
    ) -> String
    where
        F: FnMut(&str),
    {
        self.add_message(Role::User, question);

        let Some(client) = client else {
            warn!("no LLM client configured");
            self.add_message(Role::Assistant, NO_CLIENT_MESSAGE);
            return NO_CLIENT_MESSAGE.to_string();
        };

        let context = self.context.render(question);
        let mut fragments = client.generate(&context, &self.messages, options);

        let mut reply = String::new();
        while let Some(fragment) = fragments.next().await {
            on_fragment(&fragment);
            reply.push_str(&fragment);
        }

        debug!(chars = reply.len(), "reply recorded");
        self.add_message(Role::Assistant, reply.clone());
        reply
    }
}

/// File name for an exported transcript; `.md` is appended when missing.
pub fn export_file_name(stem: &str) -> String {
    if stem.ends_with(".md") {
        stem.to_string()
    } else {
        format!("{stem}.md")
    }
}
