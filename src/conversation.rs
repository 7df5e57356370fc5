use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const HANDLE_TRANSLATED_TEXT: &str = "handle_translated_text";

const SYSTEM_PREAMBLE: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: String) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

/// Whether each request starts from a fresh context or extends the previous
/// ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMode {
    #[default]
    Isolated,
    Shared,
}

/// Messages sent with a translation request: the system preamble plus one
/// user message per request.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    mode: ContextMode,
    messages: Vec<Message>,
}

impl ConversationContext {
    pub fn new(mode: ContextMode) -> Self {
        Self {
            mode,
            messages: vec![Message::system(SYSTEM_PREAMBLE)],
        }
    }

    /// Add the user message for the next request and return the messages to
    /// send. In isolated mode earlier user messages are dropped first.
    pub fn push_request(&mut self, content: String) -> &[Message] {
        if self.mode == ContextMode::Isolated {
            self.messages.truncate(1);
        }
        self.messages.push(Message::user(content));
        &self.messages
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

/// Build the user prompt for one entry
pub fn build_translation_prompt(text: &str, source_lang: &str, target_lang: &str) -> String {
    format!(
        "Translate the following {} text to {} (ISO-639-1 code):\n\"{}\".\nUse the {} function to process the translated text.",
        source_lang, target_lang, text, HANDLE_TRANSLATED_TEXT
    )
}

/// Function schema declaring the only structured output the endpoint may use
pub fn translation_functions() -> Value {
    json!([
        {
            "name": HANDLE_TRANSLATED_TEXT,
            "description": "Handle the translated text",
            "parameters": {
                "type": "object",
                "properties": {
                    "translated_text": {
                        "type": "string",
                        "description": "The translated text"
                    }
                },
                "required": ["translated_text"]
            }
        }
    ])
}
