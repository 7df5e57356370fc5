//! Response validation for the structured translation call.
//!
//! A well-formed completion carries a `function_call` named
//! `handle_translated_text` whose `arguments` string is a JSON object with a
//! `translated_text` string. Each way a response can miss that shape has its
//! own `FormatError` so the caller can decide whether a retry makes sense.

use crate::conversation::HANDLE_TRANSLATED_TEXT;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

/// Fields stay untyped here; `validate` checks their shape.
#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TranslatedArguments {
    translated_text: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("response contained no choices")]
    NoChoices,

    #[error("response has no function call (content: {0:?})")]
    MissingCall(Option<String>),

    #[error("unexpected function call '{0}'")]
    WrongCallName(String),

    #[error("function call arguments are not valid JSON: {0}")]
    UnparseableArguments(String),

    #[error("function call arguments have no 'translated_text' string")]
    MissingField,
}

impl FormatError {
    /// Whether resending the same request may produce a usable answer.
    ///
    /// A structured call that is present but malformed is worth another try.
    /// A model that answered in free text (or not at all) is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FormatError::WrongCallName(_)
            | FormatError::UnparseableArguments(_)
            | FormatError::MissingField => true,
            FormatError::NoChoices | FormatError::MissingCall(_) => false,
        }
    }
}

/// Extract the translated text from a completion response.
pub fn validate(response: &ChatResponse) -> Result<String, FormatError> {
    let choice = response.choices.first().ok_or(FormatError::NoChoices)?;

    let call = choice
        .message
        .function_call
        .as_ref()
        .ok_or_else(|| FormatError::MissingCall(choice.message.content.clone()))?;

    match &call.name {
        Some(Value::String(name)) if name == HANDLE_TRANSLATED_TEXT => {}
        Some(Value::String(name)) => return Err(FormatError::WrongCallName(name.clone())),
        Some(other) => return Err(FormatError::WrongCallName(other.to_string())),
        None => return Err(FormatError::WrongCallName(String::new())),
    }

    let raw = match &call.arguments {
        Some(Value::String(raw)) => raw,
        Some(other) => {
            return Err(FormatError::UnparseableArguments(format!(
                "expected a JSON string, got {}",
                other
            )));
        }
        None => {
            return Err(FormatError::UnparseableArguments(
                "arguments are missing".to_string(),
            ));
        }
    };

    let arguments: TranslatedArguments = serde_json::from_str(raw)
        .map_err(|e| FormatError::UnparseableArguments(e.to_string()))?;

    match arguments.translated_text {
        Some(Value::String(text)) => Ok(text),
        _ => Err(FormatError::MissingField),
    }
}
