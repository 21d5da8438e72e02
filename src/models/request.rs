use serde::{Deserialize, Serialize};

use super::message::{Message, MessageRole};

/// A single entry of the conversation history sent to the inference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMessage {
    pub role: MessageRole,
    pub content: String,
}

impl RequestMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for RequestMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Request body for the streaming inference endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation so far, oldest first, ending with the new user message
    pub messages: Vec<RequestMessage>,
    pub provider: String,
    pub model: String,
    /// Only sent for models that expose a reasoning channel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_reasoning: Option<bool>,
}

impl ChatRequest {
    /// Create a request for the given history.
    pub fn new(
        messages: Vec<RequestMessage>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            provider: provider.into(),
            model: model.into(),
            enable_reasoning: None,
        }
    }

    /// Request the reasoning channel (builder pattern)
    pub fn with_reasoning(mut self, enabled: bool) -> Self {
        self.enable_reasoning = if enabled { Some(true) } else { None };
        self
    }
}

/// Request body for the title endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleRequest {
    pub message: String,
    pub provider: String,
    pub model: String,
}

/// Response from the title endpoint. Either `title` or `error` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TitleResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest::new(
            vec![RequestMessage::new(MessageRole::User, "Hello")],
            "google",
            "gemini-1.5-flash",
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["provider"], "google");
        assert_eq!(json["model"], "gemini-1.5-flash");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert!(json.get("enableReasoning").is_none());
    }

    #[test]
    fn test_chat_request_with_reasoning() {
        let request = ChatRequest::new(vec![], "deepseek", "deepseek-r1-0528").with_reasoning(true);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["enableReasoning"], true);

        let request = request.with_reasoning(false);
        assert!(request.enable_reasoning.is_none());
    }

    #[test]
    fn test_title_response_error_shape() {
        let response: TitleResponse =
            serde_json::from_str(r#"{"error":"Failed to generate title","details":"x"}"#).unwrap();
        assert!(response.title.is_none());
        assert_eq!(response.error.as_deref(), Some("Failed to generate title"));
    }
}
