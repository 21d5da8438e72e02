//! Best-effort conversation titles.

use std::sync::Arc;

use crate::models::{fallback_title, TitleRequest, TitleResponse};
use crate::traits::{json_headers, HttpClient};

/// Asks the title endpoint for a short title, falling back to truncation.
#[derive(Clone)]
pub struct TitleGenerator {
    http: Arc<dyn HttpClient>,
    url: String,
    max_chars: usize,
}

impl TitleGenerator {
    pub fn new(http: Arc<dyn HttpClient>, url: impl Into<String>, max_chars: usize) -> Self {
        Self {
            http,
            url: url.into(),
            max_chars,
        }
    }

    /// Deterministic title for `message`.
    pub fn fallback(&self, message: &str) -> String {
        fallback_title(message, self.max_chars)
    }

    /// Generated title for `message`, or the fallback on any failure.
    pub async fn generate(&self, message: &str, provider: &str, model: &str) -> String {
        match self.request_title(message, provider, model).await {
            Ok(title) => title,
            Err(reason) => {
                tracing::warn!(url = %self.url, %reason, "title generation failed, using fallback");
                self.fallback(message)
            }
        }
    }

    async fn request_title(&self, message: &str, provider: &str, model: &str) -> Result<String, String> {
        let body = serde_json::to_string(&TitleRequest {
            message: message.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
        })
        .map_err(|e| e.to_string())?;

        let response = self
            .http
            .post(&self.url, &body, &json_headers())
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(format!("status {}", response.status));
        }

        let parsed: TitleResponse = response.json().map_err(|e| e.to_string())?;
        if let Some(error) = parsed.error {
            return Err(error);
        }
        let title = parsed
            .title
            .map(|t| clean_title(&t))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "empty title".to_string())?;
        Ok(title)
    }
}

/// Trim whitespace and surrounding quotes the model likes to add.
fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockHttpClient, MockResponse};
    use crate::traits::{HttpError, Response};

    const URL: &str = "http://test/api/gettitle";

    fn generator(http: &MockHttpClient) -> TitleGenerator {
        TitleGenerator::new(Arc::new(http.clone()), URL, 50)
    }

    #[tokio::test]
    async fn test_generated_title_is_cleaned() {
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::Success(Response::new(200, r#"{"title":" \"Greeting Exchange\"\n"}"#)),
        );

        let title = generator(&http).generate("Hello", "google", "gemini-1.5-flash").await;
        assert_eq!(title, "Greeting Exchange");

        let sent = http.get_requests();
        assert_eq!(sent[0].json()["message"], "Hello");
        assert_eq!(sent[0].json()["model"], "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_error_body_falls_back() {
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::Success(Response::new(
                500,
                r#"{"error":"Failed to generate title"}"#,
            )),
        );

        let message = "x".repeat(70);
        let title = generator(&http).generate(&message, "google", "m").await;
        assert_eq!(title, format!("{}...", "x".repeat(50)));
    }

    #[tokio::test]
    async fn test_transport_error_falls_back() {
        let http = MockHttpClient::new();
        http.set_response(
            URL,
            MockResponse::Error(HttpError::ConnectionFailed("refused".to_string())),
        );

        assert_eq!(generator(&http).generate("Hello", "google", "m").await, "Hello");
    }

    #[tokio::test]
    async fn test_blank_title_falls_back() {
        let http = MockHttpClient::new();
        http.set_response(URL, MockResponse::Success(Response::new(200, r#"{"title":"\"\""}"#)));

        assert_eq!(generator(&http).generate("Hello", "google", "m").await, "Hello");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("'Rust Tips'"), "Rust Tips");
        assert_eq!(clean_title("Plain"), "Plain");
    }
}
