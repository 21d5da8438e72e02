//! Mock HTTP client for testing.
//!
//! Responses are configured per URL; streamed bodies are either canned
//! chunks or driven live from a test through a channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use tokio::sync::mpsc;

use crate::traits::{ByteStream, Headers, HttpClient, HttpError, Response};

/// A recorded request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Headers,
    pub body: String,
    /// Whether the request went through `post_stream`.
    pub streaming: bool,
}

impl RecordedRequest {
    /// Parse the recorded body as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

type ChunkSender = mpsc::UnboundedSender<Result<Bytes, HttpError>>;
type ChunkReceiver = mpsc::UnboundedReceiver<Result<Bytes, HttpError>>;

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Buffered response for `post`.
    Success(Response),
    /// Fail the request before any body is produced.
    Error(HttpError),
    /// Stream these chunks, then end.
    Stream(Vec<Bytes>),
    /// Stream these chunks, then fail with the error.
    StreamThenError(Vec<Bytes>, HttpError),
    /// Stream whatever the test pushes through the paired sender.
    ///
    /// Only the first request gets the receiver; later requests fail.
    Channel(Arc<Mutex<Option<ChunkReceiver>>>),
}

/// Mock HTTP client for testing.
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a response for a URL. Matched exactly, then by prefix.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        lock(&self.responses).insert(url.to_string(), response);
    }

    /// Stream `chunks` for requests to `url`.
    pub fn set_stream(&self, url: &str, chunks: &[&str]) {
        let chunks = chunks.iter().map(|c| Bytes::from(c.to_string())).collect();
        self.set_response(url, MockResponse::Stream(chunks));
    }

    /// Route the body of the next streaming request to `url` through a channel.
    ///
    /// Dropping the returned sender ends the body.
    pub fn set_stream_channel(&self, url: &str) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.set_response(url, MockResponse::Channel(Arc::new(Mutex::new(Some(rx)))));
        tx
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Recorded requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }

    fn record(&self, url: &str, headers: &Headers, body: &str, streaming: bool) {
        lock(&self.requests).push(RecordedRequest {
            url: url.to_string(),
            headers: headers.clone(),
            body: body.to_string(),
            streaming,
        });
    }

    fn response_for(&self, url: &str) -> Option<MockResponse> {
        let responses = lock(&self.responses);
        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }
        responses
            .iter()
            .find(|(pattern, _)| url.starts_with(pattern.as_str()))
            .map(|(_, response)| response.clone())
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.record(url, headers, body, false);

        match self.response_for(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(_) => Err(HttpError::Other(
                "Stream response on non-stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }

    async fn post_stream(
        &self,
        url: &str,
        body: &str,
        headers: &Headers,
    ) -> Result<ByteStream, HttpError> {
        self.record(url, headers, body, true);

        match self.response_for(url) {
            Some(MockResponse::Stream(chunks)) => {
                Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
            }
            Some(MockResponse::StreamThenError(chunks, err)) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(err)))
                    .collect::<Vec<_>>();
                Ok(Box::pin(stream::iter(items)))
            }
            Some(MockResponse::Channel(slot)) => {
                let rx = lock(&slot)
                    .take()
                    .ok_or_else(|| HttpError::Other("Stream channel already consumed".to_string()))?;
                Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })))
            }
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Success(_)) => Err(HttpError::Other(
                "Non-stream response on stream request".to_string(),
            )),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}
