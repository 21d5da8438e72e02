//! Streaming inference client.
//!
//! POSTs a [`ChatRequest`] and yields decoded [`StreamPart`]s as the body
//! arrives.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use futures::{stream, Stream};
use futures_util::StreamExt;

use crate::error::StreamError;
use crate::models::ChatRequest;
use crate::stream::{StreamDecoder, StreamPart, StreamProtocol};
use crate::traits::{json_headers, ByteStream, HttpClient};

/// Decoded response parts. Ends after the first error.
pub type PartStream = Pin<Box<dyn Stream<Item = Result<StreamPart, StreamError>> + Send>>;

struct DecodeState {
    body: ByteStream,
    decoder: StreamDecoder,
    ready: VecDeque<StreamPart>,
    finished: bool,
}

/// Client for the streaming chat endpoint.
#[derive(Clone)]
pub struct InferenceClient {
    http: Arc<dyn HttpClient>,
    url: String,
    protocol: StreamProtocol,
}

impl InferenceClient {
    pub fn new(http: Arc<dyn HttpClient>, url: impl Into<String>, protocol: StreamProtocol) -> Self {
        Self {
            http,
            url: url.into(),
            protocol,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the stream. A non-2xx status fails here, before any part.
    pub async fn open_stream(&self, request: &ChatRequest) -> Result<PartStream, StreamError> {
        let body = serde_json::to_string(request).map_err(|e| StreamError::Request {
            message: e.to_string(),
        })?;

        tracing::debug!(
            url = %self.url,
            provider = %request.provider,
            model = %request.model,
            history = request.messages.len(),
            "opening inference stream"
        );
        let bytes = self.http.post_stream(&self.url, &body, &json_headers()).await?;

        let state = DecodeState {
            body: bytes,
            decoder: StreamDecoder::new(self.protocol),
            ready: VecDeque::new(),
            finished: false,
        };

        let parts = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(part) = state.ready.pop_front() {
                    return Some((Ok(part), state));
                }
                if state.finished {
                    return None;
                }

                let decoded = match state.body.next().await {
                    Some(Ok(chunk)) => state.decoder.feed(&chunk),
                    Some(Err(err)) => {
                        state.finished = true;
                        return Some((Err(StreamError::from(err)), state));
                    }
                    None => {
                        state.finished = true;
                        state.decoder.finish()
                    }
                };

                match decoded {
                    Ok(parts) => state.ready.extend(parts),
                    Err(err) => {
                        state.finished = true;
                        state.ready.clear();
                        return Some((Err(err), state));
                    }
                }
            }
        });

        Ok(Box::pin(parts))
    }
}
