//! Streaming chat endpoint client.
//!
//! Speaks the backend's OpenAI-compatible wire format: a POST with the
//! message list and model id, answered by an SSE stream whose events carry
//! `{"choices": [{"delta": {"content": "..."}}]}` payloads and terminate
//! with the literal sentinel `[DONE]`.

use std::collections::VecDeque;
use std::pin::Pin;

use eventsource_stream::{EventStream, Eventsource};
use futures_util::Stream;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;

use crate::api::{classify_reqwest_error, ApiError, ApiResult};

const CHAT_PATH: &str = "/api/chat";

/// Terminal sentinel sent by the backend when the stream is complete.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One `{role, content}` pair in an outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub role: String,
    pub content: String,
}

impl OutboundMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [OutboundMessage],
    #[serde(rename = "modelId")]
    model_id: &'a str,
    stream: bool,
}

/// Parsed form of one streamed event.
///
/// `Malformed` covers both JSON parse failures and well-formed payloads
/// without delta content; callers treat it as an explicit skip branch
/// rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatDelta {
    /// An incremental content fragment.
    Content(String),
    /// The terminal sentinel.
    Done,
    /// Unusable event payload, to be ignored.
    Malformed,
}

/// Boxed stream of parsed chat events.
pub type ChatDeltaStream = BoxStream<'static, ApiResult<ChatDelta>>;

/// Client for the streaming chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Opens a streaming chat request.
    ///
    /// Returns an error if the open handshake fails (transport error or
    /// non-2xx status); once the stream is open, per-event problems are
    /// reported through the stream items.
    pub async fn stream_chat(
        &self,
        messages: &[OutboundMessage],
        model_id: &str,
    ) -> ApiResult<ChatDeltaStream> {
        let request = ChatRequest {
            messages,
            model_id,
            stream: true,
        };

        let url = format!("{}{}", self.base_url, CHAT_PATH);
        let response = self
            .http
            .post(&url)
            .headers(build_headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &error_body));
        }

        let byte_stream = response.bytes_stream();
        Ok(sse_parser(byte_stream).boxed())
    }
}

fn build_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("text/event-stream"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    headers
}

/// Parses one SSE event payload into a tagged result.
///
/// Shape expected: `{"choices": [{"delta": {"content": "..."}}]}`.
pub fn parse_chat_event(data: &str) -> ChatDelta {
    let trimmed = data.trim();
    if trimmed == DONE_SENTINEL {
        return ChatDelta::Done;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return ChatDelta::Malformed;
    };

    let content = value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|v| v.as_str());

    match content {
        Some(text) => ChatDelta::Content(text.to_string()),
        None => ChatDelta::Malformed,
    }
}

/// SSE parser for the chat endpoint's event stream.
struct ChatSseParser<S> {
    inner: EventStream<S>,
    pending: VecDeque<ChatDelta>,
    saw_done: bool,
}

/// Builds the parser, chaining a blank-line terminator onto the byte
/// stream so the SSE decoder flushes a final event that arrived without
/// its trailing separator.
fn sse_parser<S, E>(
    byte_stream: S,
) -> ChatSseParser<impl Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin + Send>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin + Send,
    E: Send,
{
    let terminated = byte_stream.chain(futures_util::stream::iter([Ok(
        bytes::Bytes::from_static(b"\n\n"),
    )]));
    ChatSseParser {
        inner: terminated.eventsource(),
        pending: VecDeque::new(),
        saw_done: false,
    }
}

impl<S> ChatSseParser<S> {
    fn handle_event_data(&mut self, data: &str) {
        if data.trim().is_empty() {
            return;
        }
        let delta = parse_chat_event(data);
        if delta == ChatDelta::Done {
            self.saw_done = true;
        }
        self.pending.push_back(delta);
    }
}

impl<S, E> Stream for ChatSseParser<S>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ApiResult<ChatDelta>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        loop {
            if let Some(delta) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(delta)));
            }
            if self.saw_done {
                return Poll::Ready(None);
            }

            let inner = Pin::new(&mut self.inner);
            match inner.poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    self.handle_event_data(&event.data);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ApiError::parse(format!(
                        "SSE stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_delta() {
        let delta = parse_chat_event(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#);
        assert_eq!(delta, ChatDelta::Content("Hi".to_string()));
    }

    #[test]
    fn test_parse_done_sentinel() {
        assert_eq!(parse_chat_event("[DONE]"), ChatDelta::Done);
        assert_eq!(parse_chat_event("  [DONE]  "), ChatDelta::Done);
    }

    #[test]
    fn test_parse_invalid_json_is_malformed() {
        assert_eq!(parse_chat_event("{not json"), ChatDelta::Malformed);
    }

    #[test]
    fn test_parse_missing_content_is_malformed() {
        // Well-formed JSON without delta content is also a skip, not an error.
        assert_eq!(
            parse_chat_event(r#"{"choices":[{"delta":{}}]}"#),
            ChatDelta::Malformed
        );
        assert_eq!(parse_chat_event(r#"{"choices":[]}"#), ChatDelta::Malformed);
    }

    #[test]
    fn test_parse_empty_content_is_kept() {
        // An explicit empty string is still a content delta; appending it
        // is a no-op but it must transition the session to Responding.
        assert_eq!(
            parse_chat_event(r#"{"choices":[{"delta":{"content":""}}]}"#),
            ChatDelta::Content(String::new())
        );
    }

    #[tokio::test]
    async fn test_sse_parser_assembles_events() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
            "data: not-json\n\n",
            "data: [DONE]\n\n",
        );
        let byte_stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(
            bytes::Bytes::from_static(body.as_bytes()),
        )]);

        let parser = sse_parser(byte_stream);
        let deltas: Vec<_> = parser.map(|r| r.unwrap()).collect().await;
        assert_eq!(
            deltas,
            vec![
                ChatDelta::Content("A".to_string()),
                ChatDelta::Content("B".to_string()),
                ChatDelta::Malformed,
                ChatDelta::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_sse_parser_flushes_unterminated_final_event() {
        // No trailing separator after the last event.
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
        let byte_stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(
            bytes::Bytes::from_static(body.as_bytes()),
        )]);

        let deltas: Vec<_> = sse_parser(byte_stream).map(|r| r.unwrap()).collect().await;
        assert_eq!(deltas, vec![ChatDelta::Content("tail".to_string())]);
    }
}
