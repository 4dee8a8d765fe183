use async_trait::async_trait;
use chatrs_core::{ChatMessage, CompletionStream, Credential, LLMProvider, StreamEvent};
use reqwest::{Client, Response};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Streaming chat completions against any OpenAI-compatible endpoint.
///
/// The provider holds no credential of its own; each call is made with the
/// credential chosen for that attempt.
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(model: String) -> Self {
        info!("Creating OpenAiProvider: model={}", model);
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            max_tokens: 4000,
            temperature: 0.5,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(&self, messages: &[ChatMessage]) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream": true,
        })
    }

    /// Read the event stream and forward deltas until `[DONE]`.
    ///
    /// Anything else that ends the body (transport error, malformed chunk,
    /// provider error event, EOF without `[DONE]`) is forwarded as one `Err`
    /// and no `Done` follows.
    async fn pump(mut response: Response, tx: mpsc::UnboundedSender<anyhow::Result<StreamEvent>>) {
        let mut buffer = SseBuffer::default();
        let mut content = String::new();

        loop {
            let chunk = match response.chunk().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(e.into()));
                    return;
                }
            };

            for payload in buffer.push(&chunk) {
                if payload == "[DONE]" {
                    let _ = tx.send(Ok(StreamEvent::Done(content)));
                    return;
                }

                let value: serde_json::Value = match serde_json::from_str(&payload) {
                    Ok(value) => value,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow::anyhow!("Invalid stream chunk: {e}")));
                        return;
                    }
                };

                if let Some(message) = value["error"]["message"].as_str() {
                    let _ = tx.send(Err(anyhow::anyhow!("Provider error: {message}")));
                    return;
                }

                let delta = value["choices"][0]["delta"]["content"]
                    .as_str()
                    .unwrap_or_default();
                if delta.is_empty() {
                    continue;
                }

                content.push_str(delta);
                if tx.send(Ok(StreamEvent::Delta(delta.to_string()))).is_err() {
                    debug!("Stream receiver dropped, stopping");
                    return;
                }
            }
        }

        warn!(
            "Stream ended without [DONE] marker after {} chars",
            content.chars().count()
        );
        let _ = tx.send(Err(anyhow::anyhow!(
            "Stream ended before the reply was complete"
        )));
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    async fn open_stream(
        &self,
        credential: &Credential,
        messages: &[ChatMessage],
    ) -> anyhow::Result<CompletionStream> {
        let request = self.build_request(messages);

        info!(
            "Sending streaming request: model={}, messages={}, credential={}",
            self.model,
            messages.len(),
            credential.masked()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(credential.api_key())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        debug!("Stream opened: status={}", response.status());

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::pump(response, tx));

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Splits a server-sent-event byte stream into `data:` payloads.
///
/// Bytes are buffered until a blank line closes an event, so multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some((end, sep)) = find_event_end(&self.pending) {
            let raw: Vec<u8> = self.pending.drain(..end + sep).take(end).collect();
            let text = String::from_utf8_lossy(&raw);

            let data: Vec<&str> = text
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim)
                .collect();

            if !data.is_empty() {
                payloads.push(data.join("\n"));
            }
        }
        payloads
    }
}

/// Position and length of the first event separator (`\n\n` or `\r\n\r\n`).
fn find_event_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrs_core::Role;
    use futures::StreamExt;

    fn sse_body(deltas: &[&str]) -> String {
        let mut body = String::new();
        for delta in deltas {
            let chunk = json!({ "choices": [{ "delta": { "content": delta } }] });
            body.push_str(&format!("data: {chunk}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: Role::User,
            content: "hi".to_string(),
        }]
    }

    #[test]
    fn sse_buffer_splits_events() {
        let mut buffer = SseBuffer::default();
        let events = buffer.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n\ntrailing");
        assert_eq!(events, vec!["{\"a\":1}", "{\"b\":2}", "[DONE]"]);
        assert_eq!(buffer.pending, b"trailing");
    }

    #[test]
    fn sse_buffer_handles_split_multibyte_and_crlf() {
        let mut buffer = SseBuffer::default();
        let bytes = "data: héllo\r\n\r\n".as_bytes();
        // Split inside the two-byte 'é'.
        assert!(buffer.push(&bytes[..8]).is_empty());
        assert_eq!(buffer.push(&bytes[8..]), vec!["héllo"]);
    }

    #[test]
    fn sse_buffer_ignores_comments_and_blank_events() {
        let mut buffer = SseBuffer::default();
        let events = buffer.push(b": keep-alive\n\nevent: ping\n\ndata: x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn request_body_is_streaming() {
        let provider = OpenAiProvider::new("gpt-4o-mini".to_string())
            .with_max_tokens(1000)
            .with_temperature(0.5);
        let request = provider.build_request(&messages());
        assert_eq!(request["stream"], true);
        assert_eq!(request["model"], "gpt-4o-mini");
        assert_eq!(request["max_tokens"], 1000);
        assert_eq!(request["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn open_stream_yields_deltas_then_done() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer key-a")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(&["Hel", "lo"]))
            .create_async()
            .await;

        let provider = OpenAiProvider::new("m".to_string()).with_base_url(server.url());
        let stream = provider
            .open_stream(&Credential::new("key-a"), &messages())
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hel".to_string()),
                StreamEvent::Delta("lo".to_string()),
                StreamEvent::Done("Hello".to_string()),
            ]
        );
        mock.assert_async().await;
    }

    fn delta_chunk(delta: &str) -> String {
        let chunk = json!({ "choices": [{ "delta": { "content": delta } }] });
        format!("data: {chunk}\n\n")
    }

    async fn events_for(base_url: String) -> Vec<anyhow::Result<StreamEvent>> {
        let provider = OpenAiProvider::new("m".to_string()).with_base_url(base_url);
        provider
            .open_stream(&Credential::new("key-a"), &messages())
            .await
            .unwrap()
            .collect()
            .await
    }

    async fn events_for_body(body: String) -> Vec<anyhow::Result<StreamEvent>> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;
        events_for(server.url()).await
    }

    fn assert_delta_then_error(events: &[anyhow::Result<StreamEvent>], needle: &str) {
        assert_eq!(events.len(), 2, "expected one delta and one error");
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::Delta("par".to_string())
        );
        let err = events[1].as_ref().unwrap_err().to_string();
        assert!(err.contains(needle), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn error_event_mid_stream_ends_with_err() {
        let body = format!(
            "{}data: {}\n\n",
            delta_chunk("par"),
            json!({ "error": { "message": "model overloaded" } })
        );
        let events = events_for_body(body).await;
        assert_delta_then_error(&events, "model overloaded");
    }

    #[tokio::test]
    async fn malformed_chunk_ends_with_err() {
        let body = format!("{}data: {{not json\n\n", delta_chunk("par"));
        let events = events_for_body(body).await;
        assert_delta_then_error(&events, "Invalid stream chunk");
    }

    #[tokio::test]
    async fn body_without_done_marker_is_incomplete() {
        let events = events_for_body(delta_chunk("par")).await;
        assert_delta_then_error(&events, "before the reply was complete");
    }

    /// Serve one request whose declared body is longer than what is sent,
    /// then close the connection.
    async fn serve_truncated(body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: {}\r\n\r\n",
                body.len() + 100
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= end + 4 + length
    }

    #[tokio::test]
    async fn transport_error_mid_body_ends_with_err() {
        let base_url = serve_truncated(delta_chunk("par")).await;
        let events = events_for(base_url).await;

        let (last, rest) = events.split_last().unwrap();
        assert!(last.is_err());
        assert!(
            rest.iter()
                .all(|e| matches!(e, Ok(StreamEvent::Delta(d)) if d == "par"))
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .create_async()
            .await;

        let provider = OpenAiProvider::new("m".to_string()).with_base_url(server.url());
        let result = provider
            .open_stream(&Credential::new("key-a"), &messages())
            .await;
        assert!(result.is_err());
    }
}
