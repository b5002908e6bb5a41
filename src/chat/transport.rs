//! Core `ChatTransport` trait and `HttpChatTransport` implementation.
//!
//! `HttpChatTransport` speaks either the relay format (`POST {base_url}/chat`
//! with `{"message": …}`, answering `{"reply": …}`) or any OpenAI-compatible
//! `/v1/chat/completions` endpoint. All connection details come from
//! [`ChatConfig`]; nothing is hardcoded.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::chat::history::ChatHistory;
use crate::config::{ChatConfig, ChatProvider};

// ---------------------------------------------------------------------------
// ChatError
// ---------------------------------------------------------------------------

/// Errors that can occur while exchanging a message with the chat endpoint.
///
/// Only [`ChatError::RateLimited`] is retried by the turn controller; every
/// other variant is reported as a failed turn.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    /// The endpoint is throttling requests (HTTP 429).
    #[error("quota exceeded (rate limited)")]
    RateLimited,

    /// The endpoint answered with a non-success status other than 429.
    #[error("chat endpoint returned HTTP {0}")]
    Status(u16),

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// No reply arrived within the configured timeout.
    #[error("chat request timed out")]
    Timeout,

    /// The response body could not be parsed as expected JSON.
    #[error("failed to parse chat response: {0}")]
    Parse(String),

    /// The response carried no usable reply text.
    #[error("chat endpoint returned an empty reply")]
    EmptyResponse,
}

impl ChatError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ChatError::RateLimited)
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Timeout
        } else {
            ChatError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatTransport trait
// ---------------------------------------------------------------------------

/// One request/response exchange with a remote conversational endpoint.
///
/// Implementors must be `Send + Sync` so they can be shared with the tasks
/// the turn controller spawns (`Arc<dyn ChatTransport>`).
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: &str) -> Result<String, ChatError>;
}

// ---------------------------------------------------------------------------
// HttpChatTransport
// ---------------------------------------------------------------------------

/// Sends messages over HTTP according to [`ChatConfig::provider`].
pub struct HttpChatTransport {
    client: reqwest::Client,
    config: ChatConfig,
    history: Mutex<ChatHistory>,
}

impl HttpChatTransport {
    /// Build a transport from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`. A default client is used if the builder fails.
    pub fn from_config(config: &ChatConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            history: Mutex::new(ChatHistory::from_config(&config.history)),
        }
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut req = self.client.post(url).json(body);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn exchange(&self, req: reqwest::RequestBuilder) -> Result<serde_json::Value, ChatError> {
        let response = req.send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ChatError::RateLimited);
        }
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))
    }

    /// Apply the fallback reply to a missing or blank reply field.
    fn reply_or_fallback(&self, reply: Option<&str>) -> Result<String, ChatError> {
        match reply.map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => match &self.config.fallback_reply {
                Some(fallback) => {
                    log::warn!("chat: endpoint returned no reply, using fallback text");
                    Ok(fallback.clone())
                }
                None => Err(ChatError::EmptyResponse),
            },
        }
    }

    async fn send_relay(&self, message: &str) -> Result<String, ChatError> {
        let body = serde_json::json!({ "message": message });
        let json = self.exchange(self.post("/chat", &body)).await?;
        self.reply_or_fallback(json["reply"].as_str())
    }

    async fn send_openai(&self, message: &str) -> Result<String, ChatError> {
        let messages = match self.history.lock() {
            Ok(history) => history.messages(&self.config.system_prompt, message),
            Err(poisoned) => poisoned
                .into_inner()
                .messages(&self.config.system_prompt, message),
        };

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages":    messages,
            "stream":      false,
            "temperature": self.config.temperature,
        });

        let json = self.exchange(self.post("/v1/chat/completions", &body)).await?;
        let reply = self.reply_or_fallback(json["choices"][0]["message"]["content"].as_str())?;

        if let Ok(mut history) = self.history.lock() {
            history.push_exchange(message, reply.clone());
        }
        Ok(reply)
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, message: &str) -> Result<String, ChatError> {
        log::debug!(
            "chat: sending {} chars via {:?}",
            message.len(),
            self.config.provider
        );
        match self.config.provider {
            ChatProvider::Relay => self.send_relay(message).await,
            ChatProvider::OpenAiCompatible => self.send_openai(message).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one canned HTTP response on a loopback port. The join
    /// handle yields the raw request text.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (format!("http://{addr}/api"), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn relay_config(base_url: String) -> ChatConfig {
        ChatConfig {
            base_url,
            timeout_secs: 5,
            ..ChatConfig::default()
        }
    }

    #[tokio::test]
    async fn relay_returns_reply_text() {
        let (url, server) = serve_once("200 OK", r#"{"reply":"Hello! How can I help?"}"#).await;
        let transport = HttpChatTransport::from_config(&relay_config(url));

        let reply = transport.send("hi there").await.unwrap();
        assert_eq!(reply, "Hello! How can I help?");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/chat HTTP/1.1"), "{request}");
        assert!(request.contains(r#"{"message":"hi there"}"#), "{request}");
        assert!(!request.to_ascii_lowercase().contains("authorization"));
    }

    #[tokio::test]
    async fn status_429_is_rate_limited() {
        let (url, _server) = serve_once("429 Too Many Requests", "{}").await;
        let transport = HttpChatTransport::from_config(&relay_config(url));

        let err = transport.send("test").await.unwrap_err();
        assert_eq!(err, ChatError::RateLimited);
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn server_error_is_not_rate_limited() {
        let (url, _server) = serve_once("500 Internal Server Error", "{}").await;
        let transport = HttpChatTransport::from_config(&relay_config(url));

        let err = transport.send("test").await.unwrap_err();
        assert_eq!(err, ChatError::Status(500));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn missing_reply_uses_fallback() {
        let (url, _server) = serve_once("200 OK", r#"{"other":1}"#).await;
        let transport = HttpChatTransport::from_config(&relay_config(url));

        let reply = transport.send("hello").await.unwrap();
        assert_eq!(reply, "Sorry, I didn't get that.");
    }

    #[tokio::test]
    async fn missing_reply_without_fallback_is_error() {
        let (url, _server) = serve_once("200 OK", r#"{"reply":"   "}"#).await;
        let mut config = relay_config(url);
        config.fallback_reply = None;
        let transport = HttpChatTransport::from_config(&config);

        assert_eq!(
            transport.send("hello").await.unwrap_err(),
            ChatError::EmptyResponse
        );
    }

    #[tokio::test]
    async fn invalid_json_is_parse_error() {
        let (url, _server) = serve_once("200 OK", "not json").await;
        let transport = HttpChatTransport::from_config(&relay_config(url));

        assert!(matches!(
            transport.send("hello").await.unwrap_err(),
            ChatError::Parse(_)
        ));
    }

    #[tokio::test]
    async fn connection_refused_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpChatTransport::from_config(&relay_config(format!("http://{addr}")));
        let err = transport.send("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::Request(_)), "{err:?}");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            drop(socket);
        });

        let mut config = relay_config(format!("http://{addr}"));
        config.timeout_secs = 1;
        let transport = HttpChatTransport::from_config(&config);

        assert_eq!(transport.send("hello").await.unwrap_err(), ChatError::Timeout);
    }

    #[tokio::test]
    async fn openai_sends_history_and_bearer_key() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":" Sure! "}}]}"#,
        )
        .await;
        let config = ChatConfig {
            provider: ChatProvider::OpenAiCompatible,
            base_url: url,
            api_key: Some("sk-test".into()),
            timeout_secs: 5,
            ..ChatConfig::default()
        };
        let transport = HttpChatTransport::from_config(&config);

        let reply = transport.send("can you help?").await.unwrap();
        assert_eq!(reply, "Sure!");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/v1/chat/completions HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""role":"system""#));
        assert!(request.contains("can you help?"));

        assert_eq!(transport.history.lock().unwrap().len(), 1);
    }

    #[test]
    fn transport_is_object_safe() {
        let transport: Box<dyn ChatTransport> =
            Box::new(HttpChatTransport::from_config(&ChatConfig::default()));
        drop(transport);
    }
}
