use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

pub const CHAT_MESSAGE_PATH: &str = "/chat/message";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
}

impl BackendConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into().trim().to_string();
        Self {
            endpoint: endpoint.into().trim().to_string(),
            api_key: (!api_key.is_empty()).then_some(api_key),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Outbound payload for one exchange. The response body is a live event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: String,
    pub chat_id: Option<u64>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: model.into(),
            chat_id: None,
        }
    }

    pub fn with_chat_id(mut self, chat_id: u64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ByteStream = Pin<Box<dyn Stream<Item = BackendResult<Bytes>> + Send + 'static>>;
pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BackendError {
    #[snafu(display("backend endpoint '{endpoint}' is not an http(s) URL"))]
    InvalidEndpoint {
        stage: &'static str,
        endpoint: String,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request failed on `{stage}`, {source}"))]
    SendRequest {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("backend returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("stream read failed on `{stage}`, {source}"))]
    ReadChunk {
        stage: &'static str,
        source: reqwest::Error,
    },
    /// Failure reported by a non-HTTP backend implementation.
    #[snafu(display("transport failed on `{stage}`: {message}"))]
    Transport {
        stage: &'static str,
        message: String,
    },
}

impl BackendError {
    /// Failures that happened before the backend accepted the exchange.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidEndpoint { .. } | Self::BuildClient { .. } | Self::Status { .. }
        )
    }
}

/// Backend collaborator that turns one [`ChatRequest`] into a live response body.
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;
    fn open_stream<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, BackendResult<ByteStream>>;
}
