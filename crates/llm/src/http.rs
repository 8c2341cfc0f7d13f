use futures::StreamExt;
use reqwest::header::ACCEPT;
use snafu::{ResultExt, ensure};

use super::provider::{
    BackendConfig, BackendResult, BoxFuture, BuildClientSnafu, ByteStream, CHAT_MESSAGE_PATH,
    ChatBackend, ChatRequest, InvalidEndpointSnafu, ReadChunkSnafu, SendRequestSnafu, StatusSnafu,
};

pub const HTTP_BACKEND_ID: &str = "http";

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Streams exchanges from the chat service over HTTP.
pub struct HttpBackend {
    config: BackendConfig,
    client: reqwest::Client,
    message_url: String,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        ensure!(
            config.endpoint.starts_with("http://") || config.endpoint.starts_with("https://"),
            InvalidEndpointSnafu {
                stage: "http-backend-new",
                endpoint: config.endpoint.clone(),
            }
        );

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context(BuildClientSnafu {
                stage: "build-client",
            })?;
        let message_url = format!(
            "{}{}",
            config.endpoint.trim_end_matches('/'),
            CHAT_MESSAGE_PATH
        );

        Ok(Self {
            config,
            client,
            message_url,
        })
    }

    pub fn message_url(&self) -> &str {
        &self.message_url
    }

    async fn send(&self, request: ChatRequest) -> BackendResult<ByteStream> {
        let mut builder = self
            .client
            .post(&self.message_url)
            .header(ACCEPT, EVENT_STREAM_MIME)
            .json(&request);

        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        tracing::debug!(
            url = %self.message_url,
            model = %request.model,
            chat_id = ?request.chat_id,
            "sending chat request"
        );

        let response = builder.send().await.context(SendRequestSnafu {
            stage: "send-chat-request",
        })?;
        let status = response.status();

        if !status.is_success() {
            // The body is only used for the error message; a failed read leaves it empty.
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                url = %self.message_url,
                "chat request rejected by backend"
            );
            return StatusSnafu {
                stage: "chat-http-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.context(ReadChunkSnafu {
                stage: "read-response-chunk",
            })
        });

        Ok(Box::pin(stream))
    }
}

impl ChatBackend for HttpBackend {
    fn name(&self) -> &str {
        HTTP_BACKEND_ID
    }

    fn open_stream<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, BackendResult<ByteStream>> {
        Box::pin(self.send(request))
    }
}
