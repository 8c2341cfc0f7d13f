use std::sync::Arc;

mod http;
mod provider;

pub use http::{HTTP_BACKEND_ID, HttpBackend};
pub use provider::{
    BackendConfig, BackendError, BackendResult, BoxFuture, ByteStream, CHAT_MESSAGE_PATH,
    ChatBackend, ChatRequest, DEFAULT_CONNECT_TIMEOUT,
};

pub fn create_backend(config: BackendConfig) -> BackendResult<Arc<dyn ChatBackend>> {
    Ok(Arc::new(HttpBackend::new(config)?))
}
