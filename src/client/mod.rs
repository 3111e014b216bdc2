pub mod api;
pub mod coordinator;
pub mod tokens;
pub mod transport;

pub use api::ApiClient;
pub use coordinator::{RefreshCoordinator, REFRESH_PATH};
pub use tokens::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use transport::{HttpTransport, InboundResponse, OutboundRequest, Transport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{status}: {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("session expired, log in again")]
    RefreshExhausted,

    #[error("not logged in")]
    NotAuthenticated,

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}
