//! Client error taxonomy for the Batata SDK

/// Error type for Batata client operations against the HTTP v1 wire API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transport failure after retries: {0}")]
    TransportFailure(String),

    #[error("server rejected request: status={status}, body={body}")]
    ServerRejected { status: u16, body: String },

    #[error("config not found: dataId={data_id}, group={group}")]
    NotFound { data_id: String, group: String },

    #[error("failed to parse server response: {0}")]
    ParseFailure(#[from] serde_json::Error),

    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// True for status codes the Dispatcher treats as terminal (no retry).
    pub fn is_client_error(status: u16) -> bool {
        (400..500).contains(&status)
    }

    /// True for status codes the Dispatcher retries against the next server.
    pub fn is_server_error(status: u16) -> bool {
        (500..600).contains(&status)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
