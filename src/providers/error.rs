use std::time::Duration;

const MAX_BODY_IN_ERROR: usize = 256;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("delivery refused: {0}")]
    Refused(String),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),
    #[error("message could not be built: {0}")]
    InvalidContent(String),
    #[error("provider misconfigured: {0}")]
    Config(String),
    #[error("provider panicked: {0}")]
    Panicked(String),
}

impl ProviderError {
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return ProviderError::Timeout(timeout);
        }
        if err.is_decode() {
            return ProviderError::MalformedResponse(err.to_string());
        }
        ProviderError::Transport(err.to_string())
    }

    /// Turns a non-success HTTP response into `Rejected`, keeping a bounded
    /// slice of the body.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_BODY_IN_ERROR {
            let mut end = MAX_BODY_IN_ERROR;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        ProviderError::Rejected { status, body }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout(_) => true,
            ProviderError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
