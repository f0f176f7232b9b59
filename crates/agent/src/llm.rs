use async_trait::async_trait;
use thiserror::Error;

/// A single-shot completion request. The classifier pins temperature and
/// output length per call, so both travel with the prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport failure: {message}")]
    Transport { message: String, retryable: bool },
    #[error("llm api returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("llm returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    /// Transient failures are worth one more attempt. Client errors and empty
    /// replies are not: resending the same request would fail the same way.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Api { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::EmptyResponse => false,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::LlmError;

    #[test]
    fn server_side_statuses_are_retryable() {
        for status in [408, 429, 500, 502, 503] {
            let error = LlmError::Api { status, message: String::new() };
            assert!(error.is_retryable(), "status {status} should be retryable");
        }
    }

    #[test]
    fn client_errors_and_empty_replies_are_terminal() {
        let bad_request = LlmError::Api { status: 400, message: String::new() };
        assert!(!bad_request.is_retryable());

        let unauthorized = LlmError::Api { status: 401, message: String::new() };
        assert!(!unauthorized.is_retryable());

        assert!(!LlmError::EmptyResponse.is_retryable());
    }

    #[test]
    fn transport_errors_carry_their_own_retry_flag() {
        let timeout =
            LlmError::Transport { message: "operation timed out".to_string(), retryable: true };
        assert!(timeout.is_retryable());

        let decode =
            LlmError::Transport { message: "invalid response body".to_string(), retryable: false };
        assert!(!decode.is_retryable());
    }
}
