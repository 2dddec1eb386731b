// Backend API error types
use thiserror::Error;

/// Failure talking to the console backend, classified by where it happened
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // Connection refused, timeout, TLS, DNS
    #[error("network error: {0}")]
    Transport(String),

    // Non-2xx HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // HTTP 200 with a non-200 envelope code
    #[error("{message}")]
    Rejected { code: i64, message: String },

    // Body did not match the expected envelope
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport(message.into())
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ApiError::Http { status, message: message.into() }
    }

    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        ApiError::Rejected { code, message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ApiError::Decode(message.into())
    }

    /// The backend answered and said no. Server-side faults and anything that
    /// never produced a verdict count as network failures.
    pub fn is_rejection(&self) -> bool {
        match self {
            ApiError::Rejected { code, .. } => (400..500).contains(code),
            ApiError::Http { status, .. } => (400..500).contains(status),
            ApiError::Transport(_) | ApiError::Decode(_) => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Transport(_) => "NETWORK_FAILURE",
            ApiError::Http { .. } => "HTTP_ERROR",
            ApiError::Rejected { .. } => "REJECTED",
            ApiError::Decode(_) => "MALFORMED_RESPONSE",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::http(status.as_u16(), err.to_string())
        } else {
            ApiError::transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::decode(err.to_string())
    }
}

impl From<ApiError> for crate::session::AuthError {
    fn from(err: ApiError) -> Self {
        if err.is_rejection() {
            crate::session::AuthError::InvalidCredentials(err.to_string())
        } else {
            tracing::error!("Backend unreachable during auth: {}", err);
            crate::session::AuthError::NetworkFailure(err.to_string())
        }
    }
}

impl From<ApiError> for crate::devtools::DevToolsVerificationError {
    fn from(err: ApiError) -> Self {
        // A rejected verify request is still not a verdict on the password
        crate::devtools::DevToolsVerificationError::NetworkFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthError;

    #[test]
    fn envelope_rejection_is_invalid_credentials() {
        let err: AuthError = ApiError::rejected(400, "密码错误").into();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));

        let err: AuthError = ApiError::http(401, "unauthorized").into();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[test]
    fn server_faults_are_network_failures() {
        let err: AuthError = ApiError::http(502, "bad gateway").into();
        assert!(matches!(err, AuthError::NetworkFailure(_)));

        let err: AuthError = ApiError::rejected(500, "boom").into();
        assert!(matches!(err, AuthError::NetworkFailure(_)));

        let err: AuthError = ApiError::transport("connection refused").into();
        assert!(matches!(err, AuthError::NetworkFailure(_)));
    }
}
