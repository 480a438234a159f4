//! M2M client errors and their mapping onto the engine's retry taxonomy

use declass_sync::AdapterError;

#[derive(Debug, thiserror::Error)]
pub enum M2mError {
    /// Transport failure (connect, timeout, body read)
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// API-level error reported in the response envelope
    #[error("{endpoint} failed with {code}: {message}")]
    Api {
        endpoint: String,
        code: String,
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("could not decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },

    /// Client could not be built
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl M2mError {
    /// Whether retrying the same request may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            M2mError::Transport { source, .. } => !source.is_decode() && !source.is_builder(),
            M2mError::Status { status, .. } => *status == 429 || *status >= 500,
            M2mError::Api { code, .. } => is_transient_code(code),
            M2mError::Decode { .. } | M2mError::Config(_) => false,
        }
    }
}

/// Rate limiting and temporary outages are reported as API error codes
fn is_transient_code(code: &str) -> bool {
    let code = code.to_ascii_uppercase();
    code.contains("RATE_LIMIT")
        || code.contains("UNAVAILABLE")
        || code.contains("TIMEOUT")
        || code == "SERVER_ERROR"
}

impl From<M2mError> for AdapterError {
    fn from(err: M2mError) -> Self {
        if err.is_transient() {
            AdapterError::Transient(err.to_string())
        } else {
            AdapterError::Fatal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> M2mError {
        M2mError::Status {
            endpoint: "scene-search".into(),
            status: code,
        }
    }

    fn api(code: &str) -> M2mError {
        M2mError::Api {
            endpoint: "scene-search".into(),
            code: code.into(),
            message: "nope".into(),
        }
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert!(status(502).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(404).is_transient());
    }

    #[test]
    fn api_codes_map_by_kind() {
        assert!(api("RATE_LIMIT").is_transient());
        assert!(api("RATE_LIMIT_USER_DL").is_transient());
        assert!(!api("AUTH_INVALID").is_transient());
        assert!(!api("INPUT_PARAMETER_INVALID").is_transient());
    }

    #[test]
    fn converts_to_adapter_error() {
        assert!(AdapterError::from(status(504)).is_retryable());
        let fatal = AdapterError::from(api("AUTH_UNAUTHORIZED"));
        assert!(fatal.is_fatal());
        assert!(fatal.to_string().contains("AUTH_UNAUTHORIZED"));
    }
}
