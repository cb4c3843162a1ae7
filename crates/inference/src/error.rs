/// Errors from the inference and project HTTP layers.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The server could not be reached (connection refused, DNS, timeout).
    #[error("Server not reachable: {0}")]
    Unreachable(String),

    /// The server answered with a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body, kept for status-specific message mapping.
        body: String,
    },

    /// The response arrived but did not have the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Any other transport-level failure.
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),
}

impl InferenceError {
    /// `true` when the request never reached a server.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// HTTP status of an [`Api`](Self::Api) error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Parse the body of an [`Api`](Self::Api) error as JSON, if it is JSON.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Api { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unreachable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_exposes_status_and_json_body() {
        let err = InferenceError::Api {
            status: 429,
            body: r#"{"daily_limit": 5}"#.into(),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.body_json().unwrap()["daily_limit"], 5);
        assert!(!err.is_unreachable());
    }

    #[test]
    fn non_json_body_yields_none() {
        let err = InferenceError::Api {
            status: 500,
            body: "<html>oops</html>".into(),
        };
        assert!(err.body_json().is_none());
    }

    #[test]
    fn unreachable_has_no_status() {
        let err = InferenceError::Unreachable("refused".into());
        assert!(err.is_unreachable());
        assert_eq!(err.status(), None);
    }
}
