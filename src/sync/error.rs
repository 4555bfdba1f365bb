use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Unauthorized - session may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl RemoteError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            // Back off to a char boundary so multi-byte UTF-8 can't split
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..end],
                body.len()
            )
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => RemoteError::Unauthorized,
            404 => RemoteError::NotFound(truncated),
            429 => RemoteError::RateLimited,
            500..=599 => RemoteError::ServerError(truncated),
            _ => RemoteError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_body_kept_verbatim() {
        let err = RemoteError::from_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "upstream exploded",
        );
        match err {
            RemoteError::ServerError(body) => assert_eq!(body, "upstream exploded"),
            other => panic!("expected ServerError, got {:?}", other),
        }
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
        let err = RemoteError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &body);
        match err {
            RemoteError::ServerError(msg) => {
                assert!(msg.contains("truncated"));
                assert!(msg.contains(&format!("{} total bytes", body.len())));
            }
            other => panic!("expected ServerError, got {:?}", other),
        }
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // '€' is three bytes and straddles the truncation limit
        let mut body = "a".repeat(MAX_ERROR_BODY_LENGTH - 1);
        body.push('€');
        body.push_str(&"b".repeat(200));
        let err = RemoteError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, &body);
        match err {
            RemoteError::ServerError(msg) => {
                assert!(msg.starts_with(&"a".repeat(MAX_ERROR_BODY_LENGTH - 1)));
                assert!(!msg.contains('€'));
                assert!(msg.contains("truncated"));
            }
            other => panic!("expected ServerError, got {:?}", other),
        }
    }

    #[test]
    fn test_auth_statuses_map_to_unauthorized() {
        assert!(matches!(
            RemoteError::from_status(reqwest::StatusCode::UNAUTHORIZED, ""),
            RemoteError::Unauthorized
        ));
        assert!(matches!(
            RemoteError::from_status(reqwest::StatusCode::FORBIDDEN, ""),
            RemoteError::Unauthorized
        ));
    }
}
