//! Status classification

use crate::Error;

/// Kind of HTTP-level outcome for a completed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// 4xx
    NotFound,
    /// Anything else that is not the expected status (3xx, 5xx, unexpected 2xx).
    Failed,
}

pub fn classify_status(status: u16, expected: u16) -> Outcome {
    if status == expected {
        Outcome::Success
    } else if (400..500).contains(&status) {
        Outcome::NotFound
    } else {
        Outcome::Failed
    }
}

/// Build the error for a non-success response, or `None` when it succeeded.
pub(crate) fn error_for_status(status: u16, expected: u16, uri: &str, body: &[u8]) -> Option<Error> {
    // Cap the echoed body; error pages can be large.
    const MAX_BODY_IN_ERROR: usize = 512;
    let body = String::from_utf8_lossy(&body[..body.len().min(MAX_BODY_IN_ERROR)]).into_owned();
    match classify_status(status, expected) {
        Outcome::Success => None,
        Outcome::NotFound => Some(Error::NotFound {
            status,
            uri: uri.to_string(),
            body,
        }),
        Outcome::Failed => Some(Error::FailedRequest {
            status: Some(status),
            uri: uri.to_string(),
            message: if body.is_empty() {
                format!("expected HTTP {}", expected)
            } else {
                body
            },
            source: None,
        }),
    }
}
