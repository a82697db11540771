//! Standard error response body.

use serde::{Deserialize, Serialize};

/// The JSON body returned for all error responses.
///
/// ```json
/// { "ok": false, "error": "login required" }
/// ```
///
/// The HTTP status carries the machine-readable part (400 validation,
/// 401 unauthenticated, 403 forbidden, 404 not found, 409 conflict,
/// 415 unsupported media, 500 internal).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Always `false`.
    pub ok: bool,

    /// Human-readable description of the problem.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_shape() {
        let e = ErrorResponse::new("not found");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": false, "error": "not found" }));
    }
}
