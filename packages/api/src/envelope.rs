//! The `{"ok": true, ...}` success wrapper shared by every endpoint.

use serde::{Deserialize, Serialize};

/// A successful response body: `ok: true` merged with the fields of `T`.
///
/// ```json
/// { "ok": true, "id": "post_0b6e..." }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Empty payload, for endpoints that answer with a bare `{"ok": true}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {}

/// Payload carrying the id of a newly created resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedBody {
    pub id: String,
}

/// Payload for plain list endpoints (`banners`, admin listings).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemsBody<T> {
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_serialises_to_bare_ok() {
        let json = serde_json::to_value(Envelope::ok(Ack::default())).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": true }));
    }

    #[test]
    fn payload_fields_are_flattened() {
        let json = serde_json::to_value(Envelope::ok(CreatedBody { id: "x".into() })).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": true, "id": "x" }));
    }
}
