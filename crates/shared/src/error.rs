use serde::{Deserialize, Serialize};

/// Raw error bodies longer than this are cut before being surfaced.
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Error payload returned by the inventory service on failed requests.
///
/// The service answers with `{"error": ...}` on most failures, while some
/// routes use `{"message": ...}`. Both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorPayload {
    pub fn into_message(self) -> Option<String> {
        self.error
            .into_iter()
            .chain(self.message)
            .map(|text| text.trim().to_string())
            .find(|text| !text.is_empty())
    }
}

/// Extracts a human readable message from a failed response body.
///
/// JSON payloads yield their `error`/`message` field, other non-empty bodies
/// are returned as text. `None` means the caller should fall back to the
/// status reason.
pub fn describe_error_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload.into_message(),
        Err(_) => Some(truncate(body)),
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
