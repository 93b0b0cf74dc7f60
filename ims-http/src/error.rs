use ims_core::{ErrorKind, ImsError};
use serde_json::Value;

/// Map a non-success response into an `ImsError`.
///
/// The message is taken from `message`, `detail` or `error` in a JSON body,
/// falling back to the status text. A JSON `errors` object is kept as
/// field-level errors.
pub fn error_from_response(status: u16, body: &str) -> ImsError {
    let kind = ErrorKind::from_status(status);
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    let message = parsed
        .as_ref()
        .and_then(|v| {
            ["message", "detail", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str))
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Request failed")
                .to_string()
        });

    let mut err = ImsError::new(kind, message);
    if let Some(errors) = parsed.as_ref().and_then(|v| v.get("errors")).filter(|e| e.is_object()) {
        err = err.with_errors(errors.clone());
    }
    err
}
