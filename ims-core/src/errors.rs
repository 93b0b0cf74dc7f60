//! # Errors
//!
//! Structured client errors that travel inside `anyhow::Error` through every
//! service layer.
//! - consistent status codes and class names
//! - a category per error (validation, authentication, authorization,
//!   network, server)
//! - a user-facing message, so views never show raw transport errors

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::Value;

/// A convenience result type for IMS client APIs.
pub type ImsResult<T> = std::result::Result<T, AnyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never produced a response (DNS, connect, TLS, timeout on the socket).
    Network,
    BadRequest,       // 400
    NotAuthenticated, // 401
    Forbidden,        // 403
    NotFound,         // 404
    Timeout,          // 408
    Conflict,         // 409
    Unprocessable,    // 422
    TooManyRequests,  // 429
    GeneralError,     // 500
    BadGateway,       // 502
    Unavailable,      // 503
}

/// How a failure is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Field-scoped, recoverable locally; blocks submission only.
    Validation,
    /// Session expired; the user is sent back to login.
    Authentication,
    /// Permission denied; no redirect.
    Authorization,
    /// Network failure; the user may retry.
    Network,
    /// Server-side failure; the user may retry.
    Server,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Network => 0,
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Timeout => 408,
            ErrorKind::Conflict => 409,
            ErrorKind::Unprocessable => 422,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::GeneralError => 500,
            ErrorKind::BadGateway => 502,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Map an HTTP status onto a kind. Unknown 4xx become `BadRequest`,
    /// unknown 5xx become `GeneralError`.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::NotAuthenticated,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            408 => ErrorKind::Timeout,
            409 => ErrorKind::Conflict,
            422 => ErrorKind::Unprocessable,
            429 => ErrorKind::TooManyRequests,
            502 => ErrorKind::BadGateway,
            503 | 504 => ErrorKind::Unavailable,
            400..=499 => ErrorKind::BadRequest,
            _ => ErrorKind::GeneralError,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::TooManyRequests => "TooManyRequests",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::BadGateway => "BadGateway",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotAuthenticated => "not-authenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::TooManyRequests => "too-many-requests",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::BadGateway => "bad-gateway",
            ErrorKind::Unavailable => "unavailable",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::BadRequest | ErrorKind::Unprocessable => ErrorCategory::Validation,
            ErrorKind::NotAuthenticated => ErrorCategory::Authentication,
            ErrorKind::Forbidden => ErrorCategory::Authorization,
            ErrorKind::Network | ErrorKind::Timeout => ErrorCategory::Network,
            _ => ErrorCategory::Server,
        }
    }
}

/// A structured IMS error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct ImsError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
    /// Field-level errors, `{"field": ["message", ...]}`.
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

impl ImsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            errors: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Text safe to show in a toast or inline banner.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Authentication => {
                "Your session has expired. Please log in again.".to_string()
            }
            ErrorCategory::Authorization => {
                "You do not have permission to perform this action.".to_string()
            }
            ErrorCategory::Validation => self.message.clone(),
            ErrorCategory::Network => {
                "Unable to reach the server. Please check your connection and try again."
                    .to_string()
            }
            ErrorCategory::Server => {
                if self.kind == ErrorKind::NotFound {
                    "The requested record could not be found.".to_string()
                } else {
                    "Something went wrong. Please try again.".to_string()
                }
            }
        }
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find an `ImsError` anywhere in an `anyhow` chain.
    pub fn from_anyhow(err: &AnyError) -> Option<&ImsError> {
        err.chain().find_map(|e| e.downcast_ref::<ImsError>())
    }

    /// Turn any error into an `ImsError`:
    /// - if it's already one, keep it
    /// - otherwise wrap as GeneralError
    pub fn normalize(err: AnyError) -> ImsError {
        match err.downcast::<ImsError>() {
            Ok(ims) => ims,
            Err(other) => ImsError::new(ErrorKind::GeneralError, other.to_string()).with_source(other),
        }
    }

    /// User-facing message for an arbitrary error.
    pub fn user_message_for(err: &AnyError) -> String {
        match Self::from_anyhow(err) {
            Some(ims) => ims.user_message(),
            None => ImsError::general_error(err.to_string()).user_message(),
        }
    }

    /// Copy without the inner `source`.
    pub fn sanitize_for_client(&self) -> ImsError {
        ImsError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    pub fn to_json(&self) -> Value {
        use serde_json::json;

        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });

        if let Some(d) = &self.data {
            base["data"] = d.clone();
        }
        if let Some(e) = &self.errors {
            base["errors"] = e.clone();
        }
        base
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, msg)
    }
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
}

impl fmt::Display for ImsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for ImsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience helper for "bail with ImsError".
#[macro_export]
macro_rules! bail_ims {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::ImsError::$ctor($msg).into_anyhow());
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::ImsError::$ctor(format!($fmt, $($arg)*)).into_anyhow());
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn status_mapping_and_categories() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::NotAuthenticated);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::BadRequest);
        assert_eq!(ErrorKind::from_status(504), ErrorKind::Unavailable);
        assert_eq!(ErrorKind::from_status(599), ErrorKind::GeneralError);

        assert_eq!(ErrorKind::Forbidden.category(), ErrorCategory::Authorization);
        assert_eq!(ErrorKind::Network.category(), ErrorCategory::Network);
        assert_eq!(ErrorKind::Unprocessable.category(), ErrorCategory::Validation);
    }

    #[test]
    fn session_expiry_message_for_401() {
        let err = ImsError::not_authenticated("jwt expired");
        assert!(err.user_message().contains("session has expired"));
    }

    #[test]
    fn from_anyhow_looks_through_context() {
        let err = ImsError::forbidden("nope")
            .into_anyhow()
            .context("loading interactions");
        let ims = ImsError::from_anyhow(&err).expect("must find ImsError");
        assert_eq!(ims.kind, ErrorKind::Forbidden);
        assert!(ImsError::user_message_for(&err).contains("permission"));
    }

    #[test]
    fn normalize_wraps_foreign_errors() {
        let ims = ImsError::normalize(anyhow::anyhow!("boom"));
        assert_eq!(ims.kind, ErrorKind::GeneralError);
        assert!(ims.source.is_some());
        assert!(ims.sanitize_for_client().source.is_none());
    }
}
