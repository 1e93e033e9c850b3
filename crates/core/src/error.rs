//! Error types for subscription fetching and checkout

use std::fmt;

/// PostgREST code returned when a single-object query matches zero rows.
pub const ROW_NOT_FOUND_CODE: &str = "PGRST116";

/// Classification of a subscription store failure, decided once at the
/// adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The query matched no row. Not a failure for the fetcher.
    NotFound,
    Unauthorized,
    Transport,
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorKind::NotFound => write!(f, "not found"),
            StoreErrorKind::Unauthorized => write!(f, "unauthorized"),
            StoreErrorKind::Transport => write!(f, "transport"),
            StoreErrorKind::Other => write!(f, "store"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    /// Raw backend code, kept for diagnostics.
    pub code: Option<String>,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            kind: StoreErrorKind::NotFound,
            code: Some(ROW_NOT_FOUND_CODE.to_string()),
            message: "no rows returned".to_string(),
        }
    }

    /// Builds an error from a raw backend response, classifying the code.
    pub fn classify(http_status: Option<u16>, code: Option<&str>, message: impl Into<String>) -> Self {
        let kind = match (code, http_status) {
            (Some(ROW_NOT_FOUND_CODE), _) => StoreErrorKind::NotFound,
            (_, Some(401 | 403)) => StoreErrorKind::Unauthorized,
            _ => StoreErrorKind::Other,
        };
        Self {
            kind,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

/// Error reported by a remote backend function, with its message if it sent one.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or("remote function failed"))]
pub struct FunctionError {
    pub message: Option<String>,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Sign in required")]
    AuthRequired,
    #[error("Failed to fetch subscription: {0}")]
    FetchFailed(#[from] StoreError),
    #[error("Failed to create checkout session: {0}")]
    CheckoutCreationFailed(String),
    #[error("Checkout response did not contain a redirect URL")]
    InvalidCheckoutResponse,
}

pub type Result<T> = std::result::Result<T, Error>;
