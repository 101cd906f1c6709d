use lambda_http::http::StatusCode;
use thiserror::Error;

/// Every failure a handler can report to a caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Dependency(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn access_denied() -> Self {
        ApiError::AccessDenied("You do not have access to this resource".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Name of the error class, sent as the `error` field of the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::Auth(_) => "AuthError",
            ApiError::AccessDenied(_) => "AccessDeniedError",
            ApiError::NotFound(_) => "NotFoundError",
            ApiError::Dependency(_) => "DependencyError",
        }
    }

    /// Message safe to show a caller. Backend detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Dependency(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Key-value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found")]
    NotFound,
    #[error("store request failed: {0}")]
    Backend(String),
    #[error("malformed item: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Like `ApiError::from`, but a missing item names the entity.
    pub fn or_missing(self, what: &str) -> ApiError {
        match self {
            StoreError::NotFound => ApiError::NotFound(format!("{} not found", what)),
            other => other.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("Item not found".to_string()),
            StoreError::Backend(msg) | StoreError::Malformed(msg) => ApiError::Dependency(msg),
        }
    }
}

/// Payments provider failures.
#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("payments request failed: {0}")]
    Request(String),
    #[error("payments provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("unexpected payments response: {0}")]
    Decode(String),
}

impl From<PaymentsError> for ApiError {
    fn from(e: PaymentsError) -> Self {
        ApiError::Dependency(e.to_string())
    }
}

/// Object storage failures for branding logos.
#[derive(Debug, Error)]
pub enum LogoStorageError {
    #[error("failed to presign upload: {0}")]
    Presign(String),
    #[error("failed to delete object: {0}")]
    Delete(String),
}

impl From<LogoStorageError> for ApiError {
    fn from(e: LogoStorageError) -> Self {
        ApiError::Dependency(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Validation(format!("Invalid request body: {}", e))
    }
}
