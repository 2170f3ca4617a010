use spin_sdk::http::Response;
use std::fmt;

/// Error classification for handlers; the `From` impl below is the only
/// place status codes are assigned.
#[derive(Debug, PartialEq)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden(String),
    NotFound(String),
    NotVisible,
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::NotVisible => write!(f, "Not Visible"),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

fn error_body(status: u16, msg: &str) -> Response {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"e": msg})).unwrap())
        .build()
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::BadRequest(msg) => error_body(400, &msg),
            ApiError::Unauthorized => error_body(401, "Unauthorized"),
            ApiError::Forbidden(msg) => error_body(403, &msg),
            ApiError::NotFound(msg) => error_body(404, &msg),
            ApiError::NotVisible => {
                error_body(403, "Please follow the user to see their posts")
            }
            ApiError::InternalError(msg) => error_body(500, &msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
