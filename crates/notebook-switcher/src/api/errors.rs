use thiserror::Error;

/// Errors from the notification listener itself.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Server error: {message}")]
    ServerError { message: String },
}
