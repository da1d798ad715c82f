use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Failure points of a single invocation. Every variant fails the whole call.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("failed to load model resources: {0}")]
    ResourceLoad(String),

    #[error("failed to encode input: {0}")]
    Encoding(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("malformed invocation event: {0}")]
    Event(String),
}

impl From<candle_core::Error> for HandlerError {
    fn from(err: candle_core::Error) -> Self {
        HandlerError::Inference(err.to_string())
    }
}

pub type HandlerResult<T, E = HandlerError> = Result<T, E>;

// Taken from https://github.com/tokio-rs/axum/blob/main/examples/anyhow-error-response/src/main.rs
#[derive(Debug)]
pub struct FunctionError {
    pub status: StatusCode,
    pub message: HttpErrorResponse,
}

#[derive(Debug, Serialize)]
pub struct HttpErrorResponse {
    error: String,
}

impl From<String> for HttpErrorResponse {
    fn from(message: String) -> Self {
        HttpErrorResponse { error: message }
    }
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let mut res = Json(self.message).into_response();
        *res.status_mut() = self.status;
        res
    }
}

impl<E> From<E> for FunctionError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        FunctionError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: HttpErrorResponse::from(err.into().to_string()),
        }
    }
}

pub type FunctionResult<T, E = FunctionError> = Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_errors_become_internal_server_errors() {
        let err = FunctionError::from(HandlerError::Event("missing body".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.message.error,
            "malformed invocation event: missing body"
        );
    }

    #[test]
    fn tensor_errors_are_inference_failures() {
        let err: HandlerError = candle_core::Error::Msg("shape mismatch".into()).into();
        assert!(matches!(err, HandlerError::Inference(_)));
    }
}
