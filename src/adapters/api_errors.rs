use {
    crate::domain::error::PipelineError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Newtype bridging the domain error into axum. HTTP concerns stay in the
/// adapter layer.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            PipelineError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            // Deliberately terse: no payload detail leaks back to a caller
            // that failed authentication.
            PipelineError::Signature(_) => (
                StatusCode::UNAUTHORIZED,
                "signature_error",
                "invalid webhook signature".to_string(),
            ),
            PipelineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            err => {
                tracing::error!(error = %err, "internal error on webhook path");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
