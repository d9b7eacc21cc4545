use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::error::ApiError;

/// `{success: true, data}` envelope for successful calls.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct Failure {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Success<T>>) {
    (
        StatusCode::OK,
        Json(Success {
            success: true,
            data,
        }),
    )
}

pub fn failure(err: &ApiError) -> (StatusCode, Json<Failure>) {
    (
        err.status(),
        Json(Failure {
            success: false,
            error: ErrorBody {
                code: err.code(),
                message: err.to_string(),
            },
        }),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        }
        failure(&self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_shape() {
        let (status, Json(body)) = ok(json!({"foodLogId": 1}));
        assert_eq!(status, StatusCode::OK);
        let v = serde_json::to_value(body).unwrap();
        assert_eq!(v, json!({"success": true, "data": {"foodLogId": 1}}));
    }

    #[test]
    fn failure_envelope_shape() {
        let (status, Json(body)) = failure(&ApiError::validation("mealTypeId is invalid"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let v = serde_json::to_value(body).unwrap();
        assert_eq!(
            v,
            json!({
                "success": false,
                "error": {"code": "VALIDATION_ERROR", "message": "mealTypeId is invalid"}
            })
        );
    }
}
