use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal,
}

impl From<fanout_core::Error> for ApiError {
    fn from(err: fanout_core::Error) -> Self {
        match err {
            fanout_core::Error::Validation(msg) => ApiError::BadRequest(msg),
            fanout_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            fanout_core::Error::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                ApiError::Internal
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "internal error");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Unexpected error".to_string(),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                },
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_bad_request_response() {
        rt().block_on(async {
            let err = ApiError::BadRequest("name must not be empty".to_string());
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "invalid_request");
            assert_eq!(json["error"]["message"], "name must not be empty");
        });
    }

    #[test]
    fn test_not_found_response() {
        rt().block_on(async {
            let err = ApiError::NotFound("endpoint not found: wh_x".to_string());
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "not_found");
        });
    }

    #[test]
    fn test_internal_error_hides_details() {
        rt().block_on(async {
            let err = ApiError::from(anyhow::anyhow!("connection pool exhausted"));
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "internal_error");
            assert_eq!(json["error"]["message"], "Unexpected error");
        });
    }

    #[test]
    fn test_domain_error_mapping() {
        let err = ApiError::from(fanout_core::Error::validation("bad url"));
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = ApiError::from(fanout_core::Error::not_found("missing"));
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
