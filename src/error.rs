use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{database::StoreError, model::api_response::ApiResponse};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized user")]
    Unauthorized,
    #[error("forbidden user")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!("{detail}");
                "Internal Server Error.".to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(ApiResponse::error(message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
