use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Telegram error: {0}")] Telegram(#[from] teloxide::RequestError),

    #[error("External API error: {0}")] External(String),

    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Not found: {0}")] NotFound(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn to_error_response(&self) -> ErrorResponse {
        let (code, message) = match self {
            AppError::Database(e) => ("DATABASE_ERROR", e.to_string()),
            AppError::Telegram(e) => ("TELEGRAM_ERROR", e.to_string()),
            AppError::External(msg) => ("EXTERNAL_ERROR", msg.clone()),
            AppError::InvalidInput(msg) => ("INVALID_INPUT", msg.clone()),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone()),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone()),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::External(_) | AppError::Telegram(_) => axum::http::StatusCode::BAD_GATEWAY,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
