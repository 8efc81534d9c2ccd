use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("Order total mismatch: submitted {submitted}, recomputed {computed}")]
    TotalMismatch { submitted: i64, computed: i64 },

    #[error("Missing composite index: {0}")]
    IndexMissing(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment requires additional authentication")]
    RequiresAction,

    #[error("Payment processor unreachable: {0}")]
    Network(String),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<BTreeMap<String, String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TotalMismatch { .. } => StatusCode::CONFLICT,
            AppError::IndexMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::RequiresAction => StatusCode::PAYMENT_REQUIRED,
            AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::OrmError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let fields = match &self {
            AppError::Validation(errors) => Some(errors.clone()),
            _ => None,
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
                fields,
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
