use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shiv_core::{coa::CoaError, models::read::InvoiceError, totals::TotalsError, StorageError};

#[derive(Debug, Error)]
pub enum BooksError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// The record exists but is in a state that forbids the operation.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Storage(StorageError),
    #[error("document rendering failed: {0}")]
    Render(#[from] askama::Error),
}

impl BooksError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BooksError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        BooksError::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BooksError::Validation(_) => StatusCode::BAD_REQUEST,
            BooksError::NotFound(_) => StatusCode::NOT_FOUND,
            BooksError::Conflict(_) => StatusCode::CONFLICT,
            BooksError::Forbidden(_) => StatusCode::FORBIDDEN,
            BooksError::Storage(_) | BooksError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for BooksError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { .. } | StorageError::AccountNotFound(_) => BooksError::NotFound(e.to_string()),
            StorageError::Duplicate(_) => BooksError::Conflict(e.to_string()),
            other => BooksError::Storage(other),
        }
    }
}

impl From<TotalsError> for BooksError {
    fn from(e: TotalsError) -> Self {
        BooksError::Validation(e.to_string())
    }
}

impl From<CoaError> for BooksError {
    fn from(e: CoaError) -> Self {
        BooksError::Validation(e.to_string())
    }
}

impl From<InvoiceError> for BooksError {
    fn from(e: InvoiceError) -> Self {
        match e {
            InvoiceError::NotOpen(_) => BooksError::Conflict(e.to_string()),
            _ => BooksError::Validation(e.to_string()),
        }
    }
}

impl From<JsonRejection> for BooksError {
    fn from(e: JsonRejection) -> Self {
        BooksError::Validation(e.body_text())
    }
}

impl From<PathRejection> for BooksError {
    fn from(e: PathRejection) -> Self {
        BooksError::Validation(e.body_text())
    }
}

impl From<QueryRejection> for BooksError {
    fn from(e: QueryRejection) -> Self {
        BooksError::Validation(e.body_text())
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for BooksError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        metrics::increment_counter!("shiv_http_errors_total", "status" => status.as_u16().to_string());

        (status, Json(ErrorBody {
            success: false,
            error: self.to_string(),
        })).into_response()
    }
}

pub type BooksResult<T> = Result<T, BooksError>;
