use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

/// Raised while building the SMTP mailer at startup.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid SMTP relay {host}: {source}")]
    Relay {
        host: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },
    #[error("invalid {key}: {source}")]
    Address {
        key: &'static str,
        #[source]
        source: lettre::address::AddressError,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Please check the highlighted fields")]
    Validation(Vec<FieldError>),
    #[error("Too many requests, please try again in a minute")]
    RateLimited,
    #[error("Malformed request: {0}")]
    BadRequest(String),
    #[error("Your message could not be delivered right now")]
    Delivery(String),
    #[error("Not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Delivery(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(fields) => json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            ApiError::Delivery(reason) => {
                // the reason may carry SMTP details, keep it out of the response
                tracing::error!("contact delivery failed: {}", reason);
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
