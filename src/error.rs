use axum::{http::StatusCode, response::Json};
use serde_json::json;
use thiserror::Error;

use crate::registry::RegistryError;
use crate::render::RenderError;

/// Errors surfaced by the HTTP handlers, one variant per status class.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Remote(String),

    #[error("{0}")]
    Format(String),

    #[error("{0}")]
    Internal(String),
}

impl ControlError {
    pub fn status(&self) -> StatusCode {
        match self {
            ControlError::Validation(_) => StatusCode::BAD_REQUEST,
            ControlError::NotFound(_) => StatusCode::NOT_FOUND,
            ControlError::Remote(_) | ControlError::Format(_) | ControlError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ControlError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: ControlError) -> Self {
        (err.status(), Json(json!({ "error": err.to_string() })))
    }
}

impl From<RegistryError> for ControlError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { .. } => ControlError::NotFound("Heaters data not found".to_string()),
            RegistryError::Format { .. } => ControlError::Format("Invalid heaters data format".to_string()),
            RegistryError::UnknownDevice(_) => ControlError::NotFound(err.to_string()),
            RegistryError::Io { .. } => ControlError::Internal(format!("Internal server error: {err}")),
        }
    }
}

impl From<RenderError> for ControlError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::TemplateNotFound { .. } => {
                ControlError::NotFound(format!("Configuration template missing: {err}"))
            }
            RenderError::Io { .. } => {
                ControlError::Internal(format!("Failed to render heater configuration: {err}"))
            }
        }
    }
}
