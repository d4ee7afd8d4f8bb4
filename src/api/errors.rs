//! # Manejo de errores
//!
//! Una sola jerarquía de errores (thiserror) para validación, autenticación,
//! base de datos y almacenamiento. Todos se registran con tracing y llegan al
//! cliente como JSON `{ "error", "message" }`; los fallos del backend solo
//! muestran un mensaje genérico.

use actix_web::{HttpResponse, ResponseError};
use std::error::Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Error de base de datos con la operación que lo produjo
    #[error("Error de base de datos en operación '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// Error del almacenamiento de imágenes
    #[error("Error de almacenamiento en operación '{operation}': {source}")]
    Storage {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error de validación en campo '{field}': {message}")]
    ValidationWithField { field: String, message: String },

    #[error("Error de validación: {0}")]
    Validation(String),

    #[error("No autorizado para operación '{operation}': {reason}")]
    UnauthorizedWithContext { operation: String, reason: String },

    #[error("No autorizado: {0}")]
    Unauthorized(String),

    #[error("No encontrado: {resource_type} con ID '{id}'")]
    NotFoundWithId { resource_type: String, id: String },

    #[error("No encontrado: {0}")]
    NotFound(String),

    #[error("Conflicto: {0}")]
    Conflict(String),

    /// Error interno con código de rastreo
    #[error("Error interno (trace: {trace_id}): {message}")]
    InternalWithTrace { trace_id: String, message: String },

    #[error("Error interno: {0}")]
    Internal(String),
}

impl AppError {
    pub fn database(operation: &str, source: mongodb::error::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            source,
        }
    }

    pub fn storage(operation: &str, source: std::io::Error) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            source,
        }
    }

    pub fn validation_field(field: &str, message: &str) -> Self {
        Self::ValidationWithField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn unauthorized_operation(operation: &str, reason: &str) -> Self {
        Self::UnauthorizedWithContext {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found_id(resource_type: &str, id: &str) -> Self {
        Self::NotFoundWithId {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Crea un error interno con trace ID (uno nuevo si no se indica)
    pub fn internal_trace(message: &str, trace_id: Option<String>) -> Self {
        Self::InternalWithTrace {
            trace_id: trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message: message.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            Self::ValidationWithField { .. } | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnauthorizedWithContext { .. } | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFoundWithId { .. } | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match self {
            Self::Database { operation, source } => {
                tracing::error!(
                    operation = %operation,
                    error = %source,
                    error_chain = ?source.source(),
                    "Database error occurred"
                );
                HttpResponse::build(status).json(ErrorResponse {
                    error: "Error de base de datos".to_string(),
                    message: "No se pudo completar la operación, inténtalo de nuevo".to_string(),
                })
            }
            Self::Storage { operation, source } => {
                tracing::error!(
                    operation = %operation,
                    error = %source,
                    "Storage error occurred"
                );
                HttpResponse::build(status).json(ErrorResponse {
                    error: "Error de almacenamiento".to_string(),
                    message: "No se pudo guardar la imagen, inténtalo de nuevo".to_string(),
                })
            }
            Self::ValidationWithField { field, message } => {
                tracing::warn!(field = %field, message = %message, "Validation error");
                HttpResponse::build(status).json(ErrorResponse {
                    error: "Error de validación".to_string(),
                    message: format!("Campo '{}': {}", field, message),
                })
            }
            Self::Validation(message) => {
                tracing::warn!(message = %message, "Validation error");
                HttpResponse::build(status).json(ErrorResponse {
                    error: "Error de validación".to_string(),
                    message: message.clone(),
                })
            }
            Self::UnauthorizedWithContext { operation, reason } => {
                tracing::warn!(operation = %operation, reason = %reason, "Unauthorized access attempt");
                HttpResponse::build(status).json(ErrorResponse {
                    error: "No autorizado".to_string(),
                    message: format!("Operación '{}': {}", operation, reason),
                })
            }
            Self::NotFoundWithId { resource_type, id } => {
                tracing::info!(resource_type = %resource_type, id = %id, "Resource not found");
                HttpResponse::build(status).json(ErrorResponse {
                    error: "No encontrado".to_string(),
                    message: format!("{} con ID '{}' no encontrado", resource_type, id),
                })
            }
            Self::InternalWithTrace { trace_id, message } => {
                tracing::error!(trace_id = %trace_id, message = %message, "Internal error with trace");
                HttpResponse::build(status).json(ErrorResponse {
                    error: "Error interno".to_string(),
                    message: format!("Error interno (trace: {})", trace_id),
                })
            }
            Self::Internal(message) => {
                tracing::error!(message = %message, "Internal error");
                HttpResponse::build(status).json(ErrorResponse {
                    error: "Error interno".to_string(),
                    message: "Error interno del servidor".to_string(),
                })
            }
            error => {
                tracing::info!(error = %error, "Request rejected");
                HttpResponse::build(status).json(ErrorResponse {
                    error: "Error".to_string(),
                    message: error.to_string(),
                })
            }
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type AppResult<T> = Result<T, AppError>;

pub trait ResultExt<T> {
    fn map_err_internal(self, message: &str) -> AppResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + 'static,
{
    fn map_err_internal(self, message: &str) -> AppResult<T> {
        self.map_err(|e| AppError::internal_trace(&format!("{}: {}", message, e), None))
    }
}
