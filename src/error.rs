//! Error taxonomy for the gateway (§7 of the design). Every failure mode the
//! core can produce is a variant here; the `IntoResponse` impl is the single
//! place that maps a failure onto the HTTP contract clients observe.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("resource {resource_id} not found")]
    ResourceNotFound { resource_id: Uuid },

    #[error("resource {resource_id} is gone")]
    ResourceGone {
        resource_id: Uuid,
        dataset_id: Option<Uuid>,
    },

    #[error("profile for resource {resource_id} not found")]
    ProfileNotFound { resource_id: Uuid },

    #[error("invalid parameter on column {column}: suffix {suffix} is not legal")]
    InvalidParameter { column: String, suffix: String },

    #[error("invalid value for {column}__{suffix}: {value}")]
    InvalidValue {
        column: String,
        suffix: String,
        value: String,
    },

    #[error("aggregation is not allowed on resource {resource_id}")]
    AggregationNotAllowed { resource_id: Uuid },

    #[error("downstream table service unavailable: {0}")]
    DownstreamUnavailable(String),

    #[error("downstream table service timed out")]
    DownstreamTimeout,

    #[error("internal error: {0}")]
    Internal(String),
}

/// One entry of the `{errors:[...]}` envelope.
#[derive(Debug, Serialize)]
struct ErrorEntry {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::ResourceGone { .. } => StatusCode::GONE,
            GatewayError::ProfileNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            GatewayError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            GatewayError::AggregationNotAllowed { .. } => StatusCode::FORBIDDEN,
            GatewayError::DownstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::DownstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            GatewayError::ResourceNotFound { .. } => "resource_not_found",
            GatewayError::ResourceGone { .. } => "resource_gone",
            GatewayError::ProfileNotFound { .. } => "profile_not_found",
            GatewayError::InvalidParameter { .. } => "invalid_parameter",
            GatewayError::InvalidValue { .. } => "invalid_value",
            GatewayError::AggregationNotAllowed { .. } => "aggregation_not_allowed",
            GatewayError::DownstreamUnavailable(_) | GatewayError::DownstreamTimeout => {
                "downstream_unavailable"
            }
            GatewayError::Internal(_) => "internal",
        }
    }

    fn entry(&self) -> ErrorEntry {
        let code = self.code();
        match self {
            GatewayError::ResourceNotFound { resource_id } => ErrorEntry {
                code,
                message: self.to_string(),
                resource_id: Some(*resource_id),
                dataset_id: None,
                column: None,
                operator: None,
                value: None,
            },
            GatewayError::ResourceGone {
                resource_id,
                dataset_id,
            } => ErrorEntry {
                code,
                message: self.to_string(),
                resource_id: Some(*resource_id),
                dataset_id: *dataset_id,
                column: None,
                operator: None,
                value: None,
            },
            GatewayError::ProfileNotFound { resource_id } => ErrorEntry {
                code,
                message: self.to_string(),
                resource_id: Some(*resource_id),
                dataset_id: None,
                column: None,
                operator: None,
                value: None,
            },
            GatewayError::InvalidParameter { column, suffix } => ErrorEntry {
                code,
                message: self.to_string(),
                resource_id: None,
                dataset_id: None,
                column: Some(column.clone()),
                operator: Some(suffix.clone()),
                value: None,
            },
            GatewayError::InvalidValue {
                column,
                suffix,
                value,
            } => ErrorEntry {
                code,
                message: self.to_string(),
                resource_id: None,
                dataset_id: None,
                column: Some(column.clone()),
                operator: Some(suffix.clone()),
                value: Some(value.clone()),
            },
            GatewayError::AggregationNotAllowed { resource_id } => ErrorEntry {
                code,
                message: self.to_string(),
                resource_id: Some(*resource_id),
                dataset_id: None,
                column: None,
                operator: None,
                value: None,
            },
            GatewayError::DownstreamUnavailable(_)
            | GatewayError::DownstreamTimeout
            | GatewayError::Internal(_) => ErrorEntry {
                code,
                message: "an internal error occurred".to_string(),
                resource_id: None,
                dataset_id: None,
                column: None,
                operator: None,
                value: None,
            },
        }
    }

    fn log(&self) {
        match self {
            GatewayError::DownstreamUnavailable(_)
            | GatewayError::DownstreamTimeout
            | GatewayError::Internal(_) => error!(error = %self, "request failed"),
            _ => warn!(error = %self, "request rejected"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        self.log();
        let status = self.status();
        let body = json!({ "errors": [self.entry()] });
        (status, Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
