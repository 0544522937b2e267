//! HTTP request handlers for the device control plane.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::bridge::Registry;
use crate::common::error::RegistryError;
use crate::common::messages::{DeviceIdentifier, DeviceSnapshot};

/// API error response.
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    #[serde(skip)]
    pub status: StatusCode,
}

/// One failed request-body check, addressed by JSON path.
#[derive(Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl ApiError {
    fn validation(details: Vec<FieldError>) -> Self {
        Self {
            error: "Validation failed".to_string(),
            details: Some(details),
            status: StatusCode::BAD_REQUEST,
        }
    }
}

impl FieldError {
    fn required(path: &str) -> Self {
        Self {
            path: path.to_string(),
            message: "is required".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match err {
            RegistryError::DuplicateAccessToken { .. } | RegistryError::DuplicateDevEui { .. } => {
                StatusCode::CONFLICT
            }
            RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
        };

        Self {
            error: err.to_string(),
            details: None,
            status,
        }
    }
}

/// POST /add-device request body.
///
/// Fields are optional at the serde level so an absent field reports as a
/// structured validation detail instead of a deserialization rejection.
#[derive(Deserialize)]
pub struct AddDeviceBody {
    #[serde(rename = "deviceIdentifier")]
    pub device_identifier: Option<IdentifierBody>,
}

#[derive(Deserialize)]
pub struct IdentifierBody {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "devEUI")]
    pub dev_eui: Option<String>,
}

/// DELETE /delete-device request body.
#[derive(Deserialize)]
pub struct DeleteDeviceBody {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
}

fn validate_identifier(body: AddDeviceBody) -> Result<DeviceIdentifier, ApiError> {
    let Some(inner) = body.device_identifier else {
        return Err(ApiError::validation(vec![FieldError::required(
            "deviceIdentifier",
        )]));
    };

    let mut details = Vec::new();
    if inner.access_token.as_deref().unwrap_or("").is_empty() {
        details.push(FieldError::required("deviceIdentifier.accessToken"));
    }
    if inner.dev_eui.as_deref().unwrap_or("").is_empty() {
        details.push(FieldError::required("deviceIdentifier.devEUI"));
    }
    if !details.is_empty() {
        return Err(ApiError::validation(details));
    }

    Ok(DeviceIdentifier {
        access_token: inner.access_token.unwrap_or_default(),
        dev_eui: inner.dev_eui.unwrap_or_default(),
    })
}

/// GET /health
pub async fn health() -> &'static str {
    "Healthy"
}

/// GET /devices
pub async fn list_devices(State(registry): State<Arc<Registry>>) -> Json<Vec<DeviceSnapshot>> {
    Json(registry.list().await)
}

/// POST /add-device
pub async fn add_device(
    State(registry): State<Arc<Registry>>,
    Json(body): Json<AddDeviceBody>,
) -> Result<StatusCode, ApiError> {
    let identifier = validate_identifier(body)?;
    registry.register(identifier).await?;

    Ok(StatusCode::CREATED)
}

/// DELETE /delete-device
pub async fn delete_device(
    State(registry): State<Arc<Registry>>,
    Json(body): Json<DeleteDeviceBody>,
) -> Result<StatusCode, ApiError> {
    let access_token = match body.access_token {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(ApiError::validation(vec![FieldError::required(
                "accessToken",
            )]))
        }
    };
    registry.deregister(&access_token).await?;

    Ok(StatusCode::NO_CONTENT)
}
