//! HTTP API for the device service
//!
//! Devices leave this layer only as [`DeviceSummary`]; private keys and raw
//! history never appear in a response. Binary values are base64 encoded.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use signet_core::{DeviceSummary, NewSignatureDeviceRequest};

use crate::error::DaemonError;
use crate::service::DeviceService;

/// Generic success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Generic error envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignTransactionRequest {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    /// Missing data signs the empty string
    #[serde(default)]
    pub data_to_be_signed: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignTransactionResponse {
    /// Base64 signature
    pub signature: String,
    /// Base64 of the exact payload that was signed
    pub signed_data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Clone)]
struct AppState {
    service: Arc<DeviceService>,
}

/// Build the API router
pub fn router(service: Arc<DeviceService>) -> Router {
    Router::new()
        .route("/api/v0/health", get(health))
        .route("/api/v0/create-signature-device", post(create_signature_device))
        .route("/api/v0/sign-transaction", post(sign_transaction))
        .route("/api/v0/devices", get(list_devices))
        .route("/api/v0/devices/:id", get(get_device))
        .route("/api/v0/device-signs/:id", get(device_signatures))
        .with_state(AppState { service })
        .layer(TraceLayer::new_for_http())
}

/// Daemon error mapped to an HTTP response
pub struct ApiError(DaemonError);

impl From<DaemonError> for ApiError {
    fn from(e: DaemonError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            DaemonError::UnknownSigningAlgorithm(_) => StatusCode::BAD_REQUEST,
            DaemonError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            DaemonError::DeviceAlreadyExists(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_internal() {
            error!("Internal error: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            warn!("Request failed: {}", self.0);
            self.0.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                errors: vec![message],
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn respond<T>(status: StatusCode, data: T) -> ApiResult<T> {
    Ok((status, Json(ApiResponse { data })))
}

async fn health() -> impl IntoResponse {
    Json(ApiResponse {
        data: HealthResponse {
            status: "pass".to_string(),
            version: "v0".to_string(),
        },
    })
}

async fn create_signature_device(
    State(state): State<AppState>,
    Json(req): Json<NewSignatureDeviceRequest>,
) -> ApiResult<DeviceSummary> {
    let device = state.service.create(req).await?;
    respond(StatusCode::CREATED, device.summary())
}

async fn sign_transaction(
    State(state): State<AppState>,
    Json(req): Json<SignTransactionRequest>,
) -> ApiResult<SignTransactionResponse> {
    let signed = state
        .service
        .sign_using_device(&req.device_id, req.data_to_be_signed.as_bytes())
        .await?;
    respond(
        StatusCode::CREATED,
        SignTransactionResponse {
            signature: STANDARD.encode(&signed.signature),
            signed_data: STANDARD.encode(&signed.signed_payload),
        },
    )
}

async fn list_devices(State(state): State<AppState>) -> ApiResult<Vec<DeviceSummary>> {
    let summaries = state.service.summaries().await?;
    respond(StatusCode::OK, summaries)
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeviceSummary> {
    let device = state.service.get(&id).await?;
    respond(StatusCode::OK, device.summary())
}

async fn device_signatures(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<String>> {
    let signatures = state.service.get_device_signatures(&id).await?;
    respond(
        StatusCode::OK,
        signatures.iter().map(|s| STANDARD.encode(s)).collect(),
    )
}
