use crate::api::AppState;
use crate::api::schemas::email::{EmailResponse, SendEmailBody, SendEmailResponse};
use crate::domain::email::EmailRequest;
use crate::error::{AppError, Result};
use crate::proto::courier::v1 as proto;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::PathRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use prost::Message;
use uuid::Uuid;

const PROTOBUF_CONTENT_TYPES: [&str; 2] = ["application/x-protobuf", "application/protobuf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Protobuf,
}

impl BodyFormat {
    fn from_headers(headers: &HeaderMap) -> Self {
        let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();
        if PROTOBUF_CONTENT_TYPES.iter().any(|t| content_type.starts_with(t)) { Self::Protobuf } else { Self::Json }
    }
}

/// Records a send request and schedules its delivery.
///
/// # Errors
/// Returns `AppError::BadRequest` if the body is malformed or fails validation.
/// Returns `AppError::NoRelayConfigured` if no relay is available.
pub async fn send_email(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Response> {
    let format = BodyFormat::from_headers(&headers);

    let request: EmailRequest = match format {
        BodyFormat::Json => serde_json::from_slice::<SendEmailBody>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))?
            .try_into()?,
        BodyFormat::Protobuf => proto::SendEmailRequest::decode(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid SendEmailRequest protobuf: {e}")))?
            .into(),
    };

    let email = state.dispatcher.submit(request).await?;

    let response = match format {
        BodyFormat::Json => (StatusCode::CREATED, Json(SendEmailResponse::from(&email))).into_response(),
        BodyFormat::Protobuf => (
            StatusCode::CREATED,
            [(header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPES[0])],
            proto::SendEmailResponse::from(&email).encode_to_vec(),
        )
            .into_response(),
    };
    Ok(response)
}

/// Returns the current record for an email.
///
/// # Errors
/// Returns `AppError::BadRequest` if the id is not a UUID.
/// Returns `AppError::NotFound` if the id is unknown.
pub async fn get_email(
    State(state): State<AppState>,
    id: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<EmailResponse>> {
    let Path(id) = id.map_err(|e| AppError::BadRequest(format!("Invalid email id: {}", e.body_text())))?;
    let email = state.dispatcher.fetch(id).await?;
    Ok(Json(email.into()))
}
