use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    domain::{ChatTarget, MessageId},
    platform::{MediaKind, PlatformPort},
    Error, Result,
};

/// Shared state for gateway request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub platform: Arc<dyn PlatformPort>,
    /// Shared secret for the control API. `None` leaves the gateway open.
    pub api_token: Option<String>,
}

/// Control API server: one platform operation per authenticated request.
pub struct GatewayServer {
    port: u16,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl GatewayServer {
    /// Bind `host:port` (port 0 picks a free one) and serve the command
    /// routes on a background task.
    pub async fn start(host: &str, port: u16, state: GatewayState) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = build_router(state);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        info!("command gateway listening on port {port}");
        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shut the server down gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/sendMessage", post(send_message))
        .route("/sendPhoto", post(send_photo))
        .route("/sendDocument", post(send_document))
        .route("/sendAudio", post(send_audio))
        .route("/sendVoice", post(send_voice))
        .route("/sendVideo", post(send_video))
        .route("/sendAnimation", post(send_animation))
        .route("/sendVideoNote", post(send_video_note))
        .route("/sendLocation", post(send_location))
        .route("/sendContact", post(send_contact))
        .route("/editMessageText", post(edit_message_text))
        .route("/deleteMessage", post(delete_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .with_state(state)
}

// === Errors ===

/// Gateway-level request failure, rendered as a `{"detail": ...}` body.
pub enum ApiError {
    Unauthorized,
    Platform(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Platform(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "Invalid API key".to_string())
            }
            ApiError::Platform(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

// === Authorization ===

/// Reject requests whose `x-api-key` header does not match the configured
/// shared secret. No secret configured means the gateway is open.
async fn require_api_key(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = &state.api_token else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected.as_str()) {
        next.run(request).await
    } else {
        ApiError::Unauthorized.into_response()
    }
}

// === Request/response bodies ===

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub chat_id: ChatTarget,
    pub text: String,
}

#[derive(Deserialize)]
pub struct SendPhotoRequest {
    pub chat_id: ChatTarget,
    pub photo: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct SendDocumentRequest {
    pub chat_id: ChatTarget,
    pub document: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct SendAudioRequest {
    pub chat_id: ChatTarget,
    pub audio: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct SendVoiceRequest {
    pub chat_id: ChatTarget,
    pub voice: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct SendVideoRequest {
    pub chat_id: ChatTarget,
    pub video: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct SendAnimationRequest {
    pub chat_id: ChatTarget,
    pub animation: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Deserialize)]
pub struct SendVideoNoteRequest {
    pub chat_id: ChatTarget,
    pub video_note: String,
}

#[derive(Deserialize)]
pub struct SendLocationRequest {
    pub chat_id: ChatTarget,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
pub struct SendContactRequest {
    pub chat_id: ChatTarget,
    pub phone_number: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Deserialize)]
pub struct EditMessageTextRequest {
    pub chat_id: ChatTarget,
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Deserialize)]
pub struct DeleteMessageRequest {
    pub chat_id: ChatTarget,
    pub message_id: MessageId,
}

#[derive(Serialize)]
pub struct MessageIdResponse {
    pub message_id: MessageId,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

type HandlerResult<T> = std::result::Result<Json<T>, ApiError>;

// === Handlers: exactly one platform call per valid, authorized request ===

async fn send_message(
    State(state): State<GatewayState>,
    Json(req): Json<SendMessageRequest>,
) -> HandlerResult<MessageIdResponse> {
    let message_id = state.platform.send_text(&req.chat_id, &req.text).await?;
    Ok(Json(MessageIdResponse { message_id }))
}

async fn relay_media_send(
    state: &GatewayState,
    chat: &ChatTarget,
    kind: MediaKind,
    input: &str,
    caption: Option<&str>,
) -> HandlerResult<MessageIdResponse> {
    let message_id = state.platform.send_media(chat, kind, input, caption).await?;
    Ok(Json(MessageIdResponse { message_id }))
}

async fn send_photo(
    State(state): State<GatewayState>,
    Json(req): Json<SendPhotoRequest>,
) -> HandlerResult<MessageIdResponse> {
    relay_media_send(
        &state,
        &req.chat_id,
        MediaKind::Photo,
        &req.photo,
        req.caption.as_deref(),
    )
    .await
}

async fn send_document(
    State(state): State<GatewayState>,
    Json(req): Json<SendDocumentRequest>,
) -> HandlerResult<MessageIdResponse> {
    relay_media_send(
        &state,
        &req.chat_id,
        MediaKind::Document,
        &req.document,
        req.caption.as_deref(),
    )
    .await
}

async fn send_audio(
    State(state): State<GatewayState>,
    Json(req): Json<SendAudioRequest>,
) -> HandlerResult<MessageIdResponse> {
    relay_media_send(
        &state,
        &req.chat_id,
        MediaKind::Audio,
        &req.audio,
        req.caption.as_deref(),
    )
    .await
}

async fn send_voice(
    State(state): State<GatewayState>,
    Json(req): Json<SendVoiceRequest>,
) -> HandlerResult<MessageIdResponse> {
    relay_media_send(
        &state,
        &req.chat_id,
        MediaKind::Voice,
        &req.voice,
        req.caption.as_deref(),
    )
    .await
}

async fn send_video(
    State(state): State<GatewayState>,
    Json(req): Json<SendVideoRequest>,
) -> HandlerResult<MessageIdResponse> {
    relay_media_send(
        &state,
        &req.chat_id,
        MediaKind::Video,
        &req.video,
        req.caption.as_deref(),
    )
    .await
}

async fn send_animation(
    State(state): State<GatewayState>,
    Json(req): Json<SendAnimationRequest>,
) -> HandlerResult<MessageIdResponse> {
    relay_media_send(
        &state,
        &req.chat_id,
        MediaKind::Animation,
        &req.animation,
        req.caption.as_deref(),
    )
    .await
}

async fn send_video_note(
    State(state): State<GatewayState>,
    Json(req): Json<SendVideoNoteRequest>,
) -> HandlerResult<MessageIdResponse> {
    relay_media_send(
        &state,
        &req.chat_id,
        MediaKind::VideoNote,
        &req.video_note,
        None,
    )
    .await
}

async fn send_location(
    State(state): State<GatewayState>,
    Json(req): Json<SendLocationRequest>,
) -> HandlerResult<MessageIdResponse> {
    let message_id = state
        .platform
        .send_location(&req.chat_id, req.latitude, req.longitude)
        .await?;
    Ok(Json(MessageIdResponse { message_id }))
}

async fn send_contact(
    State(state): State<GatewayState>,
    Json(req): Json<SendContactRequest>,
) -> HandlerResult<MessageIdResponse> {
    let message_id = state
        .platform
        .send_contact(
            &req.chat_id,
            &req.phone_number,
            &req.first_name,
            req.last_name.as_deref(),
        )
        .await?;
    Ok(Json(MessageIdResponse { message_id }))
}

async fn edit_message_text(
    State(state): State<GatewayState>,
    Json(req): Json<EditMessageTextRequest>,
) -> HandlerResult<MessageIdResponse> {
    let message_id = state
        .platform
        .edit_text(&req.chat_id, req.message_id, &req.text)
        .await?;
    Ok(Json(MessageIdResponse { message_id }))
}

async fn delete_message(
    State(state): State<GatewayState>,
    Json(req): Json<DeleteMessageRequest>,
) -> HandlerResult<AckResponse> {
    state
        .platform
        .delete_message(&req.chat_id, req.message_id)
        .await?;
    Ok(Json(AckResponse { ok: true }))
}
