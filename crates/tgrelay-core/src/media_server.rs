use std::{path::PathBuf, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use crate::Result;

/// Read-only HTTP server exposing stored media blobs by filename.
///
/// No authentication: URLs are derived from event ids and treated as
/// unguessable-enough identifiers.
pub struct MediaServer {
    port: u16,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MediaServer {
    /// Bind `host:port` (port 0 picks a free one) and start serving
    /// `GET /media/{filename}` from `dir` on a background task.
    pub async fn start(host: &str, port: u16, dir: PathBuf) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(dir);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        info!("media server listening on port {port}");
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

fn router(dir: PathBuf) -> Router {
    Router::new()
        .route("/media/{filename}", get(serve_media))
        .with_state(Arc::new(dir))
}

/// GET /media/{filename}: the blob's bytes, or 404.
async fn serve_media(State(dir): State<Arc<PathBuf>>, Path(filename): Path<String>) -> Response {
    // Blob names are single path components; anything else cannot name a
    // stored file.
    if filename.contains('/') || filename.contains('\\') || filename == ".." {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    let path = dir.join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, content_type_for(&filename))],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// Content type from the filename extension. Blobs saved by the relay are
/// extensionless and fall back to octet-stream.
fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
