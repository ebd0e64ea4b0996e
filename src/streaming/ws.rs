//! WebSocket transport for stream sessions.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::HeaderValue,
    response::Response,
};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use trackwave_common::{ListenerId, TrackId};
use trackwave_db::MetadataStore;

use super::session::{prepare_stream, run_session, PreparedStream};
use super::transport::{ControlChannel, ControlSignal, FrameSink, StreamMetadata};
use crate::error::{Error, Result};
use crate::server::{AppError, AppState};

/// Response header carrying the estimated track duration in seconds.
pub const DURATION_HEADER: &str = "music-duration";

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub listener: String,
    /// Start position in seconds.
    #[serde(default)]
    pub start: f64,
}

/// First text message of a session.
#[derive(Serialize)]
struct MetadataMessage<'a> {
    event: &'static str,
    #[serde(flatten)]
    metadata: &'a StreamMetadata,
}

pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

pub struct WsControl {
    inner: SplitStream<WebSocket>,
}

/// Split an upgraded socket into session halves.
pub fn split(socket: WebSocket) -> (WsSink, WsControl) {
    let (sink, stream) = socket.split();
    (WsSink { inner: sink }, WsControl { inner: stream })
}

impl WsSink {
    async fn send(&mut self, message: Message) -> Result<()> {
        self.inner
            .send(message)
            .await
            .map_err(|e| Error::transport(e.to_string()))
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_metadata(&mut self, metadata: &StreamMetadata) -> Result<()> {
        let text = serde_json::to_string(&MetadataMessage {
            event: "metadata",
            metadata,
        })
        .map_err(|e| Error::internal(e.to_string()))?;
        self.send(Message::Text(text)).await
    }

    async fn send_batch(&mut self, batch: Bytes) -> Result<()> {
        self.send(Message::Binary(batch.to_vec())).await
    }

    async fn send_event(&mut self, event: String) -> Result<()> {
        self.send(Message::Text(event)).await
    }

    async fn close(&mut self) -> Result<()> {
        // A client that stopped reading must not hold the session open.
        let closing = async {
            let _ = self.inner.send(Message::Close(None)).await;
            self.inner.close().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
            Ok(result) => result.map_err(|e| Error::transport(e.to_string())),
            Err(_) => Err(Error::transport("timed out closing socket")),
        }
    }
}

#[async_trait]
impl ControlChannel for WsControl {
    async fn recv(&mut self) -> Result<Option<ControlSignal>> {
        while let Some(message) = self.inner.next().await {
            match message.map_err(|e| Error::transport(e.to_string()))? {
                Message::Text(text) => {
                    if let Some(signal) = ControlSignal::parse(text.trim()) {
                        return Ok(Some(signal));
                    }
                    tracing::trace!(message = %text, "Ignoring unknown control message");
                }
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }
}

/// `GET /api/stream/:track_id?listener=&start=`
///
/// Seeks before upgrading, so a bad start position or an unusable bitstream
/// is reported as a plain HTTP error.
pub async fn stream_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> std::result::Result<Response, AppError> {
    let id: TrackId = track_id.parse()?;
    let listener: ListenerId = query.listener.parse()?;

    let track = state
        .store
        .get_track(id)?
        .ok_or_else(|| Error::not_found(format!("track {id}")))?;
    let path = state.layout.bitstream_path(&track.owner, id);
    let bitstream = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::not_found(format!("bitstream for track {id}"))
        } else {
            Error::Io(e)
        }
    })?;

    let cbr = Arc::clone(&state.cbr);
    let config = Arc::clone(&state.config);
    let start = query.start;
    let prepared = tokio::task::spawn_blocking(move || {
        cbr.enforce(id, &bitstream, &config.stream)?;
        prepare_stream(Bytes::from(bitstream), start, &config.stream)
    })
    .await
    .map_err(|e| Error::internal(format!("Stream preparation task failed: {e}")))??;
    let duration = prepared.metadata.duration_secs;
    tracing::debug!(
        track_id = %id,
        listener = %listener,
        offset = prepared.offset,
        duration_secs = duration,
        "Prepared stream"
    );

    let mut response =
        ws.on_upgrade(move |socket| run_socket(state, socket, listener, id, prepared));
    if let Ok(value) = HeaderValue::from_str(&format!("{duration:.3}")) {
        response.headers_mut().insert(DURATION_HEADER, value);
    }
    Ok(response)
}

async fn run_socket(
    state: AppState,
    socket: WebSocket,
    listener: ListenerId,
    track: TrackId,
    prepared: PreparedStream,
) {
    let registration = state.sessions.register(
        listener,
        track,
        prepared.metadata.start_secs,
        &state.shutdown,
    );
    let session_id = registration.id;
    let (sink, control) = split(socket);

    match run_session(
        registration,
        prepared,
        state.config.stream.batch_frames,
        &state.plays,
        sink,
        control,
    )
    .await
    {
        Ok(outcome) => tracing::info!(
            session_id = %session_id,
            frames = outcome.frames_sent,
            reason = ?outcome.reason,
            "Stream session closed"
        ),
        Err(e) => tracing::warn!(session_id = %session_id, error = %e, "Stream session failed"),
    }
}
