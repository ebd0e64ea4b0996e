//! Track delivery.
//!
//! Two modes share one play counter:
//!
//! - **HLS**: the segmented encode, served file by file. Each segment fetch
//!   is progress for the listener.
//! - **Persistent stream**: the continuous ADTS bitstream, seeked by
//!   constant-bitrate arithmetic and pushed in frame batches over a
//!   WebSocket, with the client reporting progress on the same socket.
//!
//! # Routes
//!
//! - `GET /hls/:track_id/:file` - `playlist.m3u8` or `segment<N>.ts`
//! - `GET /stream/:track_id` - WebSocket stream session

mod cbr;
mod hls;
mod registry;
mod session;
pub mod transport;
mod ws;

pub use cbr::{enforce_cbr, CbrVerdicts};
pub use hls::{hls_file, HlsQuery};
pub use registry::{SessionInfo, SessionRegistration, SessionRegistry};
pub use session::{prepare_stream, run_session, EndReason, PreparedStream, SessionOutcome};
pub use transport::{ControlChannel, ControlSignal, FrameSink, StreamMetadata};
pub use ws::{stream_track, StreamQuery, WsControl, WsSink, DURATION_HEADER};

use axum::{routing::get, Router};

use crate::server::AppState;

/// Create HLS router.
pub fn hls_router() -> Router<AppState> {
    Router::new().route("/:track_id/:file", get(hls_file))
}

/// Create persistent stream router.
pub fn stream_router() -> Router<AppState> {
    Router::new().route("/:track_id", get(stream_track))
}
