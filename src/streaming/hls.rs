//! HLS serving.
//!
//! The stored playlist holds bare segment names; it is rewritten per request
//! with the public base URL and the listener, so segment fetches can be
//! attributed for play counting. Segments are streamed from disk.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use trackwave_common::{ListenerId, TrackId};
use trackwave_db::MetadataStore;
use trackwave_media::{HlsFile, SegmentManifest};

use crate::error::Error;
use crate::server::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct HlsQuery {
    /// Listener to attribute segment fetches to. Anonymous fetches are
    /// served but not counted.
    #[serde(default)]
    pub listener: Option<String>,
}

/// Serve `playlist.m3u8` or `segment<N>.ts` for a track.
pub async fn hls_file(
    State(state): State<AppState>,
    Path((track_id, file_name)): Path<(String, String)>,
    Query(query): Query<HlsQuery>,
) -> Result<Response, AppError> {
    let id: TrackId = track_id.parse()?;
    let file = HlsFile::parse(&file_name)
        .map_err(|_| Error::not_found(format!("no such HLS file: {file_name}")))?;
    let listener = query
        .listener
        .as_deref()
        .map(str::parse::<ListenerId>)
        .transpose()?;

    let track = state
        .store
        .get_track(id)?
        .ok_or_else(|| Error::not_found(format!("track {id}")))?;
    let path = state.layout.hls_path(&track.owner, id, &file);

    let body = match file {
        HlsFile::Manifest => {
            let text = read_to_string(&path).await?;
            let manifest = SegmentManifest::parse(&text)?;
            let base = format!(
                "{}/api/hls/{}",
                state.config.server.public_base_url.as_deref().unwrap_or(""),
                id
            );
            let query = listener.as_ref().map(|l| format!("listener={l}"));
            Body::from(manifest.rewrite_with_query(&base, query.as_deref()))
        }
        HlsFile::Segment(index) => {
            let file = open(&path).await?;
            if let Some(listener) = &listener {
                state.plays.segment_fetched(listener, id);
            }
            tracing::trace!(track_id = %id, segment = index, "Serving segment");
            Body::from_stream(ReaderStream::new(file))
        }
    };

    Response::builder()
        .header(header::CONTENT_TYPE, file.content_type())
        .header(header::CACHE_CONTROL, file.cache_control())
        .body(body)
        .map_err(|e| AppError::new(Error::internal(e.to_string())))
}

async fn open(path: &std::path::Path) -> Result<tokio::fs::File, Error> {
    tokio::fs::File::open(path).await.map_err(|e| missing(path, e))
}

async fn read_to_string(path: &std::path::Path) -> Result<String, Error> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| missing(path, e))
}

fn missing(path: &std::path::Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::not_found(format!(
            "{} not found",
            path.file_name().unwrap_or_default().to_string_lossy()
        ))
    } else {
        Error::Io(e)
    }
}
