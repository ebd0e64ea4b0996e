use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use trackwave_common::{ListenerId, SessionId, TrackId};
use trackwave_db::models::{NewTrack, Track};
use trackwave_db::MetadataStore;
use trackwave_media::FrameStats;

use crate::error::Error;
use crate::server::{AppError, AppState};
use crate::streaming::SessionInfo;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/tracks", post(upload_track))
        .route("/tracks/:id", get(get_track).delete(delete_track))
        .route("/listeners/:listener/tracks", get(list_listener_tracks))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session).delete(cancel_session))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub owner: String,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub release_year: Option<i32>,
}

impl UploadQuery {
    fn into_new_track(self) -> Result<NewTrack, Error> {
        let owner: ListenerId = self.owner.parse()?;
        if self.artist.trim().is_empty() || self.title.trim().is_empty() {
            return Err(Error::invalid_input("artist and title are required"));
        }
        let mut new = NewTrack::new(owner, self.artist.trim(), self.title.trim());
        new.album_name = self.album;
        new.genre = self.genre;
        new.description = self.description;
        new.release_year = self.release_year;
        Ok(new)
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub track: Track,
    pub segment_count: usize,
    pub frames: FrameStats,
}

/// `POST /api/tracks` with the raw audio as the body.
async fn upload_track(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let new = query.into_new_track()?;
    tracing::info!(owner = %new.owner, title = %new.title, bytes = body.len(), "Upload received");

    let outcome = state.ingest.submit(new, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            track: outcome.track,
            segment_count: outcome.segment_count,
            frames: outcome.frames,
        }),
    ))
}

async fn get_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Track>, AppError> {
    let id: TrackId = id.parse()?;
    let track = state
        .store
        .get_track(id)?
        .ok_or_else(|| Error::not_found(format!("track {id}")))?;
    Ok(Json(track))
}

async fn delete_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id: TrackId = id.parse()?;
    state.ingest.pipeline().delete(id).await?;
    state.cbr.forget(id);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_listener_tracks(
    State(state): State<AppState>,
    Path(listener): Path<String>,
) -> Result<Json<Vec<Track>>, AppError> {
    let listener: ListenerId = listener.parse()?;
    Ok(Json(state.store.list_tracks_by_owner(&listener)?))
}

async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.list())
}

fn parse_session_id(id: &str) -> Result<SessionId, Error> {
    uuid::Uuid::parse_str(id)
        .map(SessionId::from)
        .map_err(|_| Error::invalid_input(format!("invalid session id: {id:?}")))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, AppError> {
    let id = parse_session_id(&id)?;
    let info = state
        .sessions
        .get(&id)
        .ok_or_else(|| Error::not_found(format!("session {id}")))?;
    Ok(Json(info))
}

/// Stop a stream session; the client sees the socket close.
async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_session_id(&id)?;
    if !state.sessions.cancel(&id) {
        return Err(Error::not_found(format!("session {id}")).into());
    }
    tracing::info!(session_id = %id, "Session cancelled");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(owner: &str, artist: &str) -> UploadQuery {
        UploadQuery {
            owner: owner.into(),
            artist: artist.into(),
            title: "Echo".into(),
            album: Some("Rooms".into()),
            genre: None,
            description: None,
            release_year: Some(2021),
        }
    }

    #[test]
    fn test_parse_session_id() {
        let id = SessionId::new();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
        assert!(matches!(parse_session_id("nope"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_upload_query_validation() {
        let new = query("alice", " Alice ").into_new_track().unwrap();
        assert_eq!(new.artist_name, "Alice");
        assert_eq!(new.album_name.as_deref(), Some("Rooms"));
        assert_eq!(new.release_year, Some(2021));

        assert!(matches!(
            query("alice/..", "Alice").into_new_track(),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            query("alice", "  ").into_new_track(),
            Err(Error::InvalidInput(_))
        ));
    }
}
