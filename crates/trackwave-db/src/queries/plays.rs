//! Confirmed-play counters.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use trackwave_common::{Error, ListenerId, Result, TrackId};

use super::{db_err, listener_col, timestamp_col};
use crate::models::TrackListens;

/// Record one confirmed play of `track` by `listener`.
///
/// Bumps the track total, the listener total and the pair counter in one
/// transaction. Fails with `NotFound` if the track no longer exists.
pub fn increment_plays(conn: &Connection, listener: &ListenerId, track: TrackId) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction().map_err(db_err)?;

    let updated = tx
        .execute(
            "UPDATE tracks SET plays = plays + 1 WHERE id = :id",
            rusqlite::named_params! { ":id": track.get() },
        )
        .map_err(db_err)?;
    if updated == 0 {
        return Err(Error::not_found(format!("track {track}")));
    }

    tx.execute(
        "INSERT INTO listener_plays (listener, plays) VALUES (:listener, 1)
         ON CONFLICT(listener) DO UPDATE SET plays = plays + 1",
        rusqlite::named_params! { ":listener": listener.as_str() },
    )
    .map_err(db_err)?;

    tx.execute(
        "INSERT INTO track_listens (listener, track_id, plays, last_played_at)
         VALUES (:listener, :track_id, 1, :now)
         ON CONFLICT(listener, track_id) DO UPDATE
         SET plays = plays + 1, last_played_at = :now",
        rusqlite::named_params! {
            ":listener": listener.as_str(),
            ":track_id": track.get(),
            ":now": now,
        },
    )
    .map_err(db_err)?;

    tx.commit().map_err(db_err)
}

/// Total confirmed plays by `listener` across all tracks.
pub fn get_listener_plays(conn: &Connection, listener: &ListenerId) -> Result<i64> {
    conn.query_row(
        "SELECT plays FROM listener_plays WHERE listener = :listener",
        rusqlite::named_params! { ":listener": listener.as_str() },
        |row| row.get(0),
    )
    .optional()
    .map(|plays| plays.unwrap_or(0))
    .map_err(db_err)
}

/// Confirmed plays of one track by one listener.
pub fn get_track_listens(
    conn: &Connection,
    listener: &ListenerId,
    track: TrackId,
) -> Result<Option<TrackListens>> {
    conn.query_row(
        "SELECT listener, track_id, plays, last_played_at FROM track_listens
         WHERE listener = :listener AND track_id = :track_id",
        rusqlite::named_params! {
            ":listener": listener.as_str(),
            ":track_id": track.get(),
        },
        |row| {
            Ok(TrackListens {
                listener: listener_col(row, 0)?,
                track_id: TrackId::from(row.get::<_, i64>(1)?),
                plays: row.get(2)?,
                last_played_at: timestamp_col(row, 3)?,
            })
        },
    )
    .optional()
    .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTrack;
    use crate::pool::init_memory_pool;
    use crate::queries::tracks::{create_track, delete_track, get_track};

    #[test]
    fn test_increment_bumps_all_counters() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let alice: ListenerId = "alice".parse().unwrap();
        let bob: ListenerId = "bob".parse().unwrap();
        let track = create_track(&conn, &NewTrack::new(alice.clone(), "Alice", "Loop")).unwrap();

        increment_plays(&conn, &bob, track.id).unwrap();
        increment_plays(&conn, &bob, track.id).unwrap();
        increment_plays(&conn, &alice, track.id).unwrap();

        assert_eq!(get_track(&conn, track.id).unwrap().unwrap().plays, 3);
        assert_eq!(get_listener_plays(&conn, &bob).unwrap(), 2);
        assert_eq!(get_listener_plays(&conn, &alice).unwrap(), 1);
        assert_eq!(
            get_track_listens(&conn, &bob, track.id).unwrap().unwrap().plays,
            2
        );
    }

    #[test]
    fn test_unknown_listener_has_zero() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let nobody: ListenerId = "nobody".parse().unwrap();
        assert_eq!(get_listener_plays(&conn, &nobody).unwrap(), 0);
        assert!(get_track_listens(&conn, &nobody, TrackId::from(1)).unwrap().is_none());
    }

    #[test]
    fn test_deleted_track_rolls_back() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let alice: ListenerId = "alice".parse().unwrap();
        let track = create_track(&conn, &NewTrack::new(alice.clone(), "Alice", "Gone")).unwrap();
        delete_track(&conn, track.id).unwrap();

        assert!(matches!(
            increment_plays(&conn, &alice, track.id),
            Err(Error::NotFound(_))
        ));
        assert_eq!(get_listener_plays(&conn, &alice).unwrap(), 0);
    }
}
