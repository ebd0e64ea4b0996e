//! Track metadata queries.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use trackwave_common::{ListenerId, Result, TrackId};

use super::{db_err, listener_col, timestamp_col};
use crate::models::{NewTrack, Track};

const TRACK_COLUMNS: &str = "id, owner, artist_name, title, album_name, genre, description,
     release_year, duration_secs, bitrate_kbps, codec, added_at, plays";

fn row_to_track(row: &rusqlite::Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: TrackId::from(row.get::<_, i64>(0)?),
        owner: listener_col(row, 1)?,
        artist_name: row.get(2)?,
        title: row.get(3)?,
        album_name: row.get(4)?,
        genre: row.get(5)?,
        description: row.get(6)?,
        release_year: row.get(7)?,
        duration_secs: row.get(8)?,
        bitrate_kbps: row.get(9)?,
        codec: row.get(10)?,
        added_at: timestamp_col(row, 11)?,
        plays: row.get(12)?,
    })
}

/// Insert a track and return it with its assigned id.
pub fn create_track(conn: &Connection, new: &NewTrack) -> Result<Track> {
    let added_at = Utc::now();

    conn.execute(
        "INSERT INTO tracks (owner, artist_name, title, album_name, genre, description,
                             release_year, duration_secs, bitrate_kbps, codec, added_at)
         VALUES (:owner, :artist_name, :title, :album_name, :genre, :description,
                 :release_year, :duration_secs, :bitrate_kbps, :codec, :added_at)",
        rusqlite::named_params! {
            ":owner": new.owner.as_str(),
            ":artist_name": new.artist_name,
            ":title": new.title,
            ":album_name": new.album_name,
            ":genre": new.genre,
            ":description": new.description,
            ":release_year": new.release_year,
            ":duration_secs": new.duration_secs,
            ":bitrate_kbps": new.bitrate_kbps,
            ":codec": new.codec,
            ":added_at": added_at.to_rfc3339(),
        },
    )
    .map_err(db_err)?;

    Ok(Track {
        id: TrackId::from(conn.last_insert_rowid()),
        owner: new.owner.clone(),
        artist_name: new.artist_name.clone(),
        title: new.title.clone(),
        album_name: new.album_name.clone(),
        genre: new.genre.clone(),
        description: new.description.clone(),
        release_year: new.release_year,
        duration_secs: new.duration_secs,
        bitrate_kbps: new.bitrate_kbps,
        codec: new.codec.clone(),
        added_at,
        plays: 0,
    })
}

/// Look up a track by id.
pub fn get_track(conn: &Connection, id: TrackId) -> Result<Option<Track>> {
    conn.query_row(
        &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = :id"),
        rusqlite::named_params! { ":id": id.get() },
        row_to_track,
    )
    .optional()
    .map_err(db_err)
}

/// Delete a track. Returns whether a row was removed.
pub fn delete_track(conn: &Connection, id: TrackId) -> Result<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM tracks WHERE id = :id",
            rusqlite::named_params! { ":id": id.get() },
        )
        .map_err(db_err)?;
    Ok(deleted > 0)
}

/// All tracks uploaded by `owner`, newest first.
pub fn list_tracks_by_owner(conn: &Connection, owner: &ListenerId) -> Result<Vec<Track>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks WHERE owner = :owner ORDER BY id DESC"
        ))
        .map_err(db_err)?;
    let rows = stmt
        .query_map(
            rusqlite::named_params! { ":owner": owner.as_str() },
            row_to_track,
        )
        .map_err(db_err)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    fn sample(owner: &str, title: &str) -> NewTrack {
        NewTrack {
            album_name: Some("Dawn".into()),
            genre: Some("ambient".into()),
            release_year: Some(2024),
            duration_secs: Some(181.5),
            bitrate_kbps: Some(320),
            codec: Some("flac".into()),
            ..NewTrack::new(owner.parse().unwrap(), "Alice", title)
        }
    }

    #[test]
    fn test_create_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let created = create_track(&conn, &sample("alice", "First Light")).unwrap();
        let fetched = get_track(&conn, created.id).unwrap().unwrap();

        assert_eq!(fetched.title, "First Light");
        assert_eq!(fetched.owner.as_str(), "alice");
        assert_eq!(fetched.album_name.as_deref(), Some("Dawn"));
        assert_eq!(fetched.bitrate_kbps, Some(320));
        assert_eq!(fetched.plays, 0);
        assert_eq!(fetched.added_at.timestamp(), created.added_at.timestamp());
    }

    #[test]
    fn test_ids_increase() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let a = create_track(&conn, &sample("alice", "A")).unwrap();
        let b = create_track(&conn, &sample("alice", "B")).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn test_delete() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let track = create_track(&conn, &sample("alice", "Gone")).unwrap();

        assert!(delete_track(&conn, track.id).unwrap());
        assert!(get_track(&conn, track.id).unwrap().is_none());
        assert!(!delete_track(&conn, track.id).unwrap());
    }

    #[test]
    fn test_list_by_owner() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_track(&conn, &sample("alice", "One")).unwrap();
        create_track(&conn, &sample("bob", "Other")).unwrap();
        create_track(&conn, &sample("alice", "Two")).unwrap();

        let titles: Vec<_> = list_tracks_by_owner(&conn, &"alice".parse().unwrap())
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["Two", "One"]);
    }
}
