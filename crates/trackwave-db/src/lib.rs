//! Trackwave-DB: database schema, migrations, and query operations
//!
//! Track metadata and play counters live in SQLite, accessed through rusqlite
//! with r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//! - `store` - The [`MetadataStore`](store::MetadataStore) seam used by ingestion
//!
//! # Example
//!
//! ```no_run
//! use trackwave_db::models::NewTrack;
//! use trackwave_db::pool::{get_conn, init_pool};
//! use trackwave_db::queries::tracks;
//!
//! let pool = init_pool("/var/lib/trackwave/trackwave.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let new = NewTrack::new("alice".parse().unwrap(), "Alice", "First Light");
//! let track = tracks::create_track(&conn, &new).unwrap();
//! println!("Created track {}", track.id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod store;

pub use store::{MetadataStore, SqliteMetadataStore};
