//! Turning listening activity into persisted plays.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use trackwave_common::{ListenerId, TrackId};
use trackwave_db::SqliteMetadataStore;

use super::debouncer::{start_sweep_task, ConfirmedPlay, DebounceSettings, PlayDebouncer, PlayKey};
use crate::config::{ConfirmRule, PlaysConfig};
use crate::streaming::SessionRegistry;

/// Event pushed to a listener's open streams when a play is confirmed.
pub const PLAY_CONFIRMED: &str = "play_confirmed";

/// Where confirmed plays are persisted.
pub trait PlaySink: Send + Sync {
    fn record_play(&self, listener: &ListenerId, track: TrackId) -> trackwave_common::Result<()>;
}

impl PlaySink for SqliteMetadataStore {
    fn record_play(&self, listener: &ListenerId, track: TrackId) -> trackwave_common::Result<()> {
        SqliteMetadataStore::record_play(self, listener, track)
    }
}

/// How the listener is receiving the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Persistent stream session; activity is the "still playing" marker.
    Stream,
    /// HLS; activity is a segment fetch.
    Segments,
}

/// Debouncer plus persistence plus session notification.
pub struct PlayCounter {
    debouncer: Arc<PlayDebouncer>,
    sink: Arc<dyn PlaySink>,
    registry: SessionRegistry,
    stream_rule: ConfirmRule,
    segment_rule: ConfirmRule,
    sweep_interval: Duration,
}

impl PlayCounter {
    pub fn new(config: &PlaysConfig, sink: Arc<dyn PlaySink>, registry: SessionRegistry) -> Self {
        Self {
            debouncer: Arc::new(PlayDebouncer::new(DebounceSettings::from(config))),
            sink,
            registry,
            stream_rule: config.stream_rule,
            segment_rule: config.segment_rule,
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    pub fn debouncer(&self) -> &Arc<PlayDebouncer> {
        &self.debouncer
    }

    pub fn rule(&self, mode: DeliveryMode) -> ConfirmRule {
        match mode {
            DeliveryMode::Stream => self.stream_rule,
            DeliveryMode::Segments => self.segment_rule,
        }
    }

    /// A stream session reported that it is still playing.
    ///
    /// `listening_since` is when the session opened. Returns whether a play
    /// was confirmed.
    pub fn still_playing(
        &self,
        listener: &ListenerId,
        track: TrackId,
        listening_since: Instant,
    ) -> bool {
        self.activity(
            DeliveryMode::Stream,
            PlayKey::new(listener.clone(), track),
            Some(listening_since),
            Instant::now(),
        )
    }

    /// A segment of `track` was fetched by `listener`.
    pub fn segment_fetched(&self, listener: &ListenerId, track: TrackId) -> bool {
        self.activity(
            DeliveryMode::Segments,
            PlayKey::new(listener.clone(), track),
            None,
            Instant::now(),
        )
    }

    /// Apply the rule configured for `mode` and handle a resulting play.
    pub fn activity(
        &self,
        mode: DeliveryMode,
        key: PlayKey,
        listening_since: Option<Instant>,
        now: Instant,
    ) -> bool {
        let confirmed = match self.rule(mode) {
            ConfirmRule::Ticks => self.debouncer.tick_at(key, now),
            ConfirmRule::WallClock => {
                let since = match listening_since {
                    Some(since) => since,
                    None => self.debouncer.touch_at(&key, now),
                };
                self.debouncer.confirm_long_listen_at(key, since, now)
            }
        };

        match confirmed {
            Some(play) => {
                self.record(play);
                true
            }
            None => false,
        }
    }

    fn record(&self, play: ConfirmedPlay) {
        let ConfirmedPlay { key, .. } = play;
        match self.sink.record_play(&key.listener, key.track) {
            Ok(()) => {
                tracing::info!(listener = %key.listener, track_id = %key.track, "Play recorded");
            }
            Err(e) => {
                tracing::warn!(
                    listener = %key.listener,
                    track_id = %key.track,
                    error = %e,
                    "Failed to record play"
                );
            }
        }

        let event = serde_json::json!({
            "event": PLAY_CONFIRMED,
            "track_id": key.track,
        })
        .to_string();
        self.registry.notify(&key.listener, key.track, &event);
    }

    /// Start the periodic idle sweep.
    pub fn start_sweep(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        start_sweep_task(Arc::clone(&self.debouncer), self.sweep_interval, cancel)
    }
}
