//! Play-count debouncing.
//!
//! Positional pings arrive constantly while something is playing. Only a
//! sustained listen should reach the persistent counter, so pings are
//! accumulated per (listener, track) and turned into at most one confirmed
//! play per listen.
//!
//! Entries live in a bounded LRU. Each entry has its own lock; the LRU lock is
//! only held long enough to find or create an entry, never while an entry is
//! being updated or swept.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use trackwave_common::{ListenerId, TrackId};

use crate::config::PlaysConfig;

/// Entry key: who is listening to what.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayKey {
    pub listener: ListenerId,
    pub track: TrackId,
}

impl PlayKey {
    pub fn new(listener: ListenerId, track: TrackId) -> Self {
        Self { listener, track }
    }
}

/// A play that passed one of the confirmation rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedPlay {
    pub key: PlayKey,
    pub at: Instant,
}

#[derive(Debug)]
struct PlayEntry {
    accumulated_ticks: u32,
    last_touched: Instant,
    /// Set by a tick, cleared by the sweep.
    armed: bool,
    /// First touch since the entry was created or last disarmed.
    listen_started: Instant,
    last_confirmed: Option<Instant>,
}

impl PlayEntry {
    fn new(now: Instant) -> Self {
        Self {
            accumulated_ticks: 0,
            last_touched: now,
            armed: false,
            listen_started: now,
            last_confirmed: None,
        }
    }

    fn touch(&mut self, now: Instant) {
        if !self.armed {
            self.listen_started = now;
        }
        self.last_touched = now;
        self.armed = true;
    }
}

/// Copy of an entry's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub accumulated_ticks: u32,
    pub armed: bool,
    pub last_touched: Instant,
    pub listen_started: Instant,
    pub last_confirmed: Option<Instant>,
}

/// Tunables for [`PlayDebouncer`].
#[derive(Debug, Clone, Copy)]
pub struct DebounceSettings {
    /// A tick confirms once the count exceeds this.
    pub tick_threshold: u32,
    /// Minimum listening time before the wall-clock rule confirms.
    pub long_listen: Duration,
    /// Armed entries untouched for longer than this are reset by the sweep.
    pub idle_reset: Duration,
    pub capacity: NonZeroUsize,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self::from(&PlaysConfig::default())
    }
}

impl From<&PlaysConfig> for DebounceSettings {
    fn from(config: &PlaysConfig) -> Self {
        Self {
            tick_threshold: config.tick_threshold,
            long_listen: Duration::from_secs(config.long_listen_secs),
            idle_reset: Duration::from_secs(config.idle_reset_secs),
            capacity: NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

type SharedEntry = Arc<Mutex<PlayEntry>>;

/// Bounded, concurrently updated map of play-count entries.
pub struct PlayDebouncer {
    entries: Mutex<LruCache<PlayKey, SharedEntry>>,
    settings: DebounceSettings,
}

impl std::fmt::Debug for PlayDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayDebouncer")
            .field("entries", &self.entries.try_lock().map(|c| c.len()))
            .field("settings", &self.settings)
            .finish()
    }
}

impl PlayDebouncer {
    pub fn new(settings: DebounceSettings) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(settings.capacity)),
            settings,
        }
    }

    pub fn settings(&self) -> &DebounceSettings {
        &self.settings
    }

    /// Find or create the entry, marking it most recently used.
    fn entry(&self, key: &PlayKey, now: Instant) -> SharedEntry {
        let mut entries = self.entries.lock();
        entries
            .get_or_insert(key.clone(), || Arc::new(Mutex::new(PlayEntry::new(now))))
            .clone()
    }

    /// Count one progress signal for `listener` on `track`.
    pub fn tick(&self, listener: &ListenerId, track: TrackId) -> Option<ConfirmedPlay> {
        self.tick_at(PlayKey::new(listener.clone(), track), Instant::now())
    }

    /// [`tick`](Self::tick) with an explicit clock.
    pub fn tick_at(&self, key: PlayKey, now: Instant) -> Option<ConfirmedPlay> {
        let entry = self.entry(&key, now);
        let mut entry = entry.lock();

        entry.touch(now);
        entry.accumulated_ticks += 1;

        if entry.accumulated_ticks > self.settings.tick_threshold {
            entry.accumulated_ticks = 0;
            entry.last_confirmed = Some(now);
            tracing::debug!(
                listener = %key.listener,
                track = %key.track,
                "Play confirmed by ticks"
            );
            return Some(ConfirmedPlay { key, at: now });
        }
        None
    }

    /// Mark activity without counting a tick. Returns when the current listen
    /// started, for use with [`confirm_long_listen_at`](Self::confirm_long_listen_at).
    pub fn touch_at(&self, key: &PlayKey, now: Instant) -> Instant {
        let entry = self.entry(key, now);
        let mut entry = entry.lock();
        entry.touch(now);
        entry.listen_started
    }

    /// Handle an explicit "listened long enough" marker.
    ///
    /// Confirms when more than `long_listen` has passed since both the last
    /// confirmed play for this key and `listening_since`, the moment the
    /// current listen started.
    pub fn confirm_long_listen(
        &self,
        listener: &ListenerId,
        track: TrackId,
        listening_since: Instant,
    ) -> Option<ConfirmedPlay> {
        self.confirm_long_listen_at(
            PlayKey::new(listener.clone(), track),
            listening_since,
            Instant::now(),
        )
    }

    /// [`confirm_long_listen`](Self::confirm_long_listen) with an explicit clock.
    pub fn confirm_long_listen_at(
        &self,
        key: PlayKey,
        listening_since: Instant,
        now: Instant,
    ) -> Option<ConfirmedPlay> {
        let entry = self.entry(&key, now);
        let mut entry = entry.lock();
        entry.last_touched = now;

        let baseline = entry
            .last_confirmed
            .map_or(listening_since, |last| last.max(listening_since));
        if now.saturating_duration_since(baseline) > self.settings.long_listen {
            entry.last_confirmed = Some(now);
            entry.accumulated_ticks = 0;
            tracing::debug!(
                listener = %key.listener,
                track = %key.track,
                "Play confirmed by wall clock"
            );
            return Some(ConfirmedPlay { key, at: now });
        }
        None
    }

    /// Reset armed entries that have gone quiet. Returns how many were reset.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) with an explicit clock.
    pub fn sweep_at(&self, now: Instant) -> usize {
        // Snapshot without touching recency, then release the map.
        let snapshot: Vec<SharedEntry> = {
            let entries = self.entries.lock();
            entries.iter().map(|(_, entry)| Arc::clone(entry)).collect()
        };

        let mut reset = 0;
        for entry in snapshot {
            let mut entry = entry.lock();
            if entry.armed
                && now.saturating_duration_since(entry.last_touched) > self.settings.idle_reset
            {
                entry.accumulated_ticks = 0;
                entry.armed = false;
                reset += 1;
            }
        }

        if reset > 0 {
            tracing::debug!(reset, "Reset idle play entries");
        }
        reset
    }

    /// Current state of an entry, without changing its recency.
    pub fn snapshot(&self, key: &PlayKey) -> Option<EntrySnapshot> {
        let entry = self.entries.lock().peek(key).cloned()?;
        let entry = entry.lock();
        Some(EntrySnapshot {
            accumulated_ticks: entry.accumulated_ticks,
            armed: entry.armed,
            last_touched: entry.last_touched,
            listen_started: entry.listen_started,
            last_confirmed: entry.last_confirmed,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Start a background task that sweeps `debouncer` every `interval` until
/// `cancel` fires.
pub fn start_sweep_task(
    debouncer: Arc<PlayDebouncer>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Play sweep task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    debouncer.sweep();
                }
            }
        }
    })
}
