//! Registry of open stream sessions.
//!
//! Each session registers a handle holding its cancellation token and an
//! event channel. Whatever needs to reach open sessions (confirmed plays,
//! shutdown) goes through the registry instead of a global connection list.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trackwave_common::{ListenerId, SessionId, TrackId};

/// Queue depth for text events pushed to a session.
const EVENT_BUFFER: usize = 16;

/// Public view of an open session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub listener: ListenerId,
    pub track: TrackId,
    /// Requested start position in seconds.
    pub start_secs: f64,
    pub started_at: DateTime<Utc>,
}

struct SessionHandle {
    info: SessionInfo,
    cancel: CancellationToken,
    events: mpsc::Sender<String>,
}

/// Thread-safe map of session id to handle.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
}

/// A registered session. Dropping it removes the session from the registry.
pub struct SessionRegistration {
    pub id: SessionId,
    pub listener: ListenerId,
    pub track: TrackId,
    /// Cancelled by the registry on shutdown; the session cancels it when done.
    pub cancel: CancellationToken,
    /// Text events addressed to this session.
    pub events: mpsc::Receiver<String>,
    /// When the session was opened.
    pub opened: Instant,
    registry: SessionRegistry,
}

impl Drop for SessionRegistration {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// # Arguments
    /// * `listener` - Who is listening.
    /// * `track` - Track being streamed.
    /// * `start_secs` - Requested start position.
    /// * `parent` - Token whose cancellation also cancels this session.
    pub fn register(
        &self,
        listener: ListenerId,
        track: TrackId,
        start_secs: f64,
        parent: &CancellationToken,
    ) -> SessionRegistration {
        let id = SessionId::new();
        let cancel = parent.child_token();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let info = SessionInfo {
            id,
            listener: listener.clone(),
            track,
            start_secs,
            started_at: Utc::now(),
        };
        tracing::info!(
            session_id = %id,
            listener = %info.listener,
            track_id = %track,
            start_secs,
            "Registered stream session"
        );
        self.sessions.insert(
            id,
            SessionHandle {
                info,
                cancel: cancel.clone(),
                events: tx,
            },
        );

        SessionRegistration {
            id,
            listener,
            track,
            cancel,
            events: rx,
            opened: Instant::now(),
            registry: self.clone(),
        }
    }

    fn remove(&self, id: &SessionId) {
        if let Some((_, handle)) = self.sessions.remove(id) {
            tracing::info!(
                session_id = %id,
                track_id = %handle.info.track,
                duration_secs = (Utc::now() - handle.info.started_at).num_seconds(),
                "Ended stream session"
            );
        }
    }

    /// Push a text event to every open session of `listener` on `track`.
    ///
    /// Delivery is best effort: a session whose queue is full misses the
    /// event. Returns how many sessions accepted it.
    pub fn notify(&self, listener: &ListenerId, track: TrackId, event: &str) -> usize {
        let mut delivered = 0;
        for entry in self.sessions.iter() {
            let handle = entry.value();
            if &handle.info.listener != listener || handle.info.track != track {
                continue;
            }
            match handle.events.try_send(event.to_string()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::debug!(
                    session_id = %handle.info.id,
                    error = %e,
                    "Dropped session event"
                ),
            }
        }
        delivered
    }

    /// Cancel every open session.
    pub fn cancel_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().cancel.cancel();
        }
    }

    pub fn cancel(&self, id: &SessionId) -> bool {
        match self.sessions.get(id) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(id).map(|h| h.info.clone())
    }

    /// All open sessions, oldest first.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.sessions.iter().map(|h| h.info.clone()).collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ListenerId {
        "alice".parse().unwrap()
    }

    #[test]
    fn test_register_and_drop() {
        let registry = SessionRegistry::new();
        let root = CancellationToken::new();

        let reg = registry.register(alice(), TrackId::from(1), 0.0, &root);
        assert_eq!(registry.len(), 1);
        let info = registry.get(&reg.id).unwrap();
        assert_eq!(info.listener, alice());

        drop(reg);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_notify_matches_listener_and_track() {
        let registry = SessionRegistry::new();
        let root = CancellationToken::new();
        let mut a1 = registry.register(alice(), TrackId::from(1), 0.0, &root);
        let mut a2 = registry.register(alice(), TrackId::from(2), 0.0, &root);
        let mut b1 = registry.register("bob".parse().unwrap(), TrackId::from(1), 0.0, &root);

        assert_eq!(registry.notify(&alice(), TrackId::from(1), "play_confirmed"), 1);
        assert_eq!(a1.events.try_recv().unwrap(), "play_confirmed");
        assert!(a2.events.try_recv().is_err());
        assert!(b1.events.try_recv().is_err());
    }

    #[test]
    fn test_notify_full_queue_is_dropped() {
        let registry = SessionRegistry::new();
        let root = CancellationToken::new();
        let _reg = registry.register(alice(), TrackId::from(1), 0.0, &root);
        for _ in 0..EVENT_BUFFER {
            assert_eq!(registry.notify(&alice(), TrackId::from(1), "x"), 1);
        }
        assert_eq!(registry.notify(&alice(), TrackId::from(1), "x"), 0);
    }

    #[test]
    fn test_cancel_all_and_parent() {
        let registry = SessionRegistry::new();
        let root = CancellationToken::new();
        let a = registry.register(alice(), TrackId::from(1), 0.0, &root);
        let other_root = CancellationToken::new();
        let b = registry.register(alice(), TrackId::from(2), 0.0, &other_root);

        root.cancel();
        assert!(a.cancel.is_cancelled());
        assert!(!b.cancel.is_cancelled());

        registry.cancel_all();
        assert!(b.cancel.is_cancelled());
    }
}
