/// Sessions and the Session Registry
///
/// A session is one client connection: an id handed out when the client
/// opens `GET /sse`, plus the sending half of the channel that feeds that
/// client's event stream. Inbound `POST /messages/` requests name the
/// session by id and the dispatcher writes replies through it.
///
/// The registry is the only shared mutable state in the server. It is
/// shared across all actix workers, so the map sits behind a mutex.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::error::{ChannelClosed, ProtocolError};
use crate::core::protocol::{ServerEvent, keepalive_frame};

/// Opaque session identifier (UUID v4, rendered as 32 hex digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for SessionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(SessionId)
            .map_err(|_| ProtocolError::InvalidSessionId(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// One client's outbound event channel.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    /// `None` once the session has been closed.
    tx: Mutex<Option<mpsc::UnboundedSender<ServerEvent>>>,
}

impl Session {
    /// Build a session around an outbound channel. The receiving half is
    /// whatever drains events to the client: the SSE body in production, a
    /// plain receiver in tests.
    pub fn new(id: SessionId, tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id,
            tx: Mutex::new(Some(tx)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match self.tx.lock().as_ref() {
            Some(tx) if !tx.is_closed() => SessionState::Open,
            _ => SessionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Queue an event for the client.
    pub fn send(&self, event: ServerEvent) -> Result<(), ChannelClosed> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(ChannelClosed)?;
        tx.send(event).map_err(|_| ChannelClosed)
    }

    /// Release the outbound channel. Returns `true` only for the call that
    /// actually closed it.
    pub fn close(&self) -> bool {
        let closed = self.tx.lock().take().is_some();
        if closed {
            debug!(session_id = %self.id, "Session channel closed");
        }
        closed
    }
}

/// Process-wide map of live sessions.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    /// Path clients POST to, e.g. "/messages/"
    message_path: String,
}

impl SessionRegistry {
    pub fn new(message_path: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            message_path: message_path.into(),
        })
    }

    /// Allocate a session and announce its inbound endpoint as the first
    /// event on the new channel.
    pub fn create(&self) -> (Arc<Session>, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = {
            let mut sessions = self.sessions.lock();
            let mut id = SessionId::new();
            while sessions.contains_key(&id) {
                id = SessionId::new();
            }
            let session = Arc::new(Session::new(id, tx));
            sessions.insert(id, session.clone());
            session
        };

        let endpoint = format!("{}?session_id={}", self.message_path, session.id());
        // The receiver is still in hand, so this cannot fail.
        let _ = session.send(ServerEvent::Endpoint(endpoint));
        info!(session_id = %session.id(), "Session created");
        (session, rx)
    }

    /// Live session for `id`, if any. Closed sessions are reported absent.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .get(id)
            .filter(|s| s.is_open())
            .cloned()
    }

    /// Drop the mapping and close the session. Removing an unknown id is a
    /// no-op; returns whether this call did the removal.
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions.lock().remove(id);
        match removed {
            Some(session) => {
                session.close();
                info!(session_id = %id, "Session removed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn message_path(&self) -> &str {
        &self.message_path
    }
}

/// Removes its session from the registry when dropped. Owned by the SSE
/// body, so a client disconnect (actix dropping the body) tears the
/// session down.
pub struct SessionGuard {
    id: SessionId,
    registry: Arc<SessionRegistry>,
    released: AtomicBool,
}

impl SessionGuard {
    pub fn new(id: SessionId, registry: Arc<SessionRegistry>) -> Self {
        Self {
            id,
            registry,
            released: AtomicBool::new(false),
        }
    }

    /// Tear the session down now. Later calls and the eventual drop do nothing.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.registry.remove(&self.id);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

struct StreamState {
    rx: mpsc::UnboundedReceiver<ServerEvent>,
    guard: SessionGuard,
    keepalive: Duration,
}

/// SSE body for a session: each queued event becomes a frame, idle periods
/// produce keep-alive comments, and the stream ends once the session is
/// closed. Dropping the stream removes the session.
pub fn event_stream(
    rx: mpsc::UnboundedReceiver<ServerEvent>,
    guard: SessionGuard,
    keepalive: Duration,
) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>> + 'static {
    let state = StreamState {
        rx,
        guard,
        keepalive,
    };
    futures_util::stream::unfold(state, |mut state| async move {
        let frame = tokio::select! {
            event = state.rx.recv() => match event {
                Some(event) => event.to_sse(),
                None => {
                    debug!(session_id = %state.guard.id, "Session stream finished");
                    state.guard.release();
                    return None;
                }
            },
            _ = tokio::time::sleep(state.keepalive) => keepalive_frame(),
        };
        Some((Ok::<_, std::convert::Infallible>(frame), state))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::collections::HashSet;

    #[test]
    fn session_id_round_trips_through_hex() {
        let id = SessionId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(text.parse::<SessionId>().unwrap(), id);
        assert!(matches!(
            "not-a-session".parse::<SessionId>(),
            Err(ProtocolError::InvalidSessionId(_))
        ));
    }

    #[test]
    fn create_announces_endpoint_first() {
        let registry = SessionRegistry::new("/messages/");
        let (session, mut rx) = registry.create();
        match rx.try_recv().unwrap() {
            ServerEvent::Endpoint(path) => {
                assert_eq!(path, format!("/messages/?session_id={}", session.id()));
            }
            other => panic!("unexpected first event: {other:?}"),
        }
    }

    #[test]
    fn created_ids_are_unique() {
        let registry = SessionRegistry::new("/messages/");
        let mut receivers = Vec::new();
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let (session, rx) = registry.create();
            assert!(ids.insert(session.id()));
            receivers.push(rx);
        }
        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SessionRegistry::new("/messages/");
        let (session, _rx) = registry.create();
        let id = session.id();
        assert!(registry.get(&id).is_some());
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn close_is_idempotent_and_send_after_close_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::new(SessionId::new(), tx);
        assert!(session.is_open());
        assert!(session.close());
        assert!(!session.close());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            session.send(ServerEvent::Message("{}".into())),
            Err(ChannelClosed)
        );
    }

    #[test]
    fn dropped_receiver_reads_as_closed() {
        let registry = SessionRegistry::new("/messages/");
        let (session, rx) = registry.create();
        drop(rx);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(registry.get(&session.id()).is_none());
    }

    #[tokio::test]
    async fn dropping_stream_removes_session_once() {
        let registry = SessionRegistry::new("/messages/");
        let (session, rx) = registry.create();
        let guard = SessionGuard::new(session.id(), registry.clone());
        let mut stream = Box::pin(event_stream(rx, guard, Duration::from_secs(60)));

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"event: endpoint\n"));

        drop(stream);
        assert!(registry.is_empty());
        assert!(!registry.remove(&session.id()));
    }

    #[tokio::test]
    async fn stream_ends_when_session_is_removed() {
        let registry = SessionRegistry::new("/messages/");
        let (session, rx) = registry.create();
        let guard = SessionGuard::new(session.id(), registry.clone());
        let mut stream = Box::pin(event_stream(rx, guard, Duration::from_secs(60)));
        let _endpoint = stream.next().await;

        registry.remove(&session.id());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn idle_stream_emits_keepalive() {
        let registry = SessionRegistry::new("/messages/");
        let (session, rx) = registry.create();
        let guard = SessionGuard::new(session.id(), registry.clone());
        let mut stream = Box::pin(event_stream(rx, guard, Duration::from_millis(10)));
        let _endpoint = stream.next().await;
        let ping = stream.next().await.unwrap().unwrap();
        assert_eq!(&ping[..], b": ping\n\n");
    }
}
