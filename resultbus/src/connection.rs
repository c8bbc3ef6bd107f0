//! One result-bus connection's state machine (`spec.md` §4.2):
//! `{INIT -> PENDING -> CONNECTED -> DISCONNECTED}`, reconnecting forever
//! on a fixed 5 s timer. Connections never fail permanently; a dropped
//! connection is retried until the process exits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use observability_deps::tracing::{info, warn};
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use tokio::sync::watch;

/// Fixed reconnect period (`spec.md` §4.2: "schedule a reconnect timer
/// (fixed 5 s)"). Deliberately not `backoff::BackoffConfig`: that crate
/// grows the interval geometrically, which this connection must not do.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Pending,
    Connected,
    Disconnected,
}

/// One of the coordinator's `K+1` result-bus connections. Connection 0 is
/// the dedicated intake connection (`spec.md` §4.2); connections `1..=K`
/// carry query parameter reads, progress/result writes, and pipeline-slot
/// reclamation, and are picked by least-loaded pipeline count.
pub struct BusConnection {
    pub id: usize,
    addr: String,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    conn: Mutex<Option<MultiplexedConnection>>,
    pipeline_count: AtomicUsize,
}

impl std::fmt::Debug for BusConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusConnection")
            .field("id", &self.id)
            .field("state", &*self.state_rx.borrow())
            .field("pipeline_count", &self.pipeline_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl BusConnection {
    pub fn new(id: usize, addr: impl Into<String>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Init);
        Self { id, addr: addr.into(), state_tx, state_rx, conn: Mutex::new(None), pipeline_count: AtomicUsize::new(0) }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipeline_count.load(Ordering::SeqCst)
    }

    pub fn inc_pipeline_count(&self) {
        self.pipeline_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn dec_pipeline_count(&self) {
        self.pipeline_count.fetch_sub(1, Ordering::SeqCst);
    }

    /// A live handle to issue commands over, or `None` while disconnected.
    /// `MultiplexedConnection` is cheap to clone; callers hold their own
    /// copy for the duration of one command rather than re-borrowing.
    pub fn handle(&self) -> Option<MultiplexedConnection> {
        self.conn.lock().clone()
    }

    /// Resolves once this connection first reaches `Connected`.
    pub async fn wait_connected(&self) {
        let mut rx = self.state_rx.clone();
        while *rx.borrow() != ConnectionState::Connected {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drives this connection's `{INIT -> PENDING -> CONNECTED ->
    /// DISCONNECTED}` loop forever. Never returns; spawn it as its own
    /// task per connection.
    pub async fn run(&self) {
        loop {
            let _ = self.state_tx.send(ConnectionState::Pending);
            match self.try_connect().await {
                Ok(conn) => {
                    *self.conn.lock() = Some(conn);
                    let _ = self.state_tx.send(ConnectionState::Connected);
                    info!(id = self.id, addr = %self.addr, "result-bus connection up");
                }
                Err(err) => {
                    warn!(id = self.id, addr = %self.addr, %err, "result-bus connect failed, retrying in 5s");
                    *self.conn.lock() = None;
                    let _ = self.state_tx.send(ConnectionState::Disconnected);
                    tokio::time::sleep(RECONNECT_INTERVAL).await;
                    continue;
                }
            }

            // Stay CONNECTED until a command elsewhere observes the
            // connection is dead; detection happens at call sites (see
            // `Bus::command`), which flips us back to DISCONNECTED and
            // wakes this loop via the watch channel being dropped/rebuilt
            // is unnecessary here: we just wait to be told to reconnect.
            self.wait_for_drop().await;
            warn!(id = self.id, addr = %self.addr, "result-bus connection dropped, reconnecting in 5s");
            tokio::time::sleep(RECONNECT_INTERVAL).await;
        }
    }

    async fn try_connect(&self) -> redis::RedisResult<MultiplexedConnection> {
        let client = redis::Client::open(self.addr.as_str())?;
        client.get_multiplexed_tokio_connection().await
    }

    /// Marks this connection disconnected, from a caller that observed a
    /// command failure. Idempotent.
    pub fn mark_disconnected(&self) {
        *self.conn.lock() = None;
        let _ = self.state_tx.send(ConnectionState::Disconnected);
    }

    /// Blocks until `mark_disconnected` clears the handle.
    async fn wait_for_drop(&self) {
        loop {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if self.conn.lock().is_none() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_init_state() {
        let conn = BusConnection::new(0, "redis://127.0.0.1:6399");
        assert_eq!(conn.state(), ConnectionState::Init);
        assert!(conn.handle().is_none());
    }

    #[test]
    fn pipeline_count_increments_and_decrements() {
        let conn = BusConnection::new(1, "redis://127.0.0.1:6399");
        conn.inc_pipeline_count();
        conn.inc_pipeline_count();
        assert_eq!(conn.pipeline_count(), 2);
        conn.dec_pipeline_count();
        assert_eq!(conn.pipeline_count(), 1);
    }

    #[test]
    fn mark_disconnected_clears_handle_and_state() {
        let conn = BusConnection::new(2, "redis://127.0.0.1:6399");
        conn.mark_disconnected();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.handle().is_none());
    }
}
