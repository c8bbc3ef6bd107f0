//! `Bus`: the coordinator's view of the `K+1` result-bus connections
//! (`spec.md` §4.2). Connection 0 is the dedicated intake connection;
//! connections `1..=K` carry per-query reads and writes and are picked by
//! least-loaded pipeline count.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use observability_deps::tracing::warn;
use redis::AsyncCommands;
use snafu::Snafu;

use crate::connection::BusConnection;
use crate::frames::ProgressFrame;

/// Global list every engine process blocks on (`spec.md` §6).
pub const QUERYQ: &str = "QUERYQ";

/// `spec.md` §4.2: "push result rows ... until an accumulated byte
/// threshold (10 000 bytes) is reached".
pub const RESULT_BATCH_BYTES: usize = 10_000;

#[derive(Debug, Snafu)]
pub enum BusError {
    #[snafu(display("No Redis Connection"))]
    NoConnection,
    #[snafu(display("QUERY:{qid} hash missing"))]
    MissingHash { qid: String },
    #[snafu(display("result-bus command failed: {source}"))]
    Redis { source: redis::RedisError },
}

impl From<redis::RedisError> for BusError {
    fn from(source: redis::RedisError) -> Self {
        Self::Redis { source }
    }
}

/// The coordinator's `K+1` connections plus the per-engine queue name
/// they share (`spec.md` §4.2, §6).
#[derive(Debug)]
pub struct Bus {
    intake: Arc<BusConnection>,
    workers: Vec<Arc<BusConnection>>,
    engine_queue: String,
    result_ttl: Duration,
}

impl Bus {
    /// `engine_id` names this process's backup list, `ENGINE:<engine_id>`
    /// (`spec.md` §6); callers typically pass a hostname.
    pub fn new(address: &str, worker_count: u32, result_ttl: Duration, engine_id: &str) -> Arc<Self> {
        let intake = Arc::new(BusConnection::new(0, address));
        let workers = (1..=worker_count as usize).map(|id| Arc::new(BusConnection::new(id, address))).collect();
        Arc::new(Self { intake, workers, engine_queue: format!("ENGINE:{engine_id}"), result_ttl })
    }

    /// Spawns each connection's `{INIT -> PENDING -> CONNECTED ->
    /// DISCONNECTED}` loop as its own task. Never returns early; the
    /// spawned tasks run forever.
    pub fn spawn_connections(self: &Arc<Self>) {
        let intake = Arc::clone(&self.intake);
        tokio::spawn(async move { intake.run().await });
        for worker in &self.workers {
            let worker = Arc::clone(worker);
            tokio::spawn(async move { worker.run().await });
        }
    }

    /// Resolves once every one of the `K+1` connections has reached
    /// `CONNECTED` at least once (`spec.md` §4.2: "After all K+1
    /// connections are up, connection 0 issues BRPOPLPUSH...").
    pub async fn wait_all_connected(&self) {
        self.intake.wait_connected().await;
        for worker in &self.workers {
            worker.wait_connected().await;
        }
    }

    /// The least-loaded of connections `1..=K`, by current pipeline count
    /// (`spec.md` §4.3 step 4).
    pub fn least_loaded_worker(&self) -> Arc<BusConnection> {
        self.workers
            .iter()
            .min_by_key(|w| w.pipeline_count())
            .cloned()
            .expect("Bus is constructed with at least one worker connection")
    }

    /// Connection 0's blocking pop: `BRPOPLPUSH(QUERYQ, ENGINE:<host>,
    /// 0)` (`spec.md` §4.2, §6). Blocks until a query id is available;
    /// never returns an error for "nothing queued" — command failures
    /// mark the intake connection disconnected and retry once it
    /// reconnects.
    pub async fn pop_query_id(&self) -> String {
        loop {
            self.intake.wait_connected().await;
            let Some(mut conn) = self.intake.handle() else { continue };
            match conn.brpoplpush::<_, _, Option<String>>(QUERYQ, &self.engine_queue, 0).await {
                Ok(Some(qid)) => return qid,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%err, "BRPOPLPUSH on intake connection failed, retrying once reconnected");
                    self.intake.mark_disconnected();
                }
            }
        }
    }

    /// Reads `QUERY:<qid>` as a field hash (`spec.md` §4.3 step 1). Used
    /// once per admission on the pinned worker connection.
    pub async fn read_query_hash(&self, conn: &BusConnection, qid: &str) -> Result<HashMap<String, String>, BusError> {
        let mut handle = conn.handle().ok_or(BusError::NoConnection)?;
        let map: HashMap<String, String> = handle.hgetall(format!("QUERY:{qid}")).await?;
        if map.is_empty() {
            return Err(BusError::MissingHash { qid: qid.to_string() });
        }
        Ok(map)
    }

    /// `RPUSH`es one progress frame onto `REPLY:<qid>` (`spec.md` §4.2,
    /// §7).
    pub async fn push_progress(&self, conn: &BusConnection, qid: &str, frame: &ProgressFrame) -> Result<(), BusError> {
        let mut handle = conn.handle().ok_or(BusError::NoConnection)?;
        handle.rpush(format!("REPLY:{qid}"), frame.to_json_string()).await?;
        Ok(())
    }

    /// Writes `rows` to `RESULT:<qid>:<rownum>`, splitting into as many
    /// keys as needed so no single `RPUSH` exceeds
    /// [`RESULT_BATCH_BYTES`], `EXPIRE`ing each key as it's written
    /// (`spec.md` §4.2, §6). Returns the total row count written.
    pub async fn write_result_rows(&self, conn: &BusConnection, qid: &str, rows: &[String]) -> Result<u64, BusError> {
        let mut handle = conn.handle().ok_or(BusError::NoConnection)?;
        let mut rownum: u64 = 0;
        let mut idx = 0usize;
        while idx < rows.len() {
            let key = format!("RESULT:{qid}:{rownum}");
            let mut batch = Vec::new();
            let mut bytes = 0usize;
            while idx < rows.len() {
                bytes += rows[idx].len();
                batch.push(rows[idx].clone());
                idx += 1;
                if bytes >= RESULT_BATCH_BYTES {
                    break;
                }
            }
            let written = batch.len() as u64;
            handle.rpush::<_, _, ()>(&key, &batch).await?;
            handle.expire::<_, ()>(&key, self.result_ttl.as_secs() as i64).await?;
            rownum += written;
        }
        Ok(rownum)
    }

    /// `EXPIRE`s `QUERY:<qid>` at completion (`spec.md` §6).
    pub async fn expire_query_hash(&self, conn: &BusConnection, qid: &str) -> Result<(), BusError> {
        let mut handle = conn.handle().ok_or(BusError::NoConnection)?;
        handle.expire::<_, ()>(format!("QUERY:{qid}"), self.result_ttl.as_secs() as i64).await?;
        Ok(())
    }

    /// Removes `qid` from this engine's backup list, once its rows are
    /// fully flushed (`spec.md` §6: `LREM 0 <qid>`). Stage 1 calls this
    /// last, after the final progress frame.
    pub async fn remove_from_engine_queue(&self, conn: &BusConnection, qid: &str) -> Result<(), BusError> {
        let mut handle = conn.handle().ok_or(BusError::NoConnection)?;
        handle.lrem::<_, _, ()>(&self.engine_queue, 0, qid).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_loaded_picks_the_lightest_worker() {
        let bus = Bus::new("redis://127.0.0.1:6399", 3, Duration::from_secs(300), "test-host");
        bus.workers[0].inc_pipeline_count();
        bus.workers[0].inc_pipeline_count();
        bus.workers[1].inc_pipeline_count();
        let picked = bus.least_loaded_worker();
        assert_eq!(picked.id, bus.workers[2].id);
    }

    #[test]
    fn engine_queue_is_keyed_by_engine_id() {
        let bus = Bus::new("redis://127.0.0.1:6399", 1, Duration::from_secs(300), "host-a");
        assert_eq!(bus.engine_queue, "ENGINE:host-a");
    }
}
