//! The background worker loops.
//!
//! Workers consume the durable job queue and run scheduler ticks. Each tick processes one order (or one group) to
//! completion under that target's exclusive lock, so state transitions for a single order are strictly serialized;
//! waiting for a wave window is a scheduled re-enqueue, which keeps every worker available for other orders while
//! waves are open.
//!
//! The loops here never return. The composition root (the server binary) spawns them onto the runtime against its
//! concrete backend and transport types.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use log::*;
use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    matcher::MatchFlowApi,
    traits::{CandidateDirectory, InviteTransport, JobQueue, MatchingDatabase},
};

//--------------------------------------      OrderLocks       -------------------------------------------------------
/// Per-target async locks. Never two ticks for the same order (or group) concurrently; the guard releases on every
/// exit path, including errors.
#[derive(Clone, Default)]
pub struct OrderLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        lock.lock_owned().await
    }
}

//--------------------------------------    WorkerOptions      -------------------------------------------------------
#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub count: usize,
    pub poll_interval: Duration,
    /// How many due jobs one poll claims at most.
    pub batch_size: i64,
    /// The stranded-order sweep runs every `sweep_every` poll intervals.
    pub sweep_every: u32,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self { count: 4, poll_interval: Duration::from_secs(1), batch_size: 10, sweep_every: 10 }
    }
}

/// One queue worker: polls for due jobs and runs their ticks. Never returns.
pub async fn worker_loop<B, T>(api: Arc<MatchFlowApi<B, T>>, worker_id: usize, options: WorkerOptions)
where
    B: MatchingDatabase + CandidateDirectory + JobQueue,
    T: InviteTransport,
{
    // stagger the pollers so the fleet does not hit the queue in lockstep
    let jitter = rand::thread_rng().gen_range(0..=options.poll_interval.as_millis() as u64);
    tokio::time::sleep(Duration::from_millis(jitter)).await;
    let mut timer = tokio::time::interval(options.poll_interval);
    info!("🕰️ Search worker {worker_id} started");
    loop {
        timer.tick().await;
        let jobs = match api.db().claim_due(Utc::now(), options.batch_size).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("🕰️ Worker {worker_id}: could not claim jobs: {e}");
                continue;
            },
        };
        for job in jobs {
            let target = job.target.clone();
            match api.run_search_tick(job.target, Utc::now()).await {
                Ok(outcome) => trace!("🕰️ Worker {worker_id}: {target} -> {outcome:?}"),
                Err(e) => error!("🕰️ Worker {worker_id}: tick for {target} failed: {e}"),
            }
        }
    }
}

/// The stranded-order sweeper: restores jobs lost to crashed workers. Never returns.
pub async fn sweeper_loop<B, T>(api: Arc<MatchFlowApi<B, T>>, options: WorkerOptions)
where
    B: MatchingDatabase + CandidateDirectory + JobQueue,
    T: InviteTransport,
{
    let mut timer = tokio::time::interval(options.poll_interval * options.sweep_every.max(1));
    info!("🕰️ Stranded-order sweeper started");
    loop {
        timer.tick().await;
        match api.db().requeue_stranded(Utc::now()).await {
            Ok(0) => {},
            Ok(n) => warn!("🕰️ Restored {n} stranded search job(s)"),
            Err(e) => error!("🕰️ Stranded-order sweep failed: {e}"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn locks_serialize_access_per_key() {
        let locks = OrderLocks::new();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("order:ord-1").await;
                let n = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(n, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = OrderLocks::new();
        let g1 = locks.acquire("order:a").await;
        // must not deadlock
        let g2 = locks.acquire("order:b").await;
        drop(g1);
        drop(g2);
    }
}
