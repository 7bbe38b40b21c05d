use std::sync::Arc;

use interp_match_engine::{
    workers::{sweeper_loop, worker_loop, WorkerOptions},
    MatchFlowApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

use crate::transport::RealtimeInviteTransport;

pub type MatchApi = MatchFlowApi<SqliteDatabase, RealtimeInviteTransport>;

/// Starts the worker pool and the stranded-order sweeper. Do not await the returned JoinHandles, as they run
/// indefinitely.
pub fn start_search_workers(api: Arc<MatchApi>, options: WorkerOptions) -> Vec<JoinHandle<()>> {
    let mut handles = (0..options.count)
        .map(|worker_id| tokio::spawn(worker_loop(Arc::clone(&api), worker_id, options)))
        .collect::<Vec<_>>();
    handles.push(tokio::spawn(sweeper_loop(api, options)));
    handles
}
