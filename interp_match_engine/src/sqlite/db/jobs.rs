use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::traits::{JobQueueError, JobTarget, NewSearchJob, SearchJob};

#[derive(Debug, Clone, FromRow)]
struct JobRow {
    id: i64,
    kind: String,
    target_key: String,
    run_at: DateTime<Utc>,
}

/// Schedules an "advance order search" job. Identical pending jobs collapse into one.
pub async fn enqueue(job: NewSearchJob, conn: &mut SqliteConnection) -> Result<(), JobQueueError> {
    sqlx::query("INSERT INTO search_jobs (kind, target_key, run_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
        .bind(job.target.kind())
        .bind(job.target.key().to_string())
        .bind(job.run_at)
        .execute(conn)
        .await?;
    Ok(())
}

/// Atomically claims up to `limit` due jobs, oldest deadline first.
pub async fn claim_due(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<SearchJob>, JobQueueError> {
    let rows: Vec<JobRow> = sqlx::query_as(
        "DELETE FROM search_jobs WHERE id IN (SELECT id FROM search_jobs WHERE unixepoch(run_at) <= unixepoch($1) \
         ORDER BY run_at ASC LIMIT $2) RETURNING id, kind, target_key, run_at",
    )
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    rows.into_iter()
        .map(|row| {
            let target = JobTarget::from_parts(&row.kind, row.target_key)?;
            Ok(SearchJob { id: row.id, target, run_at: row.run_at })
        })
        .collect()
}

/// Restores jobs for searching orders whose next deadline has passed but which have nothing queued, i.e. the claim
/// was lost to a crashed worker.
pub async fn requeue_stranded(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, JobQueueError> {
    let result = sqlx::query(
        "INSERT INTO search_jobs (kind, target_key, run_at) SELECT 'order', o.order_id, $1 FROM orders o WHERE \
         o.status = 'Searching' AND ((o.next_repeat_at IS NOT NULL AND unixepoch(o.next_repeat_at) <= \
         unixepoch($1)) OR unixepoch(o.end_search_at) <= unixepoch($1) OR (o.admin_notified_at IS NULL AND \
         unixepoch(o.notify_admin_at) <= unixepoch($1))) AND NOT EXISTS (SELECT 1 FROM search_jobs j WHERE j.kind = \
         'order' AND j.target_key = o.order_id)",
    )
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn pending_count(conn: &mut SqliteConnection) -> Result<i64, JobQueueError> {
    let row: (i64,) = sqlx::query_as("SELECT count(id) FROM search_jobs").fetch_one(conn).await?;
    Ok(row.0)
}
