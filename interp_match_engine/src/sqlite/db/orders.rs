use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{
        CandidateOutcome,
        InterpreterId,
        InviteRecord,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        OutcomeRecord,
    },
    order_objects::OrderQueryFilter,
    timeframe::TimeFrame,
    traits::MatchingDbError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    frame: &TimeFrame,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), MatchingDbError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, frame, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_order(
    order: NewOrder,
    frame: &TimeFrame,
    conn: &mut SqliteConnection,
) -> Result<Order, MatchingDbError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                appointment_id,
                customer_id,
                company_id,
                group_id,
                scheduling_type,
                communication_type,
                interpreting_type,
                topic,
                lang_from,
                lang_to,
                starts_at,
                ends_at,
                next_repeat_at,
                repeat_interval,
                remaining_repeats,
                notify_admin_at,
                end_search_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.appointment_id)
    .bind(order.customer_id)
    .bind(order.company_id)
    .bind(order.group_id)
    .bind(order.scheduling_type)
    .bind(order.communication_type)
    .bind(order.interpreting_type)
    .bind(order.topic)
    .bind(order.lang_from)
    .bind(order.lang_to)
    .bind(order.starts_at)
    .bind(order.ends_at)
    .bind(frame.next_repeat_at)
    .bind(frame.repeat_interval)
    .bind(i64::from(frame.remaining_repeats))
    .bind(frame.notify_admin_at)
    .bind(frame.end_search_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

/// Returns the entry in the orders table for the corresponding `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(appointment_id) = query.appointment_id {
        where_clause.push("appointment_id = ");
        where_clause.push_bind_unseparated(appointment_id);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id=");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(group_id) = query.group_id {
        where_clause.push("group_id = ");
        where_clause.push_bind_unseparated(group_id.0);
    }
    if let Some(scheduling_type) = query.scheduling_type {
        where_clause.push("scheduling_type = ");
        where_clause.push_bind_unseparated(scheduling_type.to_string());
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// The compare-and-set half of the acceptance race: `Searching → Assigned`, or `None` for the loser.
pub(crate) async fn try_assign(
    order_id: &OrderId,
    interpreter: InterpreterId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MatchingDbError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = 'Assigned', assigned_interpreter = $1, updated_at = CURRENT_TIMESTAMP WHERE \
         order_id = $2 AND status = 'Searching' RETURNING *",
    )
    .bind(interpreter)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Closes a search: `Searching → Cancelled` or `Searching → Expired`. Returns `None` when the order was already
/// terminal, which the caller treats as having lost a race rather than as an error.
pub(crate) async fn close_search(
    order_id: &OrderId,
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MatchingDbError> {
    let status = new_status.to_string();
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND status = 'Searching' \
         RETURNING *",
    )
    .bind(status)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

pub(crate) async fn open_wave(
    order_id: &OrderId,
    started_at: DateTime<Utc>,
    frame: &TimeFrame,
    conn: &mut SqliteConnection,
) -> Result<Order, MatchingDbError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET current_wave = current_wave + 1, wave_started_at = $1, next_repeat_at = $2, \
         remaining_repeats = $3, updated_at = CURRENT_TIMESTAMP WHERE order_id = $4 RETURNING *",
    )
    .bind(started_at)
    .bind(frame.next_repeat_at)
    .bind(i64::from(frame.remaining_repeats))
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| MatchingDbError::OrderNotFound(order_id.clone()))
}

/// Sets the escalation latch. Only the first caller gets `true`; the latch never resets.
pub(crate) async fn latch_admin_notified(
    order_id: &OrderId,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, MatchingDbError> {
    let result = sqlx::query(
        "UPDATE orders SET admin_notified_at = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2 AND \
         admin_notified_at IS NULL",
    )
    .bind(at)
    .bind(order_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn record_invites(
    order_id: &OrderId,
    wave: i64,
    interpreters: &[InterpreterId],
    sent_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), MatchingDbError> {
    for interpreter in interpreters {
        sqlx::query(
            "INSERT INTO order_invites (order_id, interpreter_id, wave, sent_at) VALUES ($1, $2, $3, $4) ON \
             CONFLICT DO NOTHING",
        )
        .bind(order_id.as_str())
        .bind(interpreter)
        .bind(wave)
        .bind(sent_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Upserts a candidate outcome. An existing `Declined` is never downgraded.
pub(crate) async fn record_outcome(
    order_id: &OrderId,
    interpreter: InterpreterId,
    outcome: CandidateOutcome,
    wave: i64,
    conn: &mut SqliteConnection,
) -> Result<(), MatchingDbError> {
    sqlx::query(
        "INSERT INTO order_outcomes (order_id, interpreter_id, outcome, wave) VALUES ($1, $2, $3, $4) ON CONFLICT \
         (order_id, interpreter_id) DO UPDATE SET outcome = excluded.outcome, wave = excluded.wave, created_at = \
         CURRENT_TIMESTAMP WHERE order_outcomes.outcome != 'Declined'",
    )
    .bind(order_id.as_str())
    .bind(interpreter)
    .bind(outcome)
    .bind(wave)
    .execute(conn)
    .await?;
    Ok(())
}

/// Writes off every invitation of the wave that has no recorded outcome as `Ignored`.
pub(crate) async fn fold_unanswered_invites(
    order_id: &OrderId,
    wave: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, MatchingDbError> {
    let result = sqlx::query(
        "INSERT INTO order_outcomes (order_id, interpreter_id, outcome, wave) SELECT i.order_id, i.interpreter_id, \
         'Ignored', i.wave FROM order_invites i WHERE i.order_id = $1 AND i.wave = $2 AND NOT EXISTS (SELECT 1 FROM \
         order_outcomes oo WHERE oo.order_id = i.order_id AND oo.interpreter_id = i.interpreter_id)",
    )
    .bind(order_id.as_str())
    .bind(wave)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn outcomes_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OutcomeRecord>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM order_outcomes WHERE order_id = $1 ORDER BY wave ASC, id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub async fn invites_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<InviteRecord>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM order_invites WHERE order_id = $1 ORDER BY wave ASC, id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(rows)
}
