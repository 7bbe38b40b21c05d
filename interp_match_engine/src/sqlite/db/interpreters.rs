use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{InterpreterCandidate, InterpreterId, NewInterpreter},
    order_objects::CandidateQueryFilter,
    traits::CandidateApiError,
};

pub async fn insert_interpreter(
    interpreter: NewInterpreter,
    registered_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<InterpreterCandidate, CandidateApiError> {
    let NewInterpreter {
        display_name,
        rating,
        comm_priority,
        interp_priority,
        sched_priority,
        company_id,
        languages,
        topics,
        channels,
    } = interpreter;
    let row: InterpreterCandidate = sqlx::query_as(
        "INSERT INTO interpreters (display_name, rating, comm_priority, interp_priority, sched_priority, company_id, \
         registered_at) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(display_name)
    .bind(rating)
    .bind(comm_priority)
    .bind(interp_priority)
    .bind(sched_priority)
    .bind(company_id)
    .bind(registered_at)
    .fetch_one(&mut *conn)
    .await?;
    for (from, to) in languages {
        sqlx::query(
            "INSERT INTO interpreter_languages (interpreter_id, lang_from, lang_to) VALUES ($1, $2, $3) ON CONFLICT \
             DO NOTHING",
        )
        .bind(row.id)
        .bind(from)
        .bind(to)
        .execute(&mut *conn)
        .await?;
    }
    for topic in topics {
        sqlx::query("INSERT INTO interpreter_topics (interpreter_id, topic) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(row.id)
            .bind(topic)
            .execute(&mut *conn)
            .await?;
    }
    for channel in channels {
        sqlx::query(
            "INSERT INTO interpreter_channels (interpreter_id, communication_type) VALUES ($1, $2) ON CONFLICT DO \
             NOTHING",
        )
        .bind(row.id)
        .bind(channel)
        .execute(&mut *conn)
        .await?;
    }
    Ok(row)
}

pub async fn blacklist_interpreter(
    customer_id: &str,
    interpreter: InterpreterId,
    conn: &mut SqliteConnection,
) -> Result<(), CandidateApiError> {
    sqlx::query("INSERT INTO interpreter_blacklist (customer_id, interpreter_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(customer_id)
        .bind(interpreter)
        .execute(conn)
        .await?;
    Ok(())
}

/// Runs the ranked candidate query for the given filter specification. Filters are conjunctive.
pub async fn find_candidates(
    filter: CandidateQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<InterpreterCandidate>, CandidateApiError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM interpreters WHERE active = 1");
    if let (Some(from), Some(to)) = (filter.lang_from, filter.lang_to) {
        builder.push(
            " AND EXISTS (SELECT 1 FROM interpreter_languages il WHERE il.interpreter_id = interpreters.id AND \
             il.lang_from = ",
        );
        builder.push_bind(from);
        builder.push(" AND il.lang_to = ");
        builder.push_bind(to);
        builder.push(")");
    }
    if let Some(topic) = filter.topic {
        builder
            .push(" AND EXISTS (SELECT 1 FROM interpreter_topics it WHERE it.interpreter_id = interpreters.id AND it.topic = ");
        builder.push_bind(topic);
        builder.push(")");
    }
    if let Some(communication_type) = filter.communication_type {
        builder.push(
            " AND EXISTS (SELECT 1 FROM interpreter_channels ic WHERE ic.interpreter_id = interpreters.id AND \
             ic.communication_type = ",
        );
        builder.push_bind(communication_type);
        builder.push(")");
    }
    if let Some(customer_id) = filter.not_blacklisted_by {
        builder.push(
            " AND NOT EXISTS (SELECT 1 FROM interpreter_blacklist b WHERE b.interpreter_id = interpreters.id AND \
             b.customer_id = ",
        );
        builder.push_bind(customer_id);
        builder.push(")");
    }
    if let Some(order_id) = filter.exclude_declined_for {
        builder.push(
            " AND NOT EXISTS (SELECT 1 FROM order_outcomes oo WHERE oo.interpreter_id = interpreters.id AND \
             oo.outcome = 'Declined' AND oo.order_id = ",
        );
        builder.push_bind(order_id.0);
        builder.push(")");
    }
    if let Some(company_id) = filter.company_scope {
        builder.push(" AND company_id = ");
        builder.push_bind(company_id);
    }
    builder.push(" ORDER BY comm_priority ASC, interp_priority ASC, sched_priority ASC, rating DESC, registered_at ASC");
    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("📝️ Executing candidate query: {}", builder.sql());
    let candidates = builder.build_query_as::<InterpreterCandidate>().fetch_all(conn).await?;
    trace!("📝️ Candidate query returned {} row(s)", candidates.len());
    Ok(candidates)
}

pub async fn company_has_interpreters(
    company_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, CandidateApiError> {
    let row: (i64,) = sqlx::query_as("SELECT count(id) FROM interpreters WHERE active = 1 AND company_id = $1")
        .bind(company_id)
        .fetch_one(conn)
        .await?;
    Ok(row.0 > 0)
}

/// True when the interpreter holds no assigned order overlapping the given window.
pub async fn is_available(
    interpreter: InterpreterId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, CandidateApiError> {
    let row: (i64,) = sqlx::query_as(
        "SELECT count(id) FROM orders WHERE assigned_interpreter = $1 AND status = 'Assigned' AND \
         unixepoch(starts_at) < unixepoch($2) AND unixepoch(ends_at) > unixepoch($3)",
    )
    .bind(interpreter)
    .bind(ends_at)
    .bind(starts_at)
    .fetch_one(conn)
    .await?;
    Ok(row.0 == 0)
}
