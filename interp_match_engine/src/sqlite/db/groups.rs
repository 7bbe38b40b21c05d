use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{GroupId, InterpreterId, NewOrderGroup, Order, OrderGroup},
    traits::MatchingDbError,
};

pub async fn insert_group(group: NewOrderGroup, conn: &mut SqliteConnection) -> Result<OrderGroup, MatchingDbError> {
    let group: OrderGroup =
        sqlx::query_as("INSERT INTO order_groups (group_id, same_interpreter) VALUES ($1, $2) RETURNING *")
            .bind(group.group_id)
            .bind(group.same_interpreter)
            .fetch_one(conn)
            .await?;
    debug!("📝️ Group {} inserted with id {}", group.group_id, group.id);
    Ok(group)
}

pub async fn fetch_group(group_id: &GroupId, conn: &mut SqliteConnection) -> Result<Option<OrderGroup>, sqlx::Error> {
    let group = sqlx::query_as("SELECT * FROM order_groups WHERE group_id = $1")
        .bind(group_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(group)
}

/// The member orders of a group, in segment order.
pub async fn group_members(group_id: &GroupId, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let members = sqlx::query_as("SELECT * FROM orders WHERE group_id = $1 ORDER BY starts_at ASC, id ASC")
        .bind(group_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(members)
}

/// Records the group's resolved interpreter. Only succeeds once, and never on a rejected group.
pub(crate) async fn mark_resolved(
    group_id: &GroupId,
    interpreter: InterpreterId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderGroup>, MatchingDbError> {
    let result: Option<OrderGroup> = sqlx::query_as(
        "UPDATE order_groups SET resolved_interpreter = $1, updated_at = CURRENT_TIMESTAMP WHERE group_id = $2 AND \
         resolved_interpreter IS NULL AND is_rejected = 0 RETURNING *",
    )
    .bind(interpreter)
    .bind(group_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Marks the group rejected once every member is terminal with no assignment.
pub(crate) async fn reject_if_dead(
    group_id: &GroupId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderGroup>, MatchingDbError> {
    let result: Option<OrderGroup> = sqlx::query_as(
        "UPDATE order_groups SET is_rejected = 1, updated_at = CURRENT_TIMESTAMP WHERE group_id = $1 AND is_rejected \
         = 0 AND resolved_interpreter IS NULL AND NOT EXISTS (SELECT 1 FROM orders WHERE group_id = $1 AND status IN \
         ('Searching', 'Assigned')) RETURNING *",
    )
    .bind(group_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}
