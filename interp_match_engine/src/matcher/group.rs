use log::*;

use crate::{
    db_types::{InterpreterId, Order, OrderGroup, OrderStatusType},
    matcher::errors::MatchingError,
    traits::{CandidateDirectory, GroupAssignment, MatchingDatabase},
};

/// Gates acceptances for `same_interpreter` groups.
///
/// An acceptance on any member order is provisional until the coordinator has verified that the interpreter can be
/// offered every other member without conflict. On success all member orders transition to `Assigned` atomically;
/// on failure nothing is persisted and the provisional acceptance is rolled back by the caller. A partially
/// assigned group never reaches the store.
pub struct GroupCoordinator<B> {
    db: B,
}

impl<B> GroupCoordinator<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> GroupCoordinator<B>
where B: MatchingDatabase + CandidateDirectory
{
    pub async fn resolve(
        &self,
        group: &OrderGroup,
        interpreter: InterpreterId,
        accepted_member: &Order,
    ) -> Result<GroupAssignment, MatchingError> {
        if !group.same_interpreter {
            // free-choice groups are resolved per member, never through the coordinator
            return Err(MatchingError::GroupConsistencyViolation(group.group_id.clone()));
        }
        if group.is_rejected {
            debug!("👥️ Group {} is already rejected; nothing to resolve", group.group_id);
            return Ok(GroupAssignment::Conflict { blocking_member: None });
        }
        if let Some(existing) = group.resolved_interpreter {
            // A same-interpreter group resolves exactly once.
            debug!("👥️ Group {} already resolved to {existing}; {interpreter} is late", group.group_id);
            return Ok(GroupAssignment::Conflict { blocking_member: None });
        }
        let members = self.db.fetch_group_members(&group.group_id).await?;
        // A member that already closed without an assignment makes full resolution impossible. Cancelled members
        // are out of the booking and do not block.
        if let Some(dead) = members
            .iter()
            .find(|m| matches!(m.status, OrderStatusType::Expired | OrderStatusType::Assigned))
        {
            debug!("👥️ Group {} cannot resolve: member [{}] is {}", group.group_id, dead.order_id, dead.status);
            return Ok(GroupAssignment::Conflict { blocking_member: Some(dead.order_id.clone()) });
        }
        for member in members
            .iter()
            .filter(|m| m.status == OrderStatusType::Searching && m.order_id != accepted_member.order_id)
        {
            if !self.db.is_available(interpreter, member.starts_at, member.ends_at).await? {
                debug!(
                    "👥️ {interpreter} cannot cover member [{}] of group {}; rolling the acceptance back",
                    member.order_id, group.group_id
                );
                return Ok(GroupAssignment::Conflict { blocking_member: Some(member.order_id.clone()) });
            }
        }
        Ok(self.db.try_assign_group(&group.group_id, interpreter).await?)
    }
}
