//! Membership state machine for a single (group, user) pair:
//! non-member -> pending approval -> active -> removed. All transitions
//! mutate the aggregate in place and raise typed errors; persistence is
//! the service's problem.

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

use super::group_models::{Group, MemberProfile};

/// Admin gate consulted before every mutating operation except create
/// and join. Pure predicate over the aggregate's current admin set.
pub fn ensure_admin(group: &Group, actor_id: &str) -> Result<()> {
    if group.is_admin(actor_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only group admins can perform this action".to_string(),
        ))
    }
}

/// Non-member -> pending approval. Rejects users already on the roster
/// whether approved or still pending.
pub fn add_pending_member(
    group: &mut Group,
    profile: MemberProfile,
    joined_on: DateTime<Utc>,
) -> Result<()> {
    if group.has_member(&profile.user_id) {
        return Err(AppError::Conflict(
            "User is already a member of this group".to_string(),
        ));
    }

    group.members.push(profile.into_member(false, joined_on));
    Ok(())
}

/// Pending approval -> active (approve) or off the roster (reject).
/// There is no re-approve: responding to an active member is a
/// conflict either way.
pub fn respond_join_request(group: &mut Group, user_id: &str, approve: bool) -> Result<()> {
    let index = group
        .members
        .iter()
        .position(|m| m.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("User is not a member of this group".to_string()))?;

    if group.members[index].is_approved {
        return Err(AppError::Conflict(
            "User is already approved".to_string(),
        ));
    }

    if approve {
        group.members[index].is_approved = true;
    } else {
        group.members.remove(index);
    }

    Ok(())
}

/// Elevate an approved member into the admin set. Pending members must
/// be approved first.
pub fn promote_to_admin(group: &mut Group, user_id: &str) -> Result<()> {
    let member = group
        .find_member(user_id)
        .ok_or_else(|| AppError::NotFound("User is not a member of this group".to_string()))?;

    if !member.is_approved {
        return Err(AppError::NotFound(
            "User is not an approved member of this group".to_string(),
        ));
    }

    if group.is_admin(user_id) {
        return Err(AppError::Conflict(
            "User is already an admin of this group".to_string(),
        ));
    }

    group.admins.push(user_id.to_string());
    Ok(())
}

/// Remove a member from the roster (kick, or leave when the actor is
/// the target). An admin id is withdrawn from the admin set as well.
/// The sole remaining admin cannot be removed; dissolving a
/// single-admin group goes through delete.
pub fn remove_member(group: &mut Group, user_id: &str) -> Result<()> {
    let index = group
        .members
        .iter()
        .position(|m| m.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("User is not a member of this group".to_string()))?;

    if group.is_admin(user_id) && group.admins.len() == 1 {
        return Err(AppError::Conflict(
            "Cannot remove the last admin; delete the group instead".to_string(),
        ));
    }

    group.members.remove(index);
    group.admins.retain(|id| id != user_id);
    Ok(())
}
