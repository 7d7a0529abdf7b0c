use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    error::Result,
    group::group_dto::{
        CreateGroupRequest, CreateGroupResponse, JoinGroupRequest, LinkItineraryRequest,
        PromoteUserRequest, RespondJoinRequest,
    },
    group::group_models::{Group, MemberProfile},
    middleware::AuthUser,
    state::AppState,
};

/// Create a travel group; the caller becomes its sole admin
#[utoipa::path(
    post,
    path = "/api/groups",
    tag = "groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created successfully", body = CreateGroupResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let creator = MemberProfile {
        user_id,
        username: payload.username,
        name: payload.name,
        profile_image: payload.profile_image,
    };

    let created = state
        .group_service
        .create_group(payload.group_name, creator, payload.itinerary_id)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Get all groups the authenticated user belongs to, pending included
#[utoipa::path(
    get,
    path = "/api/groups",
    tag = "groups",
    responses(
        (status = 200, description = "Groups retrieved successfully", body = Vec<Group>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_groups(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse> {
    let groups = state.group_service.list_groups_for_user(&user_id).await?;

    Ok((StatusCode::OK, Json(groups)))
}

/// Get a specific group by ID
#[utoipa::path(
    get,
    path = "/api/groups/{group_id}",
    tag = "groups",
    params(
        ("group_id" = String, Path, description = "Group ID")
    ),
    responses(
        (status = 200, description = "Group retrieved successfully", body = Group),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Group not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_group(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    let group = state.group_service.get_group(&group_id).await?;

    Ok((StatusCode::OK, Json(group)))
}

/// Request to join a group using its invite code
#[utoipa::path(
    post,
    path = "/api/groups/join",
    tag = "groups",
    request_body = JoinGroupRequest,
    responses(
        (status = 200, description = "Join request recorded, pending approval"),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Invalid invite code"),
        (status = 409, description = "Already a member")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn join_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<JoinGroupRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let joiner = MemberProfile {
        user_id,
        username: payload.username,
        name: payload.name,
        profile_image: payload.profile_image,
    };

    state
        .group_service
        .join_group(&payload.invite_code, joiner)
        .await?;

    Ok(StatusCode::OK)
}

/// Approve or reject a pending join request (admin only)
#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/respond",
    tag = "groups",
    params(
        ("group_id" = String, Path, description = "Group ID")
    ),
    request_body = RespondJoinRequest,
    responses(
        (status = 200, description = "Join request handled"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admins only"),
        (status = 404, description = "Group or member not found"),
        (status = 409, description = "Member already approved")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn respond_join_request(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(group_id): Path<String>,
    Json(payload): Json<RespondJoinRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    state
        .group_service
        .respond_join_request(&group_id, &payload.user_id, &user_id, payload.approve)
        .await?;

    Ok(StatusCode::OK)
}

/// Promote an approved member to admin (admin only)
#[utoipa::path(
    post,
    path = "/api/groups/{group_id}/promote",
    tag = "groups",
    params(
        ("group_id" = String, Path, description = "Group ID")
    ),
    request_body = PromoteUserRequest,
    responses(
        (status = 200, description = "Member promoted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admins only"),
        (status = 404, description = "Group or member not found"),
        (status = 409, description = "Already an admin")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn promote_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(group_id): Path<String>,
    Json(payload): Json<PromoteUserRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    state
        .group_service
        .promote_to_admin(&group_id, &payload.user_id, &user_id)
        .await?;

    Ok(StatusCode::OK)
}

/// Remove a member from the group; members may remove themselves
#[utoipa::path(
    delete,
    path = "/api/groups/{group_id}/members/{user_id}",
    tag = "groups",
    params(
        ("group_id" = String, Path, description = "Group ID"),
        ("user_id" = String, Path, description = "User ID to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admins only"),
        (status = 404, description = "Group or member not found"),
        (status = 409, description = "Cannot remove the last admin")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn kick_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((group_id, target_user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    state
        .group_service
        .kick_member(&group_id, &target_user_id, &user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Link an itinerary to the group (admin only)
#[utoipa::path(
    put,
    path = "/api/groups/{group_id}/itinerary",
    tag = "groups",
    params(
        ("group_id" = String, Path, description = "Group ID")
    ),
    request_body = LinkItineraryRequest,
    responses(
        (status = 200, description = "Itinerary linked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admins only"),
        (status = 404, description = "Group not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn link_itinerary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(group_id): Path<String>,
    Json(payload): Json<LinkItineraryRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    state
        .group_service
        .link_itinerary(&group_id, &payload.itinerary_id, &user_id)
        .await?;

    Ok(StatusCode::OK)
}

/// Unlink the group's itinerary (admin only)
#[utoipa::path(
    delete,
    path = "/api/groups/{group_id}/itinerary",
    tag = "groups",
    params(
        ("group_id" = String, Path, description = "Group ID")
    ),
    responses(
        (status = 200, description = "Itinerary unlinked"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admins only"),
        (status = 404, description = "Group not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn unlink_itinerary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    state
        .group_service
        .unlink_itinerary(&group_id, &user_id)
        .await?;

    Ok(StatusCode::OK)
}

/// Delete the group permanently (admin only)
#[utoipa::path(
    delete,
    path = "/api/groups/{group_id}",
    tag = "groups",
    params(
        ("group_id" = String, Path, description = "Group ID")
    ),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Admins only"),
        (status = 404, description = "Group not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(group_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.group_service.delete_group(&group_id, &user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
