use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub group_name: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub profile_image: String,
    #[serde(default, rename = "itineraryID")]
    pub itinerary_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupResponse {
    pub group_id: String,
    pub invite_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinGroupRequest {
    #[validate(length(equal = 8))]
    pub invite_code: String,
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub profile_image: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RespondJoinRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "userID")]
    pub user_id: String,
    pub approve: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PromoteUserRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkItineraryRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "itineraryID")]
    pub itinerary_id: String,
}
