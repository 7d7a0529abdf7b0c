use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A member embedded in the group aggregate. The profile fields are a
/// snapshot taken at join time, owned by the user subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub profile_image: String,
    /// `false` while the join request is pending admin approval.
    pub is_approved: bool,
    /// Timestamp of the join attempt, not of approval.
    pub joined_on: DateTime<Utc>,
}

/// The group aggregate: roster and admin set travel with the document
/// because almost every read needs the full roster.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Assigned by the store on insert.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// User ids with admin authority. Uniqueness and non-emptiness are
    /// enforced by the workflow, not the store.
    pub admins: Vec<String>,
    pub members: Vec<GroupMember>,
    pub invite_code: String,
    /// Empty string means "no itinerary linked".
    #[serde(rename = "itineraryID")]
    pub itinerary_id: String,
    /// Reserved for the chat subsystem; never populated here.
    #[serde(rename = "chatID")]
    pub chat_id: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    /// Optimistic-concurrency counter, maintained by the store and
    /// kept out of the serialized document and API payloads.
    #[serde(skip)]
    pub version: i64,
}

impl Group {
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|id| id == user_id)
    }

    pub fn find_member(&self, user_id: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.find_member(user_id).is_some()
    }
}

/// Profile snapshot supplied by the caller when creating or joining a
/// group; becomes the embedded `GroupMember` fields.
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub profile_image: String,
}

impl MemberProfile {
    pub fn into_member(self, is_approved: bool, joined_on: DateTime<Utc>) -> GroupMember {
        GroupMember {
            user_id: self.user_id,
            username: self.username,
            name: self.name,
            profile_image: self.profile_image,
            is_approved,
            joined_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: &str, approved: bool) -> GroupMember {
        GroupMember {
            user_id: user_id.to_string(),
            username: format!("@{user_id}"),
            name: user_id.to_string(),
            profile_image: String::new(),
            is_approved: approved,
            joined_on: Utc::now(),
        }
    }

    #[test]
    fn wire_format_matches_original_field_casing() {
        let group = Group {
            id: "g1".to_string(),
            name: "Luzon Trip".to_string(),
            admins: vec!["u1".to_string()],
            members: vec![member("u1", true)],
            invite_code: "AB12CD34".to_string(),
            itinerary_id: String::new(),
            chat_id: String::new(),
            created_on: Utc::now(),
            updated_on: Utc::now(),
            version: 7,
        };

        let value = serde_json::to_value(&group).unwrap();
        assert!(value.get("inviteCode").is_some());
        assert!(value.get("itineraryID").is_some());
        assert!(value.get("chatID").is_some());
        assert!(value.get("version").is_none());

        let first = &value["members"][0];
        assert!(first.get("userID").is_some());
        assert!(first.get("isApproved").is_some());
        assert!(first.get("joinedOn").is_some());
    }

    #[test]
    fn membership_helpers() {
        let group = Group {
            id: "g1".to_string(),
            name: "Visayas Hop".to_string(),
            admins: vec!["u1".to_string()],
            members: vec![member("u1", true), member("u2", false)],
            invite_code: "ZZ99ZZ99".to_string(),
            itinerary_id: String::new(),
            chat_id: String::new(),
            created_on: Utc::now(),
            updated_on: Utc::now(),
            version: 0,
        };

        assert!(group.is_admin("u1"));
        assert!(!group.is_admin("u2"));
        assert!(group.has_member("u2"));
        assert!(!group.has_member("u3"));
    }
}
