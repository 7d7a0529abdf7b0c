use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};

use super::group_dto::CreateGroupResponse;
use super::group_models::{Group, MemberProfile};
use super::group_store::GroupStore;
use super::group_workflow;
use super::invite_code::generate_unique_invite_code;

/// Upper bound on optimistic-concurrency retries per mutation. Each
/// attempt reloads the aggregate, so a retry only loses to another
/// writer that committed in the meantime.
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn GroupStore>,
}

impl GroupService {
    pub fn new(store: Arc<dyn GroupStore>) -> Self {
        Self { store }
    }

    /// Create a group with the creator as sole admin and sole
    /// pre-approved member.
    pub async fn create_group(
        &self,
        group_name: String,
        creator: MemberProfile,
        itinerary_id: Option<String>,
    ) -> Result<CreateGroupResponse> {
        let now = Utc::now();
        let invite_code = generate_unique_invite_code(self.store.as_ref()).await?;

        let group = Group {
            id: String::new(),
            name: group_name,
            admins: vec![creator.user_id.clone()],
            members: vec![creator.into_member(true, now)],
            invite_code,
            itinerary_id: itinerary_id.unwrap_or_default(),
            chat_id: String::new(),
            created_on: now,
            updated_on: now,
            version: 0,
        };

        let group = self.store.insert(group).await?;
        tracing::info!(group_id = %group.id, "created group");

        Ok(CreateGroupResponse {
            group_id: group.id,
            invite_code: group.invite_code,
        })
    }

    /// Join a group by invite code; the new member waits for admin
    /// approval.
    pub async fn join_group(&self, invite_code: &str, joiner: MemberProfile) -> Result<()> {
        let group = self
            .store
            .find_by_invite_code(invite_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid invite code".to_string()))?;

        tracing::info!(group_id = %group.id, user_id = %joiner.user_id, "join request");
        self.mutate(&group.id, |group| {
            group_workflow::add_pending_member(group, joiner.clone(), Utc::now())
        })
        .await
    }

    /// Approve or reject a pending join request. Admin only.
    pub async fn respond_join_request(
        &self,
        group_id: &str,
        target_user_id: &str,
        actor_id: &str,
        approve: bool,
    ) -> Result<()> {
        self.mutate(group_id, |group| {
            group_workflow::ensure_admin(group, actor_id)?;
            group_workflow::respond_join_request(group, target_user_id, approve)
        })
        .await
    }

    /// Elevate an approved member to admin. Admin only.
    pub async fn promote_to_admin(
        &self,
        group_id: &str,
        target_user_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        self.mutate(group_id, |group| {
            group_workflow::ensure_admin(group, actor_id)?;
            group_workflow::promote_to_admin(group, target_user_id)
        })
        .await
    }

    /// Remove a member. Admins can kick anyone; a member removing
    /// themself ("leave") bypasses the admin gate. The last remaining
    /// admin can do neither and must delete the group instead.
    pub async fn kick_member(
        &self,
        group_id: &str,
        target_user_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        self.mutate(group_id, |group| {
            if actor_id != target_user_id {
                group_workflow::ensure_admin(group, actor_id)?;
            }
            group_workflow::remove_member(group, target_user_id)
        })
        .await
    }

    /// Attach an itinerary reference to the group. Admin only.
    pub async fn link_itinerary(
        &self,
        group_id: &str,
        itinerary_id: &str,
        actor_id: &str,
    ) -> Result<()> {
        self.mutate(group_id, |group| {
            group_workflow::ensure_admin(group, actor_id)?;
            group.itinerary_id = itinerary_id.to_string();
            Ok(())
        })
        .await
    }

    /// Clear the itinerary reference. Admin only.
    pub async fn unlink_itinerary(&self, group_id: &str, actor_id: &str) -> Result<()> {
        self.mutate(group_id, |group| {
            group_workflow::ensure_admin(group, actor_id)?;
            group.itinerary_id.clear();
            Ok(())
        })
        .await
    }

    /// Hard-delete the group. Admin only, irreversible.
    pub async fn delete_group(&self, group_id: &str, actor_id: &str) -> Result<()> {
        let group = self.load(group_id).await?;
        group_workflow::ensure_admin(&group, actor_id)?;

        self.store.delete(group_id).await?;
        tracing::info!(group_id = %group_id, "deleted group");
        Ok(())
    }

    /// Every group the user appears in, pending requests included.
    /// Full scan: the store cannot index into the embedded roster.
    pub async fn list_groups_for_user(&self, user_id: &str) -> Result<Vec<Group>> {
        let groups = self.store.list_all().await?;
        Ok(groups.into_iter().filter(|g| g.has_member(user_id)).collect())
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Group> {
        self.load(group_id).await
    }

    async fn load(&self, group_id: &str) -> Result<Group> {
        self.store
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Group not found".to_string()))
    }

    /// One read-modify-write cycle with optimistic-concurrency retry:
    /// reload, re-validate, reapply, and CAS on the version counter
    /// until the write lands or the attempt budget runs out.
    async fn mutate<F>(&self, group_id: &str, mut apply: F) -> Result<()>
    where
        F: FnMut(&mut Group) -> Result<()>,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut group = self.load(group_id).await?;
            let expected_version = group.version;

            apply(&mut group)?;
            group.updated_on = Utc::now();

            if self.store.update(&group, expected_version).await? {
                return Ok(());
            }
        }

        Err(AppError::Conflict(
            "Group was modified concurrently, please retry".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::async_trait;

    use super::*;
    use crate::group::group_store::MemoryGroupStore;

    /// Store whose writes always lose the version race, as if another
    /// writer committed between every reload and update.
    struct ContendedStore {
        inner: MemoryGroupStore,
        update_calls: AtomicUsize,
    }

    impl ContendedStore {
        fn new() -> Self {
            Self {
                inner: MemoryGroupStore::new(),
                update_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GroupStore for ContendedStore {
        async fn insert(&self, group: Group) -> crate::error::Result<Group> {
            self.inner.insert(group).await
        }

        async fn find_by_id(&self, group_id: &str) -> crate::error::Result<Option<Group>> {
            self.inner.find_by_id(group_id).await
        }

        async fn find_by_invite_code(
            &self,
            invite_code: &str,
        ) -> crate::error::Result<Option<Group>> {
            self.inner.find_by_invite_code(invite_code).await
        }

        async fn list_all(&self) -> crate::error::Result<Vec<Group>> {
            self.inner.list_all().await
        }

        async fn update(
            &self,
            _group: &Group,
            _expected_version: i64,
        ) -> crate::error::Result<bool> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }

        async fn delete(&self, group_id: &str) -> crate::error::Result<()> {
            self.inner.delete(group_id).await
        }
    }

    fn profile(user_id: &str) -> MemberProfile {
        MemberProfile {
            user_id: user_id.to_string(),
            username: format!("@{user_id}"),
            name: user_id.to_uppercase(),
            profile_image: String::new(),
        }
    }

    fn service() -> GroupService {
        GroupService::new(Arc::new(MemoryGroupStore::new()))
    }

    async fn group_with_creator(service: &GroupService, creator: &str) -> CreateGroupResponse {
        service
            .create_group("Luzon Trip".to_string(), profile(creator), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_seeds_creator_as_admin_and_approved_member() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;

        assert_eq!(created.invite_code.len(), 8);
        assert!(created
            .invite_code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        let group = service.get_group(&created.group_id).await.unwrap();
        assert_eq!(group.admins, vec!["u1"]);
        assert_eq!(group.members.len(), 1);
        assert!(group.members[0].is_approved);
        assert!(group.itinerary_id.is_empty());
        assert!(group.chat_id.is_empty());
    }

    #[tokio::test]
    async fn invite_codes_differ_between_groups() {
        let service = service();
        let a = group_with_creator(&service, "u1").await;
        let b = group_with_creator(&service, "u1").await;
        assert_ne!(a.invite_code, b.invite_code);
    }

    #[tokio::test]
    async fn join_shows_up_as_pending() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;

        service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap();

        let group = service.get_group(&created.group_id).await.unwrap();
        let member = group.find_member("u2").unwrap();
        assert!(!member.is_approved);
        assert!(!group.is_admin("u2"));
    }

    #[tokio::test]
    async fn join_with_unknown_code_leaves_no_trace() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;

        let err = service
            .join_group("NOSUCH00", profile("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let groups = service.list_groups_for_user("u2").await.unwrap();
        assert!(groups.is_empty());
        let group = service.get_group(&created.group_id).await.unwrap();
        assert_eq!(group.members.len(), 1);
    }

    #[tokio::test]
    async fn joining_twice_is_a_conflict() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;

        service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap();
        let err = service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn approve_then_reject_paths() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;
        let group_id = created.group_id;

        service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap();
        service
            .join_group(&created.invite_code, profile("u3"))
            .await
            .unwrap();

        service
            .respond_join_request(&group_id, "u2", "u1", true)
            .await
            .unwrap();
        service
            .respond_join_request(&group_id, "u3", "u1", false)
            .await
            .unwrap();

        let group = service.get_group(&group_id).await.unwrap();
        assert!(group.find_member("u2").unwrap().is_approved);
        assert!(!group.has_member("u3"));

        // The rejected user is gone, so a second response finds nobody.
        let err = service
            .respond_join_request(&group_id, "u3", "u1", true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn gated_operations_reject_non_admins() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;
        let group_id = created.group_id;

        service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap();
        service
            .respond_join_request(&group_id, "u2", "u1", true)
            .await
            .unwrap();
        service
            .join_group(&created.invite_code, profile("u3"))
            .await
            .unwrap();

        let forbidden = |err: AppError| matches!(err, AppError::Forbidden(_));

        assert!(forbidden(
            service
                .respond_join_request(&group_id, "u3", "u2", true)
                .await
                .unwrap_err()
        ));
        assert!(forbidden(
            service
                .promote_to_admin(&group_id, "u3", "u2")
                .await
                .unwrap_err()
        ));
        assert!(forbidden(
            service
                .kick_member(&group_id, "u1", "u2")
                .await
                .unwrap_err()
        ));
        assert!(forbidden(
            service
                .link_itinerary(&group_id, "it-1", "u2")
                .await
                .unwrap_err()
        ));
        assert!(forbidden(
            service
                .unlink_itinerary(&group_id, "u2")
                .await
                .unwrap_err()
        ));
        assert!(forbidden(
            service.delete_group(&group_id, "u2").await.unwrap_err()
        ));
    }

    #[tokio::test]
    async fn non_admin_member_can_leave_voluntarily() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;
        let group_id = created.group_id;

        service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap();
        service
            .respond_join_request(&group_id, "u2", "u1", true)
            .await
            .unwrap();

        service.kick_member(&group_id, "u2", "u2").await.unwrap();

        let group = service.get_group(&group_id).await.unwrap();
        assert!(!group.has_member("u2"));
    }

    #[tokio::test]
    async fn last_admin_cannot_leave() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;

        let err = service
            .kick_member(&created.group_id, "u1", "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn itinerary_link_and_unlink() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;

        service
            .link_itinerary(&created.group_id, "itin-42", "u1")
            .await
            .unwrap();
        let group = service.get_group(&created.group_id).await.unwrap();
        assert_eq!(group.itinerary_id, "itin-42");

        service
            .unlink_itinerary(&created.group_id, "u1")
            .await
            .unwrap();
        let group = service.get_group(&created.group_id).await.unwrap();
        assert!(group.itinerary_id.is_empty());
    }

    #[tokio::test]
    async fn list_groups_includes_pending_membership() {
        let service = service();
        let first = group_with_creator(&service, "u1").await;
        let second = service
            .create_group("Batanes".to_string(), profile("u9"), None)
            .await
            .unwrap();

        service
            .join_group(&first.invite_code, profile("u2"))
            .await
            .unwrap();

        let groups = service.list_groups_for_user("u2").await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, first.group_id);

        let creator_groups = service.list_groups_for_user("u9").await.unwrap();
        assert_eq!(creator_groups.len(), 1);
        assert_eq!(creator_groups[0].id, second.group_id);
    }

    #[tokio::test]
    async fn mutations_refresh_updated_on() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;

        let before = service.get_group(&created.group_id).await.unwrap();
        service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap();
        let after = service.get_group(&created.group_id).await.unwrap();

        assert!(after.updated_on >= before.updated_on);
        assert_eq!(after.created_on, before.created_on);
    }

    #[tokio::test]
    async fn operations_on_missing_group_report_not_found() {
        let service = service();
        let missing = "does-not-exist";

        assert!(matches!(
            service.get_group(missing).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service
                .respond_join_request(missing, "u2", "u1", true)
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.delete_group(missing, "u1").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn exhausted_write_retries_surface_a_conflict() {
        let store = Arc::new(ContendedStore::new());
        let service = GroupService::new(store.clone());

        let created = service
            .create_group("Luzon Trip".to_string(), profile("u1"), None)
            .await
            .unwrap();

        let err = service
            .link_itinerary(&created.group_id, "itin-42", "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            store.update_calls.load(Ordering::SeqCst),
            MAX_WRITE_ATTEMPTS
        );

        // Nothing landed: the aggregate is unchanged.
        let group = service.get_group(&created.group_id).await.unwrap();
        assert!(group.itinerary_id.is_empty());
    }

    /// Full lifecycle: create, join, approve, promote, kick the
    /// original admin, and finally dissolve the group.
    #[tokio::test]
    async fn luzon_trip_lifecycle() {
        let service = service();
        let created = group_with_creator(&service, "u1").await;
        let group_id = created.group_id.clone();

        service
            .join_group(&created.invite_code, profile("u2"))
            .await
            .unwrap();
        service
            .respond_join_request(&group_id, "u2", "u1", true)
            .await
            .unwrap();
        service
            .promote_to_admin(&group_id, "u2", "u1")
            .await
            .unwrap();

        let group = service.get_group(&group_id).await.unwrap();
        assert_eq!(group.admins, vec!["u1", "u2"]);

        service.kick_member(&group_id, "u1", "u2").await.unwrap();
        let group = service.get_group(&group_id).await.unwrap();
        assert_eq!(group.admins, vec!["u2"]);
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.members[0].user_id, "u2");

        service.delete_group(&group_id, "u2").await.unwrap();
        assert!(matches!(
            service.get_group(&group_id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
