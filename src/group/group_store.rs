use axum::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

use super::group_models::Group;

/// Persistence boundary for group aggregates. The store treats the
/// aggregate as one document: reads return the full roster, writes
/// replace it, and a version counter turns concurrent read-modify-write
/// cycles into detectable conflicts instead of silent lost updates.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Persist a new aggregate. The store assigns the id and starts the
    /// version counter at zero.
    async fn insert(&self, group: Group) -> Result<Group>;

    async fn find_by_id(&self, group_id: &str) -> Result<Option<Group>>;

    async fn find_by_invite_code(&self, invite_code: &str) -> Result<Option<Group>>;

    /// Every group, unfiltered. Member queries scan in the application
    /// because the store cannot index into an array-of-objects field.
    async fn list_all(&self) -> Result<Vec<Group>>;

    /// Compare-and-swap write: replaces the document only if its stored
    /// version still equals `expected_version`. Returns `false` on a
    /// version mismatch (including a concurrently deleted group).
    async fn update(&self, group: &Group, expected_version: i64) -> Result<bool>;

    async fn delete(&self, group_id: &str) -> Result<()>;
}

/// Postgres-backed store. The aggregate lives in a JSONB column; the
/// id, invite code, and version are lifted into columns so lookups and
/// the CAS update stay indexed.
#[derive(Clone)]
pub struct PgGroupStore {
    pool: PgPool,
}

impl PgGroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_group(id: Uuid, version: i64, doc: serde_json::Value) -> Result<Group> {
        let mut group: Group = serde_json::from_value(doc)?;
        group.id = id.to_string();
        group.version = version;
        Ok(group)
    }
}

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn insert(&self, mut group: Group) -> Result<Group> {
        let id = Uuid::new_v4();
        group.id = id.to_string();
        group.version = 0;

        sqlx::query(
            "INSERT INTO groups (id, invite_code, version, doc)
             VALUES ($1, $2, 0, $3)",
        )
        .bind(id)
        .bind(&group.invite_code)
        .bind(serde_json::to_value(&group)?)
        .execute(&self.pool)
        .await?;

        Ok(group)
    }

    async fn find_by_id(&self, group_id: &str) -> Result<Option<Group>> {
        let Ok(id) = Uuid::parse_str(group_id) else {
            return Ok(None);
        };

        let row: Option<(Uuid, i64, serde_json::Value)> =
            sqlx::query_as("SELECT id, version, doc FROM groups WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, version, doc)| Self::row_to_group(id, version, doc))
            .transpose()
    }

    async fn find_by_invite_code(&self, invite_code: &str) -> Result<Option<Group>> {
        let row: Option<(Uuid, i64, serde_json::Value)> =
            sqlx::query_as("SELECT id, version, doc FROM groups WHERE invite_code = $1")
                .bind(invite_code)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, version, doc)| Self::row_to_group(id, version, doc))
            .transpose()
    }

    async fn list_all(&self) -> Result<Vec<Group>> {
        let rows: Vec<(Uuid, i64, serde_json::Value)> =
            sqlx::query_as("SELECT id, version, doc FROM groups ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, version, doc)| Self::row_to_group(id, version, doc))
            .collect()
    }

    async fn update(&self, group: &Group, expected_version: i64) -> Result<bool> {
        let Ok(id) = Uuid::parse_str(&group.id) else {
            return Ok(false);
        };

        let result = sqlx::query(
            "UPDATE groups
             SET doc = $1, version = version + 1, updated_at = NOW()
             WHERE id = $2 AND version = $3",
        )
        .bind(serde_json::to_value(group)?)
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, group_id: &str) -> Result<()> {
        let Ok(id) = Uuid::parse_str(group_id) else {
            return Ok(());
        };

        sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// In-memory store with the same CAS semantics as the Postgres one.
/// Backs the unit tests.
#[derive(Default)]
pub struct MemoryGroupStore {
    groups: DashMap<String, Group>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn insert(&self, mut group: Group) -> Result<Group> {
        group.id = Uuid::new_v4().to_string();
        group.version = 0;
        self.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    async fn find_by_id(&self, group_id: &str) -> Result<Option<Group>> {
        Ok(self.groups.get(group_id).map(|g| g.value().clone()))
    }

    async fn find_by_invite_code(&self, invite_code: &str) -> Result<Option<Group>> {
        Ok(self
            .groups
            .iter()
            .find(|g| g.invite_code == invite_code)
            .map(|g| g.value().clone()))
    }

    async fn list_all(&self) -> Result<Vec<Group>> {
        Ok(self.groups.iter().map(|g| g.value().clone()).collect())
    }

    async fn update(&self, group: &Group, expected_version: i64) -> Result<bool> {
        match self.groups.get_mut(&group.id) {
            Some(mut entry) if entry.version == expected_version => {
                let mut updated = group.clone();
                updated.version = expected_version + 1;
                *entry = updated;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, group_id: &str) -> Result<()> {
        self.groups.remove(group_id);
        Ok(())
    }
}
