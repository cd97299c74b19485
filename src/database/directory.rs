use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::database::models::tenant::{TenantRecord, TenantRow};
use crate::database::registry::RegistryError;
use crate::tenancy::TenantId;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("tenant directory unavailable: {0}")]
    Unavailable(#[from] RegistryError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Read-only lookup of tenant records in the central store
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Record for `id` whatever its active flag.
    async fn find(&self, id: &TenantId) -> Result<Option<TenantRecord>, DirectoryError>;

    async fn find_active(&self, id: &TenantId) -> Result<Option<TenantRecord>, DirectoryError> {
        Ok(self.find(id).await?.filter(|record| record.active))
    }

    async fn find_all_active(&self) -> Result<Vec<TenantId>, DirectoryError>;
}

/// Directory backed by the master database's `tenants` table
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_TENANT: &str = r#"
    SELECT
        tenant_id, name, active, db_url, db_username, db_password,
        driver, max_pool_size, min_idle, created_at, updated_at
    FROM tenants
    WHERE tenant_id = $1
"#;

const SELECT_ACTIVE_IDS: &str = r#"
    SELECT tenant_id
    FROM tenants
    WHERE active = true
    ORDER BY tenant_id
"#;

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find(&self, id: &TenantId) -> Result<Option<TenantRecord>, DirectoryError> {
        let row = sqlx::query_as::<_, TenantRow>(SELECT_TENANT)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(TenantRow::into_record))
    }

    async fn find_all_active(&self) -> Result<Vec<TenantId>, DirectoryError> {
        let ids: Vec<(String,)> = sqlx::query_as(SELECT_ACTIVE_IDS)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.iter().filter_map(|(id,)| TenantId::parse(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{inactive_record, record, tenant_id, InMemoryDirectory};

    fn directory() -> InMemoryDirectory {
        InMemoryDirectory::with([record("acme"), inactive_record("dormant")])
    }

    #[tokio::test]
    async fn find_active_filters_inactive_and_unknown() {
        let directory = directory();

        let acme = directory.find_active(&tenant_id("acme")).await.unwrap();
        assert_eq!(acme.map(|r| r.tenant_id), Some(tenant_id("acme")));
        assert!(directory.find_active(&tenant_id("dormant")).await.unwrap().is_none());
        assert!(directory.find_active(&tenant_id("ghost")).await.unwrap().is_none());

        // find still sees the inactive record
        let dormant = directory.find(&tenant_id("dormant")).await.unwrap().unwrap();
        assert!(!dormant.active);
    }

    #[tokio::test]
    async fn find_active_propagates_outages() {
        let directory = directory();
        directory.set_failing(true);

        assert!(matches!(
            directory.find_active(&tenant_id("acme")).await,
            Err(DirectoryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn find_all_active_lists_active_ids() {
        let ids = directory().find_all_active().await.unwrap();
        assert_eq!(ids, vec![tenant_id("acme")]);
    }
}
