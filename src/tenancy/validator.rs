use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::database::directory::{DirectoryError, TenantDirectory};
use crate::database::models::tenant::TenantRecord;
use super::context::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Unknown,
    Inactive,
}

/// Outcome of checking one candidate id against the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(TenantRecord),
    Rejected(RejectionReason),
}

impl Validation {
    pub fn is_active(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    pub fn record(&self) -> Option<&TenantRecord> {
        match self {
            Validation::Valid(record) => Some(record),
            Validation::Rejected(_) => None,
        }
    }
}

/// Confirms candidate ids name an active tenant.
///
/// Successful lookups are cached without expiry; rejections are not cached, so a
/// tenant activated after a failed attempt is picked up on its next request.
/// Directory errors come back as `Err`, expected rejections as `Ok(Rejected)`.
pub struct TenantValidator {
    directory: Arc<dyn TenantDirectory>,
    cache: RwLock<HashMap<TenantId, TenantRecord>>,
}

impl TenantValidator {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self {
            directory,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn validate(&self, id: &TenantId) -> Result<Validation, DirectoryError> {
        {
            let cache = self.cache.read().await;
            if let Some(record) = cache.get(id) {
                return Ok(Validation::Valid(record.clone()));
            }
        }

        debug!(tenant_id = %id, "validation cache miss");
        let validation = match self.directory.find(id).await? {
            None => Validation::Rejected(RejectionReason::Unknown),
            Some(record) if !record.active => Validation::Rejected(RejectionReason::Inactive),
            Some(record) => {
                let mut cache = self.cache.write().await;
                cache.insert(id.clone(), record.clone());
                Validation::Valid(record)
            }
        };
        Ok(validation)
    }

    /// Forget a cached tenant. Returns whether it was cached.
    pub async fn invalidate(&self, id: &TenantId) -> bool {
        let mut cache = self.cache.write().await;
        cache.remove(id).is_some()
    }

    pub async fn invalidate_all(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    pub fn directory(&self) -> &Arc<dyn TenantDirectory> {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{inactive_record, record, tenant_id, InMemoryDirectory};

    fn validator() -> (Arc<InMemoryDirectory>, TenantValidator) {
        let directory = Arc::new(InMemoryDirectory::with([
            record("acme"),
            inactive_record("dormant"),
        ]));
        let validator = TenantValidator::new(directory.clone());
        (directory, validator)
    }

    #[tokio::test]
    async fn active_tenant_is_valid_and_cached() {
        let (directory, validator) = validator();

        let first = validator.validate(&tenant_id("acme")).await.unwrap();
        assert!(first.is_active());
        assert_eq!(first.record().unwrap().tenant_id, tenant_id("acme"));

        let second = validator.validate(&tenant_id("acme")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn unknown_and_inactive_are_rejected() {
        let (_, validator) = validator();

        assert_eq!(
            validator.validate(&tenant_id("ghost")).await.unwrap(),
            Validation::Rejected(RejectionReason::Unknown)
        );
        assert_eq!(
            validator.validate(&tenant_id("dormant")).await.unwrap(),
            Validation::Rejected(RejectionReason::Inactive)
        );
    }

    #[tokio::test]
    async fn rejections_are_not_cached() {
        let (directory, validator) = validator();

        validator.validate(&tenant_id("ghost")).await.unwrap();
        validator.validate(&tenant_id("ghost")).await.unwrap();
        assert_eq!(directory.lookups(), 2);
    }

    #[tokio::test]
    async fn lookup_is_case_sensitive() {
        let (_, validator) = validator();
        assert!(!validator.validate(&tenant_id("ACME")).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn directory_failure_is_an_error_not_a_rejection() {
        let (directory, validator) = validator();
        directory.set_failing(true);

        assert!(validator.validate(&tenant_id("acme")).await.is_err());
    }

    #[tokio::test]
    async fn cached_tenant_survives_directory_outage() {
        let (directory, validator) = validator();
        validator.validate(&tenant_id("acme")).await.unwrap();
        directory.set_failing(true);

        assert!(validator.validate(&tenant_id("acme")).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn invalidate_forces_directory_read() {
        let (directory, validator) = validator();
        validator.validate(&tenant_id("acme")).await.unwrap();

        assert!(validator.invalidate(&tenant_id("acme")).await);
        assert!(!validator.invalidate(&tenant_id("acme")).await);
        validator.validate(&tenant_id("acme")).await.unwrap();
        assert_eq!(directory.lookups(), 2);

        validator.invalidate_all().await;
        validator.validate(&tenant_id("acme")).await.unwrap();
        assert_eq!(directory.lookups(), 3);
    }
}
