//! In-memory role store.

use std::sync::Arc;

use async_trait::async_trait;
use backplane_auth::error::{AuthError, AuthResult};
use backplane_auth::storage::RoleStore;
use backplane_auth::types::Role;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};

/// Role store keyed by role name.
pub struct InMemoryRoleStore {
    rows: Arc<PapayaHashMap<String, Role>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(PapayaHashMap::new()),
        }
    }
}

impl Default for InMemoryRoleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn find_by_name(&self, name: &str) -> AuthResult<Option<Role>> {
        let rows = self.rows.pin();
        Ok(rows.get(name).cloned())
    }

    async fn create(&self, role: &Role) -> AuthResult<()> {
        let rows = self.rows.pin();
        let outcome = rows.compute(role.name.clone(), |entry| match entry {
            None => Operation::Insert(role.clone()),
            Some(_) => Operation::Abort(()),
        });
        match outcome {
            Compute::Aborted(()) => Err(AuthError::storage(format!(
                "role '{}' already exists",
                role.name
            ))),
            _ => Ok(()),
        }
    }

    async fn list(&self) -> AuthResult<Vec<Role>> {
        let rows = self.rows.pin();
        let mut roles: Vec<Role> = rows.iter().map(|(_, role)| role.clone()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }
}
