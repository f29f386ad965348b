//! Relational persistence for alarm definitions and notification methods.
//!
//! The repository contracts ([`NotificationMethodRepo`], [`AlarmDefinitionRepo`])
//! are implemented by [`store::SqlStore`], which uses SeaORM over any engine the
//! connection URL selects. Every write runs inside a single transaction so an
//! existence check and the mutation that depends on it are atomic.

pub mod entities;
pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use vigil_common::types::NotificationMethodType;

pub use error::{Result, StorageError};
pub use store::{
    AlarmDefinitionFilter, AlarmDefinitionPatch, AlarmDefinitionRow, AlarmDefinitionWrite,
    NotificationMethodRow, SqlStore,
};

/// Storage contract for notification methods.
///
/// All lookups are scoped by `tenant_id`; a row owned by another tenant is
/// indistinguishable from a missing one.
#[async_trait]
pub trait NotificationMethodRepo: Send + Sync {
    /// Persists a new method and returns its generated ID.
    async fn create(
        &self,
        tenant_id: &str,
        name: &str,
        method_type: NotificationMethodType,
        address: &str,
    ) -> Result<String>;

    async fn get(&self, tenant_id: &str, id: &str) -> Result<NotificationMethodRow>;

    /// Returns up to `limit + 1` rows ordered by ID, strictly after `offset`.
    async fn list(
        &self,
        tenant_id: &str,
        offset: Option<&str>,
        limit: u64,
    ) -> Result<Vec<NotificationMethodRow>>;

    /// Deletes the method and every action-list entry that references it.
    async fn delete(&self, tenant_id: &str, id: &str) -> Result<()>;

    async fn update(
        &self,
        id: &str,
        tenant_id: &str,
        name: &str,
        method_type: NotificationMethodType,
        address: &str,
    ) -> Result<NotificationMethodRow>;

    async fn find_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<NotificationMethodRow>>;

    /// Returns the subset of `ids` the tenant does not own, in input order.
    async fn find_missing(&self, tenant_id: &str, ids: &[String]) -> Result<Vec<String>>;
}

/// Storage contract for alarm definitions and their action-list associations.
#[async_trait]
pub trait AlarmDefinitionRepo: Send + Sync {
    /// Inserts the definition, its action rows and its dimension rows in one
    /// transaction. Fails with [`StorageError::InvalidActionReference`] if any
    /// action ID is unknown, leaving nothing behind.
    async fn create(&self, tenant_id: &str, def: &AlarmDefinitionWrite)
        -> Result<AlarmDefinitionRow>;

    async fn get(&self, tenant_id: &str, id: &str) -> Result<AlarmDefinitionRow>;

    /// Returns up to `limit + 1` rows ordered by ID, strictly after `offset`.
    async fn list(
        &self,
        tenant_id: &str,
        filter: &AlarmDefinitionFilter,
        offset: Option<&str>,
        limit: u64,
    ) -> Result<Vec<AlarmDefinitionRow>>;

    /// Replaces every mutable field and all three action lists.
    async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        def: &AlarmDefinitionWrite,
    ) -> Result<AlarmDefinitionRow>;

    /// Loads the current row, merges the supplied fields and replaces it.
    async fn patch(
        &self,
        tenant_id: &str,
        id: &str,
        patch: &AlarmDefinitionPatch,
    ) -> Result<AlarmDefinitionRow>;

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<()>;
}
