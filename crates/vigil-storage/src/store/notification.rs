use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use vigil_common::types::NotificationMethodType;

use crate::entities::alarm_action::{Column as ActionCol, Entity as ActionEntity};
use crate::entities::notification_method::{self, Column as MethodCol, Entity as MethodEntity};
use crate::error::{Result, StorageError};
use crate::store::SqlStore;
use crate::NotificationMethodRepo;

const ENTITY: &str = "notification_method";

/// 通知方式数据行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMethodRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub method_type: NotificationMethodType,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn to_row(m: notification_method::Model) -> Result<NotificationMethodRow> {
    let method_type = m
        .method_type
        .parse()
        .map_err(|_| StorageError::UnexpectedColumnValue {
            column: "type",
            value: m.method_type.clone(),
        })?;
    Ok(NotificationMethodRow {
        id: m.id,
        tenant_id: m.tenant_id,
        name: m.name,
        method_type,
        address: m.address,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

/// Fails with `AlreadyExists` if another row of the tenant carries `name`.
async fn ensure_name_free<C: ConnectionTrait>(
    conn: &C,
    tenant_id: &str,
    name: &str,
    except_id: Option<&str>,
) -> Result<()> {
    let mut q = MethodEntity::find()
        .filter(MethodCol::TenantId.eq(tenant_id))
        .filter(MethodCol::Name.eq(name));
    if let Some(id) = except_id {
        q = q.filter(MethodCol::Id.ne(id));
    }
    if q.one(conn).await?.is_some() {
        return Err(StorageError::AlreadyExists {
            entity: ENTITY,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// IDs from `ids` that are not notification methods of the tenant.
pub(crate) async fn missing_ids<C: ConnectionTrait>(
    conn: &C,
    tenant_id: &str,
    ids: &[String],
) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: HashSet<String> = MethodEntity::find()
        .select_only()
        .column(MethodCol::Id)
        .filter(MethodCol::TenantId.eq(tenant_id))
        .filter(MethodCol::Id.is_in(ids.iter().map(String::as_str)))
        .into_tuple::<String>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    let mut seen = HashSet::new();
    Ok(ids
        .iter()
        .filter(|id| !found.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect())
}

#[async_trait]
impl NotificationMethodRepo for SqlStore {
    async fn create(
        &self,
        tenant_id: &str,
        name: &str,
        method_type: NotificationMethodType,
        address: &str,
    ) -> Result<String> {
        let txn = self.db().begin().await?;
        ensure_name_free(&txn, tenant_id, name, None).await?;

        let id = self.ids.next_id();
        let now = Utc::now().fixed_offset();
        let am = notification_method::ActiveModel {
            id: Set(id.clone()),
            tenant_id: Set(tenant_id.to_string()),
            name: Set(name.to_string()),
            method_type: Set(method_type.as_str().to_string()),
            address: Set(address.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        MethodEntity::insert(am)
            .exec_without_returning(&txn)
            .await
            .map_err(|e| StorageError::from_insert(e, ENTITY, name))?;
        txn.commit().await?;

        tracing::info!(tenant_id, id = %id, name, "Created notification method");
        Ok(id)
    }

    async fn get(&self, tenant_id: &str, id: &str) -> Result<NotificationMethodRow> {
        let model = MethodEntity::find_by_id(id)
            .filter(MethodCol::TenantId.eq(tenant_id))
            .one(self.db())
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            })?;
        to_row(model)
    }

    async fn list(
        &self,
        tenant_id: &str,
        offset: Option<&str>,
        limit: u64,
    ) -> Result<Vec<NotificationMethodRow>> {
        let mut q = MethodEntity::find().filter(MethodCol::TenantId.eq(tenant_id));
        if let Some(after) = offset {
            q = q.filter(MethodCol::Id.gt(after));
        }
        q.order_by_asc(MethodCol::Id)
            .limit(limit.saturating_add(1))
            .all(self.db())
            .await?
            .into_iter()
            .map(to_row)
            .collect()
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<()> {
        let txn = self.db().begin().await?;
        let res = MethodEntity::delete_many()
            .filter(MethodCol::Id.eq(id))
            .filter(MethodCol::TenantId.eq(tenant_id))
            .exec(&txn)
            .await?;
        if res.rows_affected == 0 {
            return Err(StorageError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            });
        }
        let unlinked = ActionEntity::delete_many()
            .filter(ActionCol::NotificationMethodId.eq(id))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(
            tenant_id,
            id,
            unlinked_actions = unlinked.rows_affected,
            "Deleted notification method"
        );
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        tenant_id: &str,
        name: &str,
        method_type: NotificationMethodType,
        address: &str,
    ) -> Result<NotificationMethodRow> {
        let txn = self.db().begin().await?;
        let existing = MethodEntity::find_by_id(id)
            .filter(MethodCol::TenantId.eq(tenant_id))
            .one(&txn)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            })?;
        ensure_name_free(&txn, tenant_id, name, Some(id)).await?;

        let mut am: notification_method::ActiveModel = existing.into();
        am.name = Set(name.to_string());
        am.method_type = Set(method_type.as_str().to_string());
        am.address = Set(address.to_string());
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am
            .update(&txn)
            .await
            .map_err(|e| StorageError::from_insert(e, ENTITY, name))?;
        txn.commit().await?;
        to_row(updated)
    }

    async fn find_by_name(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<NotificationMethodRow>> {
        MethodEntity::find()
            .filter(MethodCol::TenantId.eq(tenant_id))
            .filter(MethodCol::Name.eq(name))
            .one(self.db())
            .await?
            .map(to_row)
            .transpose()
    }

    async fn find_missing(&self, tenant_id: &str, ids: &[String]) -> Result<Vec<String>> {
        missing_ids(self.db(), tenant_id, ids).await
    }
}
