use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vigil_common::expression::AlarmExpression;
use vigil_common::types::{ActionType, Severity};

use crate::entities::alarm_action::{self, Column as ActionCol, Entity as ActionEntity};
use crate::entities::alarm_definition::{self, Column as DefCol, Entity as DefEntity};
use crate::entities::alarm_definition_dimension::{self, Column as DimCol, Entity as DimEntity};
use crate::error::{Result, StorageError};
use crate::store::notification::missing_ids;
use crate::store::SqlStore;
use crate::AlarmDefinitionRepo;

const ENTITY: &str = "alarm_definition";

/// 告警定义数据行（含三组通知动作）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinitionRow {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: String,
    pub expression: String,
    pub match_by: Vec<String>,
    pub severity: Severity,
    pub actions_enabled: bool,
    pub alarm_actions: Vec<String>,
    pub ok_actions: Vec<String>,
    pub undetermined_actions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 告警定义写入内容（创建与全量更新共用，默认值已由调用方填充）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmDefinitionWrite {
    pub name: String,
    pub description: String,
    pub expression: String,
    pub match_by: Vec<String>,
    pub severity: Severity,
    pub actions_enabled: bool,
    pub alarm_actions: Vec<String>,
    pub ok_actions: Vec<String>,
    pub undetermined_actions: Vec<String>,
}

impl AlarmDefinitionWrite {
    pub fn actions(&self, action_type: ActionType) -> &[String] {
        match action_type {
            ActionType::Alarm => &self.alarm_actions,
            ActionType::Ok => &self.ok_actions,
            ActionType::Undetermined => &self.undetermined_actions,
        }
    }

    fn all_action_ids(&self) -> Vec<String> {
        ActionType::ALL
            .iter()
            .flat_map(|t| self.actions(*t).iter().cloned())
            .collect()
    }
}

/// 告警定义部分更新（`None` 表示保留原值）
///
/// `match_by` 不可修改，因此不在此结构中。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmDefinitionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub expression: Option<String>,
    pub severity: Option<Severity>,
    pub actions_enabled: Option<bool>,
    pub alarm_actions: Option<Vec<String>>,
    pub ok_actions: Option<Vec<String>>,
    pub undetermined_actions: Option<Vec<String>>,
}

impl AlarmDefinitionPatch {
    /// Merges the supplied fields over `current`.
    pub fn apply_to(&self, current: AlarmDefinitionRow) -> AlarmDefinitionWrite {
        AlarmDefinitionWrite {
            name: self.name.clone().unwrap_or(current.name),
            description: self.description.clone().unwrap_or(current.description),
            expression: self.expression.clone().unwrap_or(current.expression),
            match_by: current.match_by,
            severity: self.severity.unwrap_or(current.severity),
            actions_enabled: self.actions_enabled.unwrap_or(current.actions_enabled),
            alarm_actions: self.alarm_actions.clone().unwrap_or(current.alarm_actions),
            ok_actions: self.ok_actions.clone().unwrap_or(current.ok_actions),
            undetermined_actions: self
                .undetermined_actions
                .clone()
                .unwrap_or(current.undetermined_actions),
        }
    }
}

/// 告警定义过滤条件
#[derive(Debug, Clone, Default)]
pub struct AlarmDefinitionFilter {
    /// 名称精确匹配
    pub name: Option<String>,
    /// 表达式必须引用全部 `(dimension, value)` 对
    pub dimensions: Vec<(String, String)>,
}

type ActionLists = HashMap<ActionType, Vec<String>>;

fn to_row(m: alarm_definition::Model, mut actions: ActionLists) -> Result<AlarmDefinitionRow> {
    let severity = m
        .severity
        .parse()
        .map_err(|_| StorageError::UnexpectedColumnValue {
            column: "severity",
            value: m.severity.clone(),
        })?;
    let match_by: Vec<String> = serde_json::from_str(&m.match_by)?;
    Ok(AlarmDefinitionRow {
        id: m.id,
        tenant_id: m.tenant_id,
        name: m.name,
        description: m.description,
        expression: m.expression,
        match_by,
        severity,
        actions_enabled: m.actions_enabled,
        alarm_actions: actions.remove(&ActionType::Alarm).unwrap_or_default(),
        ok_actions: actions.remove(&ActionType::Ok).unwrap_or_default(),
        undetermined_actions: actions.remove(&ActionType::Undetermined).unwrap_or_default(),
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    })
}

fn lists_of(def: &AlarmDefinitionWrite) -> ActionLists {
    ActionType::ALL
        .iter()
        .map(|t| (*t, def.actions(*t).to_vec()))
        .collect()
}

/// Action lists for each definition in `ids`, keyed by definition ID.
async fn load_actions<C: ConnectionTrait>(
    conn: &C,
    ids: &[String],
) -> Result<HashMap<String, ActionLists>> {
    let mut out: HashMap<String, ActionLists> = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }
    let rows = ActionEntity::find()
        .filter(ActionCol::AlarmDefinitionId.is_in(ids.iter().map(String::as_str)))
        .order_by_asc(ActionCol::Position)
        .all(conn)
        .await?;
    for row in rows {
        let action_type: ActionType =
            row.action_type
                .parse()
                .map_err(|_| StorageError::UnexpectedColumnValue {
                    column: "action_type",
                    value: row.action_type.clone(),
                })?;
        out.entry(row.alarm_definition_id)
            .or_default()
            .entry(action_type)
            .or_default()
            .push(row.notification_method_id);
    }
    Ok(out)
}

async fn find_model<C: ConnectionTrait>(
    conn: &C,
    tenant_id: &str,
    id: &str,
) -> Result<alarm_definition::Model> {
    DefEntity::find_by_id(id)
        .filter(DefCol::TenantId.eq(tenant_id))
        .one(conn)
        .await?
        .ok_or_else(|| StorageError::NotFound {
            entity: ENTITY,
            id: id.to_string(),
        })
}

async fn ensure_name_free<C: ConnectionTrait>(
    conn: &C,
    tenant_id: &str,
    name: &str,
    except_id: Option<&str>,
) -> Result<()> {
    let mut q = DefEntity::find()
        .filter(DefCol::TenantId.eq(tenant_id))
        .filter(DefCol::Name.eq(name));
    if let Some(id) = except_id {
        q = q.filter(DefCol::Id.ne(id));
    }
    if q.one(conn).await?.is_some() {
        return Err(StorageError::AlreadyExists {
            entity: ENTITY,
            name: name.to_string(),
        });
    }
    Ok(())
}

async fn ensure_actions_exist<C: ConnectionTrait>(
    conn: &C,
    tenant_id: &str,
    def: &AlarmDefinitionWrite,
) -> Result<()> {
    let missing = missing_ids(conn, tenant_id, &def.all_action_ids()).await?;
    match missing.into_iter().next() {
        Some(id) => Err(StorageError::InvalidActionReference { id }),
        None => Ok(()),
    }
}

/// Delete-then-insert of the action and dimension rows owned by `def_id`.
async fn replace_children<C: ConnectionTrait>(
    conn: &C,
    def_id: &str,
    def: &AlarmDefinitionWrite,
    expression: &AlarmExpression,
) -> Result<()> {
    ActionEntity::delete_many()
        .filter(ActionCol::AlarmDefinitionId.eq(def_id))
        .exec(conn)
        .await?;
    DimEntity::delete_many()
        .filter(DimCol::AlarmDefinitionId.eq(def_id))
        .exec(conn)
        .await?;

    let actions: Vec<alarm_action::ActiveModel> = ActionType::ALL
        .iter()
        .flat_map(|t| {
            def.actions(*t)
                .iter()
                .enumerate()
                .map(move |(pos, method_id)| alarm_action::ActiveModel {
                    alarm_definition_id: Set(def_id.to_string()),
                    action_type: Set(t.as_str().to_string()),
                    position: Set(pos as i32),
                    notification_method_id: Set(method_id.clone()),
                })
        })
        .collect();
    if !actions.is_empty() {
        ActionEntity::insert_many(actions)
            .exec_without_returning(conn)
            .await?;
    }

    let dims: Vec<alarm_definition_dimension::ActiveModel> = expression
        .dimensions()
        .into_iter()
        .map(|(name, value)| alarm_definition_dimension::ActiveModel {
            alarm_definition_id: Set(def_id.to_string()),
            dimension_name: Set(name),
            value: Set(value),
        })
        .collect();
    if !dims.is_empty() {
        DimEntity::insert_many(dims)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

impl SqlStore {
    /// Shared body of `update` and `patch`; runs inside the caller's transaction.
    async fn replace_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        tenant_id: &str,
        existing: alarm_definition::Model,
        def: &AlarmDefinitionWrite,
    ) -> Result<AlarmDefinitionRow> {
        let expression = AlarmExpression::parse(&def.expression)?;
        ensure_name_free(conn, tenant_id, &def.name, Some(&existing.id)).await?;
        ensure_actions_exist(conn, tenant_id, def).await?;

        let id = existing.id.clone();
        let mut am: alarm_definition::ActiveModel = existing.into();
        am.name = Set(def.name.clone());
        am.description = Set(def.description.clone());
        am.expression = Set(def.expression.clone());
        am.match_by = Set(serde_json::to_string(&def.match_by)?);
        am.severity = Set(def.severity.as_str().to_string());
        am.actions_enabled = Set(def.actions_enabled);
        am.updated_at = Set(Utc::now().fixed_offset());
        let updated = am
            .update(conn)
            .await
            .map_err(|e| StorageError::from_insert(e, ENTITY, &def.name))?;

        replace_children(conn, &id, def, &expression).await?;
        to_row(updated, lists_of(def))
    }
}

#[async_trait]
impl AlarmDefinitionRepo for SqlStore {
    async fn create(
        &self,
        tenant_id: &str,
        def: &AlarmDefinitionWrite,
    ) -> Result<AlarmDefinitionRow> {
        let expression = AlarmExpression::parse(&def.expression)?;

        let txn = self.db().begin().await?;
        ensure_name_free(&txn, tenant_id, &def.name, None).await?;
        ensure_actions_exist(&txn, tenant_id, def).await?;

        let id = self.ids.next_id();
        let now = Utc::now().fixed_offset();
        let am = alarm_definition::ActiveModel {
            id: Set(id.clone()),
            tenant_id: Set(tenant_id.to_string()),
            name: Set(def.name.clone()),
            description: Set(def.description.clone()),
            expression: Set(def.expression.clone()),
            match_by: Set(serde_json::to_string(&def.match_by)?),
            severity: Set(def.severity.as_str().to_string()),
            actions_enabled: Set(def.actions_enabled),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am
            .insert(&txn)
            .await
            .map_err(|e| StorageError::from_insert(e, ENTITY, &def.name))?;
        replace_children(&txn, &id, def, &expression).await?;
        txn.commit().await?;

        tracing::info!(tenant_id, id = %id, name = %def.name, "Created alarm definition");
        to_row(model, lists_of(def))
    }

    async fn get(&self, tenant_id: &str, id: &str) -> Result<AlarmDefinitionRow> {
        let model = find_model(self.db(), tenant_id, id).await?;
        let mut actions = load_actions(self.db(), &[model.id.clone()]).await?;
        let lists = actions.remove(&model.id).unwrap_or_default();
        to_row(model, lists)
    }

    async fn list(
        &self,
        tenant_id: &str,
        filter: &AlarmDefinitionFilter,
        offset: Option<&str>,
        limit: u64,
    ) -> Result<Vec<AlarmDefinitionRow>> {
        let mut q = DefEntity::find().filter(DefCol::TenantId.eq(tenant_id));
        if let Some(ref name) = filter.name {
            q = q.filter(DefCol::Name.eq(name.as_str()));
        }
        for (dim, value) in &filter.dimensions {
            q = q.filter(
                DefCol::Id.in_subquery(
                    Query::select()
                        .column(DimCol::AlarmDefinitionId)
                        .from(DimEntity)
                        .and_where(DimCol::DimensionName.eq(dim.as_str()))
                        .and_where(DimCol::Value.eq(value.as_str()))
                        .to_owned(),
                ),
            );
        }
        if let Some(after) = offset {
            q = q.filter(DefCol::Id.gt(after));
        }
        let models = q
            .order_by_asc(DefCol::Id)
            .limit(limit.saturating_add(1))
            .all(self.db())
            .await?;

        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let mut actions = load_actions(self.db(), &ids).await?;
        models
            .into_iter()
            .map(|m| {
                let lists = actions.remove(&m.id).unwrap_or_default();
                to_row(m, lists)
            })
            .collect()
    }

    async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        def: &AlarmDefinitionWrite,
    ) -> Result<AlarmDefinitionRow> {
        let txn = self.db().begin().await?;
        let existing = find_model(&txn, tenant_id, id).await?;
        let row = self.replace_in(&txn, tenant_id, existing, def).await?;
        txn.commit().await?;

        tracing::info!(tenant_id, id, "Updated alarm definition");
        Ok(row)
    }

    async fn patch(
        &self,
        tenant_id: &str,
        id: &str,
        patch: &AlarmDefinitionPatch,
    ) -> Result<AlarmDefinitionRow> {
        let txn = self.db().begin().await?;
        let existing = find_model(&txn, tenant_id, id).await?;
        let mut actions = load_actions(&txn, &[existing.id.clone()]).await?;
        let current = to_row(
            existing.clone(),
            actions.remove(&existing.id).unwrap_or_default(),
        )?;
        let merged = patch.apply_to(current);
        let row = self.replace_in(&txn, tenant_id, existing, &merged).await?;
        txn.commit().await?;

        tracing::info!(tenant_id, id, "Patched alarm definition");
        Ok(row)
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<()> {
        let txn = self.db().begin().await?;
        let res = DefEntity::delete_many()
            .filter(DefCol::Id.eq(id))
            .filter(DefCol::TenantId.eq(tenant_id))
            .exec(&txn)
            .await?;
        if res.rows_affected == 0 {
            return Err(StorageError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            });
        }
        ActionEntity::delete_many()
            .filter(ActionCol::AlarmDefinitionId.eq(id))
            .exec(&txn)
            .await?;
        DimEntity::delete_many()
            .filter(DimCol::AlarmDefinitionId.eq(id))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(tenant_id, id, "Deleted alarm definition");
        Ok(())
    }
}
