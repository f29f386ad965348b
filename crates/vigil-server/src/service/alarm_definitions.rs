use std::sync::Arc;
use vigil_common::types::{
    ActionType, CreateAlarmDefinitionRequest, PatchAlarmDefinitionRequest,
    UpdateAlarmDefinitionRequest,
};
use vigil_storage::{
    AlarmDefinitionFilter, AlarmDefinitionPatch, AlarmDefinitionRepo, AlarmDefinitionRow,
    AlarmDefinitionWrite, NotificationMethodRepo,
};

use super::validation::{self, MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
use super::{Page, PageRequest, ServiceError, ServiceResult};
use crate::config::PaginationConfig;

/// Alarm-definition lifecycle: create, list, get, update, patch, delete.
pub struct AlarmDefinitionService {
    definitions: Arc<dyn AlarmDefinitionRepo>,
    methods: Arc<dyn NotificationMethodRepo>,
    pagination: PaginationConfig,
}

/// Action lists as supplied by a request, in `ActionType::ALL` order.
struct SuppliedActions<'a>([(ActionType, Option<&'a Vec<String>>); 3]);

impl<'a> SuppliedActions<'a> {
    fn new(
        alarm: Option<&'a Vec<String>>,
        ok: Option<&'a Vec<String>>,
        undetermined: Option<&'a Vec<String>>,
    ) -> Self {
        Self([
            (ActionType::Alarm, alarm),
            (ActionType::Ok, ok),
            (ActionType::Undetermined, undetermined),
        ])
    }

    fn validate(&self) -> ServiceResult<()> {
        for (action_type, ids) in &self.0 {
            if let Some(ids) = ids {
                validation::action_list(*action_type, ids)?;
            }
        }
        Ok(())
    }

    fn all_ids(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|(_, ids)| *ids)
            .flatten()
            .cloned()
            .collect()
    }
}

impl AlarmDefinitionService {
    pub fn new(
        definitions: Arc<dyn AlarmDefinitionRepo>,
        methods: Arc<dyn NotificationMethodRepo>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            definitions,
            methods,
            pagination,
        }
    }

    /// Every referenced notification method must exist for the tenant.
    async fn check_references(&self, tenant_id: &str, actions: &SuppliedActions<'_>) -> ServiceResult<()> {
        let ids = actions.all_ids();
        let missing = self.methods.find_missing(tenant_id, &ids).await?;
        match missing.into_iter().next() {
            Some(id) => Err(ServiceError::InvalidActionReference(id)),
            None => Ok(()),
        }
    }

    fn check_match_by(current: &AlarmDefinitionRow, supplied: Option<&Vec<String>>) -> ServiceResult<()> {
        match supplied {
            Some(m) if *m != current.match_by => Err(ServiceError::Unprocessable(format!(
                "match_by cannot change (current: {:?})",
                current.match_by
            ))),
            _ => Ok(()),
        }
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        req: CreateAlarmDefinitionRequest,
    ) -> ServiceResult<AlarmDefinitionRow> {
        validation::bounded("name", &req.name, MAX_NAME_LEN)?;
        let description = req.description.unwrap_or_default();
        validation::at_most("description", &description, MAX_DESCRIPTION_LEN)?;
        let match_by = req.match_by.unwrap_or_default();
        validation::match_by(&match_by)?;
        let actions = SuppliedActions::new(
            req.alarm_actions.as_ref(),
            req.ok_actions.as_ref(),
            req.undetermined_actions.as_ref(),
        );
        actions.validate()?;
        let severity = validation::severity(req.severity.as_deref())?;
        validation::expression(&req.expression)?;

        self.check_references(tenant_id, &actions).await?;

        let write = AlarmDefinitionWrite {
            name: req.name,
            description,
            expression: req.expression,
            match_by,
            severity,
            actions_enabled: req.actions_enabled.unwrap_or(true),
            alarm_actions: req.alarm_actions.unwrap_or_default(),
            ok_actions: req.ok_actions.unwrap_or_default(),
            undetermined_actions: req.undetermined_actions.unwrap_or_default(),
        };
        Ok(self.definitions.create(tenant_id, &write).await?)
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> ServiceResult<AlarmDefinitionRow> {
        Ok(self.definitions.get(tenant_id, id).await?)
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        name: Option<&str>,
        dimensions: &[String],
        page: &PageRequest,
    ) -> ServiceResult<Page<AlarmDefinitionRow>> {
        let limit = page.resolve_limit(&self.pagination)?;
        // 重复的 dimensions 参数合并为一个过滤条件
        let mut pairs = Vec::new();
        for raw in dimensions.iter().filter(|raw| !raw.is_empty()) {
            pairs.extend(validation::dimension_filter(raw)?);
        }
        let filter = AlarmDefinitionFilter {
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
            dimensions: pairs,
        };
        let rows = self
            .definitions
            .list(tenant_id, &filter, page.offset(), limit)
            .await?;
        Ok(Page::from_probe(rows, limit, |r| r.id.as_str()))
    }

    /// Full replace. Omitted optional fields reset to their create defaults;
    /// `match_by` keeps the stored value and may not be changed.
    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        req: UpdateAlarmDefinitionRequest,
    ) -> ServiceResult<AlarmDefinitionRow> {
        validation::bounded("name", &req.name, MAX_NAME_LEN)?;
        let description = req.description.unwrap_or_default();
        validation::at_most("description", &description, MAX_DESCRIPTION_LEN)?;
        let actions = SuppliedActions::new(
            req.alarm_actions.as_ref(),
            req.ok_actions.as_ref(),
            req.undetermined_actions.as_ref(),
        );
        actions.validate()?;
        let severity = validation::severity(req.severity.as_deref())?;
        validation::expression(&req.expression)?;

        let current = self.definitions.get(tenant_id, id).await?;
        Self::check_match_by(&current, req.match_by.as_ref())?;
        self.check_references(tenant_id, &actions).await?;

        let write = AlarmDefinitionWrite {
            name: req.name,
            description,
            expression: req.expression,
            match_by: current.match_by,
            severity,
            actions_enabled: req.actions_enabled,
            alarm_actions: req.alarm_actions.unwrap_or_default(),
            ok_actions: req.ok_actions.unwrap_or_default(),
            undetermined_actions: req.undetermined_actions.unwrap_or_default(),
        };
        Ok(self.definitions.update(tenant_id, id, &write).await?)
    }

    /// Partial merge: only supplied fields change.
    pub async fn patch(
        &self,
        tenant_id: &str,
        id: &str,
        req: PatchAlarmDefinitionRequest,
    ) -> ServiceResult<AlarmDefinitionRow> {
        if let Some(ref name) = req.name {
            validation::bounded("name", name, MAX_NAME_LEN)?;
        }
        if let Some(ref description) = req.description {
            validation::at_most("description", description, MAX_DESCRIPTION_LEN)?;
        }
        if let Some(ref expression) = req.expression {
            validation::expression(expression)?;
        }
        let severity = match req.severity {
            Some(ref s) => Some(validation::severity(Some(s))?),
            None => None,
        };
        let actions = SuppliedActions::new(
            req.alarm_actions.as_ref(),
            req.ok_actions.as_ref(),
            req.undetermined_actions.as_ref(),
        );
        actions.validate()?;

        let current = self.definitions.get(tenant_id, id).await?;
        Self::check_match_by(&current, req.match_by.as_ref())?;
        self.check_references(tenant_id, &actions).await?;

        let patch = AlarmDefinitionPatch {
            name: req.name,
            description: req.description,
            expression: req.expression,
            severity,
            actions_enabled: req.actions_enabled,
            alarm_actions: req.alarm_actions,
            ok_actions: req.ok_actions,
            undetermined_actions: req.undetermined_actions,
        };
        Ok(self.definitions.patch(tenant_id, id, &patch).await?)
    }

    pub async fn delete(&self, tenant_id: &str, id: &str) -> ServiceResult<()> {
        Ok(self.definitions.delete(tenant_id, id).await?)
    }
}
