use std::sync::Arc;
use vigil_common::types::NotificationMethodRequest;
use vigil_storage::{NotificationMethodRepo, NotificationMethodRow};

use super::validation;
use super::{Page, PageRequest, ServiceError, ServiceResult};
use crate::config::PaginationConfig;

pub struct NotificationMethodService {
    methods: Arc<dyn NotificationMethodRepo>,
    pagination: PaginationConfig,
}

impl NotificationMethodService {
    pub fn new(methods: Arc<dyn NotificationMethodRepo>, pagination: PaginationConfig) -> Self {
        Self {
            methods,
            pagination,
        }
    }

    pub async fn create(
        &self,
        tenant_id: &str,
        req: NotificationMethodRequest,
    ) -> ServiceResult<NotificationMethodRow> {
        let kind = validation::notification_method(&req.name, &req.method_type, &req.address)?;
        if self.methods.find_by_name(tenant_id, &req.name).await?.is_some() {
            return Err(ServiceError::AlreadyExists {
                entity: "notification_method",
                name: req.name,
            });
        }
        let id = self
            .methods
            .create(tenant_id, &req.name, kind, &req.address)
            .await?;
        Ok(self.methods.get(tenant_id, &id).await?)
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> ServiceResult<NotificationMethodRow> {
        Ok(self.methods.get(tenant_id, id).await?)
    }

    pub async fn list(
        &self,
        tenant_id: &str,
        page: &PageRequest,
    ) -> ServiceResult<Page<NotificationMethodRow>> {
        let limit = page.resolve_limit(&self.pagination)?;
        let rows = self.methods.list(tenant_id, page.offset(), limit).await?;
        Ok(Page::from_probe(rows, limit, |r| r.id.as_str()))
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: &str,
        req: NotificationMethodRequest,
    ) -> ServiceResult<NotificationMethodRow> {
        let kind = validation::notification_method(&req.name, &req.method_type, &req.address)?;
        Ok(self
            .methods
            .update(id, tenant_id, &req.name, kind, &req.address)
            .await?)
    }

    pub async fn delete(&self, tenant_id: &str, id: &str) -> ServiceResult<()> {
        Ok(self.methods.delete(tenant_id, id).await?)
    }
}
