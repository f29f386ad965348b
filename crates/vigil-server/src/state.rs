use crate::config::ServerConfig;
use crate::service::alarm_definitions::AlarmDefinitionService;
use crate::service::notification_methods::NotificationMethodService;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use vigil_common::id::IdGenerator;
use vigil_storage::{AlarmDefinitionRepo, NotificationMethodRepo, SqlStore};

#[derive(Clone)]
pub struct AppState {
    pub alarm_definitions: Arc<AlarmDefinitionService>,
    pub notification_methods: Arc<NotificationMethodService>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        definitions: Arc<dyn AlarmDefinitionRepo>,
        methods: Arc<dyn NotificationMethodRepo>,
    ) -> Self {
        let pagination = config.pagination;
        Self {
            alarm_definitions: Arc::new(AlarmDefinitionService::new(
                definitions,
                methods.clone(),
                pagination,
            )),
            notification_methods: Arc::new(NotificationMethodService::new(methods, pagination)),
            start_time: Utc::now(),
            config: Arc::new(config),
        }
    }

    /// Opens the configured database, runs migrations and wires both
    /// services to the same store.
    pub async fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let ids = IdGenerator::new(config.id.machine_id, config.id.node_id);
        let store = Arc::new(
            SqlStore::new(
                &config.database.connection_url(),
                Path::new(&config.database.data_dir),
                ids,
            )
            .await?,
        );
        Ok(Self::new(config, store.clone(), store))
    }
}
