use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 按依赖顺序建表
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS notification_methods (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    address TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (tenant_id, name)
);
CREATE INDEX IF NOT EXISTS idx_notification_methods_tenant ON notification_methods(tenant_id, id);

CREATE TABLE IF NOT EXISTS alarm_definitions (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    expression TEXT NOT NULL,
    match_by TEXT NOT NULL DEFAULT '[]',
    severity TEXT NOT NULL DEFAULT 'LOW',
    actions_enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (tenant_id, name)
);
CREATE INDEX IF NOT EXISTS idx_alarm_definitions_tenant ON alarm_definitions(tenant_id, id);

CREATE TABLE IF NOT EXISTS alarm_actions (
    alarm_definition_id TEXT NOT NULL,
    action_type TEXT NOT NULL,
    notification_method_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (alarm_definition_id, action_type, position),
    UNIQUE (alarm_definition_id, action_type, notification_method_id)
);
CREATE INDEX IF NOT EXISTS idx_alarm_actions_method ON alarm_actions(notification_method_id);

CREATE TABLE IF NOT EXISTS alarm_definition_dimensions (
    alarm_definition_id TEXT NOT NULL,
    dimension_name TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (alarm_definition_id, dimension_name, value)
);
CREATE INDEX IF NOT EXISTS idx_alarm_definition_dimensions_pair ON alarm_definition_dimensions(dimension_name, value);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS alarm_definition_dimensions;
DROP TABLE IF EXISTS alarm_actions;
DROP TABLE IF EXISTS alarm_definitions;
DROP TABLE IF EXISTS notification_methods;
";
