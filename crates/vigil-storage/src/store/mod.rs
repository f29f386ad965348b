use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;
use vigil_common::id::IdGenerator;

use crate::error::Result;

pub mod alarm_definition;
pub mod notification;

// ---- 公开 Row 类型（从各子模块重新导出）----
pub use alarm_definition::{
    AlarmDefinitionFilter, AlarmDefinitionPatch, AlarmDefinitionRow, AlarmDefinitionWrite,
};
pub use notification::NotificationMethodRow;

/// 告警定义与通知方式的统一访问层。
///
/// 所有方法均为 `async fn`，底层使用 SeaORM；具体数据库由连接 URL 决定。
pub struct SqlStore {
    pub(crate) db: DatabaseConnection,
    pub(crate) ids: IdGenerator,
}

impl SqlStore {
    /// 连接并初始化数据库。
    ///
    /// - `db_url`：完整的数据库连接 URL，例如 `sqlite://data/vigil.db?mode=rwc`
    /// - `data_dir`：本地数据目录，SQLite 数据库文件所在位置
    ///
    /// 自动运行 `sea-orm-migration` 迁移，确保 Schema 最新。
    pub async fn new(db_url: &str, data_dir: &Path, ids: IdGenerator) -> Result<Self> {
        if db_url.starts_with("sqlite://") {
            std::fs::create_dir_all(data_dir).map_err(|e| {
                sea_orm::DbErr::Custom(format!(
                    "failed to create data dir {}: {e}",
                    data_dir.display()
                ))
            })?;
        }
        let db = Database::connect(db_url).await?;

        // WAL 模式仅对 SQLite 有效
        if db_url.starts_with("sqlite://") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;

        tracing::info!(db_url = %db_url, "Initialized store (SeaORM)");
        Ok(Self { db, ids })
    }

    /// 返回底层数据库连接引用（供子模块使用）。
    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
