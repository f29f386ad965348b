use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub id: IdConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            bind_address: default_bind_address(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            pagination: PaginationConfig::default(),
            id: IdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 完整连接 URL；为空时使用 `data_dir` 下的 SQLite 文件
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            data_dir: default_data_dir(),
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match self.url {
            Some(ref url) if !url.trim().is_empty() => url.clone(),
            _ => format!("sqlite://{}/vigil.db?mode=rwc", self.data_dir),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: u64,
    #[serde(default = "default_max_page_limit")]
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_page_limit(),
        }
    }
}

/// Snowflake 节点配置，多实例部署时每个实例需唯一
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_snowflake_part")]
    pub machine_id: i32,
    #[serde(default = "default_snowflake_part")]
    pub node_id: i32,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            machine_id: default_snowflake_part(),
            node_id: default_snowflake_part(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_page_limit() -> u64 {
    20
}

fn default_max_page_limit() -> u64 {
    1000
}

fn default_snowflake_part() -> i32 {
    1
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::warn!(path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        let p = &self.pagination;
        if p.default_limit == 0 || p.max_limit == 0 {
            anyhow::bail!("pagination limits must be positive");
        }
        if p.default_limit > p.max_limit {
            anyhow::bail!(
                "pagination.default_limit ({}) exceeds pagination.max_limit ({})",
                p.default_limit,
                p.max_limit
            );
        }
        for (field, v) in [("id.machine_id", self.id.machine_id), ("id.node_id", self.id.node_id)] {
            if !(0..=31).contains(&v) {
                anyhow::bail!("{field} must be within 0..=31, got {v}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.pagination.default_limit, 20);
        assert_eq!(config.pagination.max_limit, 1000);
        assert_eq!(
            config.database.connection_url(),
            "sqlite://data/vigil.db?mode=rwc"
        );
    }

    #[test]
    fn explicit_database_url_wins() {
        let config: ServerConfig = toml::from_str(
            r#"
            [database]
            url = "sqlite:///var/lib/vigil/api.db?mode=rwc"
            data_dir = "/var/lib/vigil"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database.connection_url(),
            "sqlite:///var/lib/vigil/api.db?mode=rwc"
        );
    }

    #[test]
    fn load_rejects_inverted_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "[pagination]\ndefault_limit = 50\nmax_limit = 10\n").unwrap();
        let err = ServerConfig::load(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = ServerConfig::load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(config.http_port, 8080);
    }
}
