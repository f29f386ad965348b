use serde::{Deserialize, Serialize};

/// Alarm definition severity, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use vigil_common::types::Severity;
///
/// let sev: Severity = "medium".parse().unwrap();
/// assert_eq!(sev, Severity::Medium);
/// assert_eq!(sev.to_string(), "MEDIUM");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(format!(
                "{s} is not one of [LOW, MEDIUM, HIGH, CRITICAL]"
            )),
        }
    }
}

/// Delivery endpoint kind of a notification method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationMethodType {
    Email,
    Webhook,
    Pagerduty,
}

impl NotificationMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationMethodType::Email => "EMAIL",
            NotificationMethodType::Webhook => "WEBHOOK",
            NotificationMethodType::Pagerduty => "PAGERDUTY",
        }
    }
}

impl std::fmt::Display for NotificationMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationMethodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EMAIL" => Ok(NotificationMethodType::Email),
            "WEBHOOK" => Ok(NotificationMethodType::Webhook),
            "PAGERDUTY" => Ok(NotificationMethodType::Pagerduty),
            _ => Err(format!("{s} is not one of [EMAIL, WEBHOOK, PAGERDUTY]")),
        }
    }
}

/// Alarm state transition an action list is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Alarm,
    Ok,
    Undetermined,
}

impl ActionType {
    pub const ALL: [ActionType; 3] = [ActionType::Alarm, ActionType::Ok, ActionType::Undetermined];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Alarm => "ALARM",
            ActionType::Ok => "OK",
            ActionType::Undetermined => "UNDETERMINED",
        }
    }

    /// Request/response field name carrying this action list.
    pub fn field_name(&self) -> &'static str {
        match self {
            ActionType::Alarm => "alarm_actions",
            ActionType::Ok => "ok_actions",
            ActionType::Undetermined => "undetermined_actions",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALARM" => Ok(ActionType::Alarm),
            "OK" => Ok(ActionType::Ok),
            "UNDETERMINED" => Ok(ActionType::Undetermined),
            _ => Err(format!("unknown action type: {s}")),
        }
    }
}

// ---- Alarm definition payloads ----

/// 创建告警定义请求
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateAlarmDefinitionRequest {
    /// 告警定义名称（租户内唯一）
    pub name: String,
    /// 描述（默认空字符串）
    #[serde(default)]
    pub description: Option<String>,
    /// 阈值表达式，例如 `max(cpu.system_perc) > 0`
    pub expression: String,
    /// 子告警分组维度（创建后不可修改）
    #[serde(default)]
    pub match_by: Option<Vec<String>>,
    /// 告警级别（LOW / MEDIUM / HIGH / CRITICAL，默认 LOW）
    #[serde(default)]
    pub severity: Option<String>,
    /// 是否启用通知动作（默认 true）
    #[serde(default)]
    pub actions_enabled: Option<bool>,
    /// 进入 ALARM 状态时触发的通知方式 ID
    #[serde(default)]
    pub alarm_actions: Option<Vec<String>>,
    /// 进入 OK 状态时触发的通知方式 ID
    #[serde(default)]
    pub ok_actions: Option<Vec<String>>,
    /// 进入 UNDETERMINED 状态时触发的通知方式 ID
    #[serde(default)]
    pub undetermined_actions: Option<Vec<String>>,
}

/// 全量更新告警定义请求（PUT）
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdateAlarmDefinitionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub expression: String,
    /// 省略时沿用原值；提供时必须与原值一致
    #[serde(default)]
    pub match_by: Option<Vec<String>>,
    #[serde(default)]
    pub severity: Option<String>,
    pub actions_enabled: bool,
    #[serde(default)]
    pub alarm_actions: Option<Vec<String>>,
    #[serde(default)]
    pub ok_actions: Option<Vec<String>>,
    #[serde(default)]
    pub undetermined_actions: Option<Vec<String>>,
}

/// 部分更新告警定义请求（PATCH），仅修改提供的字段
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PatchAlarmDefinitionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub match_by: Option<Vec<String>>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub actions_enabled: Option<bool>,
    #[serde(default)]
    pub alarm_actions: Option<Vec<String>>,
    #[serde(default)]
    pub ok_actions: Option<Vec<String>>,
    #[serde(default)]
    pub undetermined_actions: Option<Vec<String>>,
}

// ---- Notification method payloads ----

/// 创建/更新通知方式请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NotificationMethodRequest {
    /// 名称（租户内唯一）
    pub name: String,
    /// 类型（EMAIL / WEBHOOK / PAGERDUTY）
    #[serde(rename = "type")]
    pub method_type: String,
    /// 投递地址（邮箱、URL 或 PagerDuty 集成 key）
    pub address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parse_is_case_insensitive() {
        assert_eq!("low".parse::<Severity>().unwrap(), Severity::Low);
        assert_eq!("Critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("INVALID".parse::<Severity>().is_err());
        assert_eq!(Severity::default(), Severity::Low);
    }

    #[test]
    fn severity_serializes_upper_case() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }

    #[test]
    fn action_type_round_trips_through_str() {
        for t in ActionType::ALL {
            assert_eq!(t.as_str().parse::<ActionType>().unwrap(), t);
        }
        assert!("alarm".parse::<ActionType>().is_err());
    }

    #[test]
    fn notification_type_rejects_unknown() {
        assert_eq!(
            "webhook".parse::<NotificationMethodType>().unwrap(),
            NotificationMethodType::Webhook
        );
        let err = "SMS".parse::<NotificationMethodType>().unwrap_err();
        assert!(err.contains("EMAIL"));
    }

    #[test]
    fn notification_request_uses_type_key() {
        let req: NotificationMethodRequest = serde_json::from_str(
            r#"{"name":"ops","type":"EMAIL","address":"ops@example.com"}"#,
        )
        .unwrap();
        assert_eq!(req.method_type, "EMAIL");
    }
}
