//! Field-level request checks shared by the services.

use std::collections::HashSet;
use vigil_common::expression::AlarmExpression;
use vigil_common::types::{ActionType, NotificationMethodType, Severity};

use super::{ServiceError, ServiceResult};

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MAX_ACTION_ID_LEN: usize = 50;
pub const MAX_METHOD_NAME_LEN: usize = 250;
pub const MAX_ADDRESS_LEN: usize = 512;

fn invalid(msg: impl Into<String>) -> ServiceError {
    ServiceError::Validation(msg.into())
}

/// Non-empty and at most `max` characters.
pub fn bounded(field: &str, value: &str, max: usize) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    at_most(field, value, max)
}

pub fn at_most(field: &str, value: &str, max: usize) -> ServiceResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(invalid(format!(
            "{field} must be at most {max} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn expression(text: &str) -> ServiceResult<AlarmExpression> {
    if text.trim().is_empty() {
        return Err(invalid("expression must not be empty"));
    }
    AlarmExpression::parse(text)
        .map_err(|e| ServiceError::Unprocessable(format!("expression: {e}")))
}

pub fn severity(value: Option<&str>) -> ServiceResult<Severity> {
    match value {
        None => Ok(Severity::default()),
        Some(s) => s
            .parse()
            .map_err(|e: String| ServiceError::Unprocessable(format!("severity: {e}"))),
    }
}

pub fn match_by(dimensions: &[String]) -> ServiceResult<()> {
    if dimensions.iter().any(|d| d.trim().is_empty()) {
        return Err(invalid("match_by entries must not be empty"));
    }
    Ok(())
}

/// Entry length and duplicates within one action list.
pub fn action_list(action_type: ActionType, ids: &[String]) -> ServiceResult<()> {
    let field = action_type.field_name();
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        bounded(field, id, MAX_ACTION_ID_LEN)?;
        if !seen.insert(id.as_str()) {
            return Err(invalid(format!("{field} contains '{id}' more than once")));
        }
    }
    Ok(())
}

/// Parses a `key:value[,key:value...]` list filter.
pub fn dimension_filter(raw: &str) -> ServiceResult<Vec<(String, String)>> {
    raw.split(',')
        .map(|entry| {
            let mut parts = entry.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(k), Some(v), None) if !k.trim().is_empty() && !v.trim().is_empty() => {
                    Ok((k.trim().to_string(), v.trim().to_string()))
                }
                _ => Err(invalid(format!(
                    "dimensions: '{entry}' is not of the form key:value"
                ))),
            }
        })
        .collect()
}

pub fn notification_method(
    name: &str,
    method_type: &str,
    address: &str,
) -> ServiceResult<NotificationMethodType> {
    bounded("name", name, MAX_METHOD_NAME_LEN)?;
    bounded("address", address, MAX_ADDRESS_LEN)?;
    let kind: NotificationMethodType = method_type
        .parse()
        .map_err(|e: String| invalid(format!("type: {e}")))?;
    match kind {
        NotificationMethodType::Email => {
            let valid = address
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
            if !valid {
                return Err(invalid(format!("address: '{address}' is not an email address")));
            }
        }
        NotificationMethodType::Webhook => {
            if !(address.starts_with("http://") || address.starts_with("https://")) {
                return Err(invalid(format!(
                    "address: '{address}' must be an http or https URL"
                )));
            }
        }
        NotificationMethodType::Pagerduty => {}
    }
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_count_chars_not_bytes() {
        assert!(bounded("name", &"告".repeat(255), MAX_NAME_LEN).is_ok());
        assert!(bounded("name", &"a".repeat(256), MAX_NAME_LEN).is_err());
        assert!(bounded("name", "   ", MAX_NAME_LEN).is_err());
        assert!(at_most("description", "", MAX_DESCRIPTION_LEN).is_ok());
    }

    #[test]
    fn bad_expression_is_unprocessable() {
        assert!(expression("max(cpu.system_perc) > 0").is_ok());
        assert!(matches!(
            expression(r"avg(mem_total_mb{dev=\usr\local\bin}) gt 0"),
            Err(ServiceError::Unprocessable(_))
        ));
        assert!(matches!(expression(""), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn severity_defaults_to_low() {
        assert_eq!(severity(None).unwrap(), Severity::Low);
        assert_eq!(severity(Some("high")).unwrap(), Severity::High);
        assert!(matches!(
            severity(Some("urgent")),
            Err(ServiceError::Unprocessable(_))
        ));
    }

    #[test]
    fn action_list_rejects_long_and_duplicate_ids() {
        let ok = vec!["1".to_string(), "2".to_string()];
        assert!(action_list(ActionType::Alarm, &ok).is_ok());

        let long = vec!["x".repeat(51)];
        assert!(action_list(ActionType::Ok, &long).is_err());

        let dup = vec!["1".to_string(), "1".to_string()];
        let err = action_list(ActionType::Undetermined, &dup).unwrap_err();
        assert!(err.to_string().contains("undetermined_actions"));
    }

    #[test]
    fn dimension_filter_syntax() {
        assert_eq!(
            dimension_filter("hostname:web01,service:nginx").unwrap(),
            vec![
                ("hostname".to_string(), "web01".to_string()),
                ("service".to_string(), "nginx".to_string()),
            ]
        );
        assert!(dimension_filter("hostname").is_err());
        assert!(dimension_filter("hostname:").is_err());
        assert!(dimension_filter(":web01").is_err());
        assert!(dimension_filter("url:http://x").is_err());
    }

    #[test]
    fn notification_address_rules() {
        assert_eq!(
            notification_method("ops", "email", "root@localhost").unwrap(),
            NotificationMethodType::Email
        );
        assert!(notification_method("ops", "EMAIL", "not-an-email").is_err());
        assert!(notification_method("hook", "WEBHOOK", "ftp://x").is_err());
        assert!(notification_method("pd", "PAGERDUTY", "abc123").is_ok());
        assert!(notification_method("x", "SMS", "123").is_err());
        assert!(notification_method("x", "EMAIL", &format!("{}@x", "a".repeat(512))).is_err());
    }
}
