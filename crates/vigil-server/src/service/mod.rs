//! Transport-independent business rules for alarm definitions and
//! notification methods.
//!
//! Services validate every request before touching storage, resolve
//! cross-entity references, and translate typed [`StorageError`]s into the
//! [`ServiceError`] taxonomy the HTTP layer maps onto status codes.

pub mod alarm_definitions;
pub mod notification_methods;
pub mod validation;

pub use alarm_definitions::AlarmDefinitionService;
pub use notification_methods::NotificationMethodService;

use vigil_storage::StorageError;

use crate::config::PaginationConfig;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or out-of-bound input, rejected before any store access.
    #[error("{0}")]
    Validation(String),

    /// Well-formed input that violates a business rule.
    #[error("{0}")]
    Unprocessable(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} named '{name}' already exists")]
    AlreadyExists { entity: &'static str, name: String },

    #[error("notification method '{0}' does not exist")]
    InvalidActionReference(String),

    #[error("storage failure: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            StorageError::AlreadyExists { entity, name } => {
                ServiceError::AlreadyExists { entity, name }
            }
            StorageError::InvalidActionReference { id } => ServiceError::InvalidActionReference(id),
            StorageError::Expression(e) => ServiceError::Unprocessable(format!("expression: {e}")),
            other => ServiceError::Storage(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Cursor pagination input: `offset` is the last ID seen, not a row count.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub offset: Option<String>,
    pub limit: Option<u64>,
}

impl PageRequest {
    /// Resolves the effective limit: default when absent, capped at the
    /// configured maximum, zero rejected.
    pub fn resolve_limit(&self, config: &PaginationConfig) -> ServiceResult<u64> {
        match self.limit {
            None => Ok(config.default_limit),
            Some(0) => Err(ServiceError::Validation(
                "limit must be greater than 0".to_string(),
            )),
            Some(n) => Ok(n.min(config.max_limit)),
        }
    }

    pub fn offset(&self) -> Option<&str> {
        self.offset.as_deref().filter(|o| !o.is_empty())
    }
}

/// One page of results plus the cursor for the next page, if any.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub elements: Vec<T>,
    pub limit: u64,
    pub next_offset: Option<String>,
}

impl<T> Page<T> {
    /// Builds a page from a store result that fetched `limit + 1` rows.
    pub fn from_probe(mut rows: Vec<T>, limit: u64, id_of: impl Fn(&T) -> &str) -> Self {
        let has_more = rows.len() as u64 > limit;
        rows.truncate(limit as usize);
        let next_offset = if has_more {
            rows.last().map(|r| id_of(r).to_string())
        } else {
            None
        };
        Self {
            elements: rows,
            limit,
            next_offset,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_offset.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig {
            default_limit: 20,
            max_limit: 100,
        }
    }

    #[test]
    fn limit_defaults_caps_and_rejects_zero() {
        let cfg = config();
        assert_eq!(PageRequest::default().resolve_limit(&cfg).unwrap(), 20);
        let big = PageRequest {
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(big.resolve_limit(&cfg).unwrap(), 100);
        let zero = PageRequest {
            limit: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            zero.resolve_limit(&cfg),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn empty_offset_means_first_page() {
        let req = PageRequest {
            offset: Some(String::new()),
            limit: None,
        };
        assert_eq!(req.offset(), None);
    }

    #[test]
    fn probe_row_sets_next_offset() {
        let rows = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let page = Page::from_probe(rows, 2, |s| s.as_str());
        assert_eq!(page.elements, vec!["1", "2"]);
        assert_eq!(page.next_offset.as_deref(), Some("2"));

        let last = Page::from_probe(vec!["4".to_string()], 2, |s| s.as_str());
        assert!(!last.has_more());
    }

    #[test]
    fn storage_errors_translate() {
        let err: ServiceError = StorageError::InvalidActionReference { id: "x".into() }.into();
        assert!(matches!(err, ServiceError::InvalidActionReference(ref id) if id == "x"));

        let err: ServiceError = StorageError::UnexpectedColumnValue {
            column: "severity",
            value: "LOUD".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::Storage(_)));
    }
}
