use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::IntoParams;
use utoipa::ToSchema;

use crate::api::Link;
use crate::service::{Page, PageRequest};

/// 游标分页参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CursorParams {
    /// 上一页最后一条记录的 ID（为空时从头开始）
    #[param(required = false)]
    #[serde(default)]
    pub offset: Option<String>,
    /// 每页条数（默认 20，最大 1000）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    Number(u64),
    Text(String),
}

pub(crate) fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<U64Input>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(U64Input::Number(number)) => Ok(Some(number)),
        Some(U64Input::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(U64Input::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

impl CursorParams {
    pub fn page_request(&self) -> PageRequest {
        PageRequest {
            offset: self.offset.clone(),
            limit: self.limit,
        }
    }
}

/// `self` link for the request as received, plus `next` when more rows exist.
///
/// The next link keeps every other query parameter verbatim and replaces
/// `offset`/`limit`.
pub fn list_links<T>(path: &str, query: Option<&str>, page: &Page<T>) -> Vec<Link> {
    let mut links = vec![Link::self_link(match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_string(),
    })];
    if let Some(ref next_offset) = page.next_offset {
        let mut params: Vec<&str> = query
            .unwrap_or("")
            .split('&')
            .filter(|p| !p.is_empty())
            .filter(|p| {
                let key = p.split('=').next().unwrap_or("");
                key != "offset" && key != "limit"
            })
            .collect();
        let offset = format!("offset={next_offset}");
        let limit = format!("limit={}", page.limit);
        params.push(&offset);
        params.push(&limit);
        links.push(Link::next(format!("{path}?{}", params.join("&"))));
    }
    links
}
