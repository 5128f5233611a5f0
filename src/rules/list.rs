use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config;
use crate::database::Entity;
use crate::filter::filter_order::FilterOrder;
use crate::filter::filter_where::{and_where, FilterWhere};
use crate::filter::FilterData;
use crate::pipeline::{ExecutionContext, FieldError, Rule, RuleError};

const MAX_SEARCH_LENGTH: usize = 100;

/// `GET /{resource}` query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub order: Option<String>,
    pub search: Option<String>,
    /// JSON-encoded where clause
    pub filter: Option<String>,
}

impl ListQuery {
    /// A filter that is not valid JSON is kept as a string so the list rule reports it
    pub fn into_request(self) -> ListRequest {
        let where_clause = self
            .filter
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)));
        ListRequest {
            where_clause,
            order: self.order.map(Value::String),
            page: self.page,
            page_size: self.page_size,
            search: self.search,
        }
    }
}

/// Input of every list/find pipeline (`POST /{resource}/find` body)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRequest {
    #[serde(default, rename = "where", alias = "filter")]
    pub where_clause: Option<Value>,
    #[serde(default)]
    pub order: Option<Value>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
}

impl ListRequest {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    /// Requested page size, defaulted and capped at the configured max limit
    pub fn page_size(&self) -> i64 {
        let cfg = config::config();
        let size = self.page_size.unwrap_or(cfg.api.default_page_size as i64);
        match cfg.filter.max_limit {
            Some(max) => size.min(max as i64),
            None => size,
        }
    }

    /// Where clause combining the caller's filter with the search term
    pub fn where_clause(&self, searchable: &[&str]) -> Option<Value> {
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty() && !searchable.is_empty())
            .map(|term| {
                let pattern = format!("%{}%", escape_like(term));
                let any: Vec<Value> = searchable
                    .iter()
                    .map(|column| json!({ *column: { "$ilike": pattern } }))
                    .collect();
                json!({ "$or": any })
            });
        and_where(self.where_clause.clone(), search)
    }

    /// Filter for one page of results
    pub fn to_filter(&self, searchable: &[&str], default_order: &str) -> FilterData {
        let page_size = self.page_size();
        let offset = (self.page() - 1).saturating_mul(page_size);
        FilterData {
            select: None,
            where_clause: self.where_clause(searchable),
            order: Some(self.order.clone().unwrap_or_else(|| Value::String(default_order.to_string()))),
            limit: Some(i32::try_from(page_size).unwrap_or(i32::MAX)),
            offset: Some(i32::try_from(offset).unwrap_or(i32::MAX)),
        }
    }
}

/// One page of a list result
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Paging bounds, where/order shape and column names, checked against `E`
pub struct ValidateListQuery<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E> ValidateListQuery<E> {
    pub fn new() -> Self {
        Self { _entity: PhantomData }
    }
}

/// Escape LIKE wildcards so a search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl<E> Default for ValidateListQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_columns<E: Entity>(field: &str, columns: impl IntoIterator<Item = String>, errors: &mut Vec<FieldError>) {
    for column in columns {
        if !E::COLUMNS.contains(&column.as_str()) {
            errors.push(FieldError::new(field, format!("unknown column '{}'", column)));
        }
    }
}

#[async_trait]
impl<E: Entity> Rule<ListRequest> for ValidateListQuery<E> {
    fn name(&self) -> &str {
        "validate_list_query"
    }

    async fn check(&self, ctx: &mut ExecutionContext<ListRequest>) -> Result<(), RuleError> {
        let req = &ctx.dto;
        let mut errors = Vec::new();

        if req.page.is_some_and(|p| p < 1) {
            errors.push(FieldError::new("page", "must be >= 1"));
        }
        if req.page_size.is_some_and(|s| s < 1) {
            errors.push(FieldError::new("page_size", "must be >= 1"));
        }

        match &req.where_clause {
            None | Some(Value::Null) => {}
            Some(where_clause @ Value::Object(_)) => match FilterWhere::columns(where_clause) {
                Ok(columns) => unknown_columns::<E>("where", columns, &mut errors),
                Err(e) => errors.push(FieldError::new("where", e.to_string())),
            },
            Some(_) => errors.push(FieldError::new("where", "must be a JSON object")),
        }

        if let Some(order) = &req.order {
            match FilterOrder::validate_and_parse(order) {
                Ok(infos) => unknown_columns::<E>("order", infos.into_iter().map(|i| i.column), &mut errors),
                Err(e) => errors.push(FieldError::new("order", e.to_string())),
            }
        }

        if let Some(search) = &req.search {
            if search.chars().count() > MAX_SEARCH_LENGTH {
                errors.push(FieldError::new("search", format!("must be at most {} characters", MAX_SEARCH_LENGTH)));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RuleError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::types::{Actor, Role};
    use std::sync::Arc;

    #[derive(Debug, Serialize, Deserialize)]
    struct Item {
        id: i64,
        title: String,
    }

    impl Entity for Item {
        const TABLE: &'static str = "items";
        const COLUMNS: &'static [&'static str] = &["id", "title"];
        fn id(&self) -> i64 {
            self.id
        }
    }

    async fn check(req: ListRequest) -> Result<(), RuleError> {
        let mut ctx = ExecutionContext::new("t", Actor::new("1", Role::Viewer), Arc::new(MemoryStore::new()), req);
        ValidateListQuery::<Item>::new().check(&mut ctx).await
    }

    #[test]
    fn query_string_converts() {
        let req = ListQuery {
            page: Some(2),
            page_size: Some(5),
            order: Some("title desc".into()),
            search: Some("rust".into()),
            filter: Some(r#"{"id": {"$gt": 3}}"#.into()),
        }
        .into_request();
        assert_eq!(req.where_clause, Some(json!({"id": {"$gt": 3}})));

        let filter = req.to_filter(&["title"], "id asc");
        assert_eq!(filter.limit, Some(5));
        assert_eq!(filter.offset, Some(5));
        assert_eq!(filter.order, Some(json!("title desc")));
        assert_eq!(
            filter.where_clause,
            Some(json!({"$and": [{"id": {"$gt": 3}}, {"$or": [{"title": {"$ilike": "%rust%"}}]}]}))
        );
    }

    #[test]
    fn search_wildcards_match_literally() {
        let req = ListRequest {
            search: Some("50%_off".into()),
            ..Default::default()
        };
        let where_clause = req.where_clause(&["title"]);
        assert_eq!(where_clause, Some(json!({"$or": [{"title": {"$ilike": "%50\\%\\_off%"}}]})));

        let pattern = "%50\\%\\_off%";
        assert!(crate::filter::matcher::like("Sale: 50%_OFF today", pattern, true));
        assert!(!crate::filter::matcher::like("50 percent off", pattern, true));
        assert!(!crate::filter::matcher::like("500 off", pattern, true));
    }

    #[test]
    fn defaults_apply() {
        let filter = ListRequest::default().to_filter(&[], "created_at desc");
        assert_eq!(filter.offset, Some(0));
        assert_eq!(filter.order, Some(json!("created_at desc")));
        assert!(filter.where_clause.is_none());
    }

    #[tokio::test]
    async fn accepts_known_columns() {
        let req = ListRequest {
            where_clause: Some(json!({"title": {"$ilike": "%a%"}})),
            order: Some(json!("id desc")),
            page: Some(1),
            page_size: Some(10),
            search: None,
        };
        assert!(check(req).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_bad_paging_and_columns() {
        let req = ListRequest {
            where_clause: Some(json!({"password": "x"})),
            order: Some(json!("nope asc")),
            page: Some(0),
            page_size: Some(0),
            search: None,
        };
        match check(req).await {
            Err(RuleError::Invalid(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["page", "page_size", "where", "order"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_unparseable_filter() {
        let req = ListQuery {
            filter: Some("{not json".into()),
            ..Default::default()
        }
        .into_request();
        assert!(matches!(check(req).await, Err(RuleError::Invalid(_))));
    }
}
