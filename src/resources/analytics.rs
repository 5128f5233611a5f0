use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::database::{Bucket, Entity, Store};
use crate::filter::FilterData;
use crate::pipeline::{ExecutionContext, FnRule, Pipeline, RuleError};
use crate::resources::categories::Category;
use crate::resources::large_table::LargeTableRow;
use crate::resources::pokemon::Pokemon;
use crate::resources::posts::Post;
use crate::resources::profiles::Profile;
use crate::resources::users::User;
use crate::rules::Authorize;
use crate::types::{Action, Actor, Resource};

/// `GET /analytics` query string; both bounds inclusive and optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AnalyticsQuery {
    fn recorded_at_filter(&self) -> FilterData {
        let mut range = Map::new();
        if let Some(from) = self.from {
            range.insert("$gte".to_string(), json!(from.to_rfc3339_opts(SecondsFormat::Micros, true)));
        }
        if let Some(to) = self.to {
            range.insert("$lte".to_string(), json!(to.to_rfc3339_opts(SecondsFormat::Micros, true)));
        }
        if range.is_empty() {
            FilterData::default()
        } else {
            FilterData {
                where_clause: Some(json!({ "recorded_at": range })),
                ..Default::default()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordCounts {
    pub users: i64,
    pub posts: i64,
    pub published_posts: i64,
    pub categories: i64,
    pub pokemon: i64,
    pub profiles: i64,
    pub large_table: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub rows: i64,
    pub total_revenue: f64,
    pub total_quantity: f64,
    pub average_order_value: f64,
    pub by_region: Vec<Bucket>,
    pub by_status: Vec<Bucket>,
    pub by_category: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub counts: RecordCounts,
    pub sales: SalesSummary,
}

pub struct AnalyticsService {
    summary: Pipeline<AnalyticsQuery, AnalyticsSummary>,
}

fn valid_range(ctx: &ExecutionContext<AnalyticsQuery>) -> Result<(), RuleError> {
    match (ctx.dto.from, ctx.dto.to) {
        (Some(from), Some(to)) if from > to => Err(RuleError::invalid("from", "must not be after 'to'")),
        _ => Ok(()),
    }
}

async fn count_all<E: Entity>(store: &Arc<dyn Store>) -> Result<i64, RuleError> {
    Ok(store.count(E::TABLE, FilterData::default()).await?)
}

async fn summarize(ctx: ExecutionContext<AnalyticsQuery>) -> Result<AnalyticsSummary, RuleError> {
    let store = &ctx.store;

    let counts = RecordCounts {
        users: count_all::<User>(store).await?,
        posts: count_all::<Post>(store).await?,
        published_posts: store.count(Post::TABLE, FilterData::eq("published", true)).await?,
        categories: count_all::<Category>(store).await?,
        pokemon: count_all::<Pokemon>(store).await?,
        profiles: count_all::<Profile>(store).await?,
        large_table: count_all::<LargeTableRow>(store).await?,
    };

    let table = LargeTableRow::TABLE;
    let range = ctx.dto.recorded_at_filter();
    let by_region = store.aggregate(table, range.clone(), "region", "revenue").await?;
    let by_status = store.aggregate(table, range.clone(), "status", "revenue").await?;
    let by_category = store.aggregate(table, range.clone(), "category", "revenue").await?;
    let quantities = store.aggregate(table, range, "status", "quantity").await?;

    let rows: i64 = by_region.iter().map(|b| b.count).sum();
    let total_revenue: f64 = by_region.iter().map(|b| b.total).sum();
    let total_quantity: f64 = quantities.iter().map(|b| b.total).sum();
    let average_order_value = if rows > 0 { total_revenue / rows as f64 } else { 0.0 };

    Ok(AnalyticsSummary {
        from: ctx.dto.from,
        to: ctx.dto.to,
        counts,
        sales: SalesSummary {
            rows,
            total_revenue,
            total_quantity,
            average_order_value,
            by_region,
            by_status,
            by_category,
        },
    })
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let summary = Pipeline::builder("analytics.summary", store)
            .rule(Authorize::new(Resource::Analytics, Action::Read))
            .rule(FnRule::new("valid_range", valid_range))
            .execution(summarize);
        Self { summary }
    }

    pub async fn summary(&self, actor: Actor, query: AnalyticsQuery) -> Result<AnalyticsSummary, RuleError> {
        self.summary.execute(actor, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::crud::CrudService;
    use crate::resources::large_table::{CreateLargeTableRow, SaleStatus};
    use crate::testing::TestContext;
    use crate::types::Role;
    use chrono::TimeZone;

    fn sale(region: &str, quantity: i64, unit_price: f64, status: SaleStatus, day: u32) -> CreateLargeTableRow {
        CreateLargeTableRow {
            region: region.into(),
            product: "widget".into(),
            category: "tools".into(),
            quantity,
            unit_price,
            status,
            recorded_at: Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()),
        }
    }

    async fn seeded() -> TestContext {
        let t = TestContext::new();
        for input in [
            sale("north", 2, 10.0, SaleStatus::Completed, 1),
            sale("south", 1, 5.0, SaleStatus::Pending, 2),
            sale("north", 3, 1.0, SaleStatus::Cancelled, 20),
        ] {
            t.services.large_table.create(TestContext::admin(), input).await.unwrap();
        }
        let author = t.user("ada@example.com", Role::Editor).await;
        t.post(author.id, "Hello", vec![]).await;
        t
    }

    #[tokio::test]
    async fn summarizes_whole_table() {
        let t = seeded().await;
        let summary = t.services.analytics.summary(TestContext::viewer(), AnalyticsQuery::default()).await.unwrap();

        assert_eq!(summary.counts.users, 1);
        assert_eq!(summary.counts.posts, 1);
        assert_eq!(summary.counts.published_posts, 0);
        assert_eq!(summary.counts.large_table, 3);

        assert_eq!(summary.sales.rows, 3);
        assert_eq!(summary.sales.total_revenue, 28.0);
        assert_eq!(summary.sales.total_quantity, 6.0);
        assert_eq!(
            summary.sales.by_region,
            vec![
                Bucket { key: Some("north".into()), count: 2, total: 23.0 },
                Bucket { key: Some("south".into()), count: 1, total: 5.0 },
            ]
        );
        assert_eq!(summary.sales.by_status.len(), 3);
    }

    #[tokio::test]
    async fn range_limits_sales_only() {
        let t = seeded().await;
        let query = AnalyticsQuery {
            from: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()),
        };
        let summary = t.services.analytics.summary(TestContext::admin(), query).await.unwrap();
        assert_eq!(summary.counts.large_table, 3);
        assert_eq!(summary.sales.rows, 2);
        assert_eq!(summary.sales.total_revenue, 25.0);
        assert_eq!(summary.sales.average_order_value, 12.5);
    }

    #[tokio::test]
    async fn inverted_range_is_invalid() {
        let t = TestContext::new();
        let query = AnalyticsQuery {
            from: Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
        };
        assert!(matches!(
            t.services.analytics.summary(TestContext::viewer(), query).await,
            Err(RuleError::Invalid(_))
        ));
    }
}
