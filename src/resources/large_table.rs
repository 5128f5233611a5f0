use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::{to_row, DatabaseError, Entity, Row, Store};
use crate::pipeline::{ExecutionContext, FieldError, FnRule, RuleError};
use crate::resources::crud::{Crud, ResourceEntity, Update, WriteInput};
use crate::rules::{FieldErrors, Loaded, Validate};
use crate::types::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

/// One sales fact row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeTableRow {
    pub id: i64,
    pub region: String,
    pub product: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: f64,
    /// Always `quantity * unit_price`
    pub revenue: f64,
    pub status: SaleStatus,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for LargeTableRow {
    const TABLE: &'static str = "large_table";
    const COLUMNS: &'static [&'static str] = &[
        "id", "region", "product", "category", "quantity", "unit_price", "revenue", "status",
        "recorded_at", "created_at", "updated_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

impl ResourceEntity for LargeTableRow {
    const RESOURCE: Resource = Resource::LargeTable;
    const SEARCHABLE: &'static [&'static str] = &["region", "product", "category"];
    const DEFAULT_ORDER: &'static str = "recorded_at desc, id desc";
}

pub fn revenue(quantity: i64, unit_price: f64) -> f64 {
    quantity as f64 * unit_price
}

fn check_revenue(errors: &mut FieldErrors, quantity: i64, unit_price: f64) {
    if !revenue(quantity, unit_price).is_finite() {
        errors.add("revenue", "quantity * unit_price is out of range");
    }
}

fn merged(changes: &UpdateLargeTableRow, existing: Option<&LargeTableRow>) -> (i64, f64) {
    let quantity = changes.quantity.or(existing.map(|e| e.quantity)).unwrap_or(0);
    let unit_price = changes.unit_price.or(existing.map(|e| e.unit_price)).unwrap_or(0.0);
    (quantity, unit_price)
}

fn with_revenue(mut row: Row, quantity: i64, unit_price: f64) -> Result<Row, DatabaseError> {
    let revenue = serde_json::Number::from_f64(revenue(quantity, unit_price))
        .ok_or_else(|| DatabaseError::Serialization("revenue is not a finite number".to_string()))?;
    row.insert("revenue".to_string(), Value::Number(revenue));
    Ok(row)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLargeTableRow {
    pub region: String,
    pub product: String,
    pub category: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub status: SaleStatus,
    /// Defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Validate for CreateLargeTableRow {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        errors
            .length("region", &self.region, 1, 50)
            .length("product", &self.product, 1, 100)
            .length("category", &self.category, 1, 50);
        if self.quantity < 0 {
            errors.add("quantity", "must be >= 0");
        }
        errors.non_negative("unit_price", self.unit_price);
        if errors.is_empty() {
            check_revenue(&mut errors, self.quantity, self.unit_price);
        }
        errors.into_vec()
    }
}

impl WriteInput<LargeTableRow> for CreateLargeTableRow {
    fn columns(&self, _existing: Option<&LargeTableRow>) -> Result<Row, DatabaseError> {
        let mut row = to_row(self)?;
        if self.recorded_at.is_none() {
            row.insert(
                "recorded_at".to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }
        with_revenue(row, self.quantity, self.unit_price)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLargeTableRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SaleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Validate for UpdateLargeTableRow {
    fn validate(&self) -> Vec<FieldError> {
        let mut errors = FieldErrors::new();
        if let Some(region) = &self.region {
            errors.length("region", region, 1, 50);
        }
        if let Some(product) = &self.product {
            errors.length("product", product, 1, 100);
        }
        if let Some(category) = &self.category {
            errors.length("category", category, 1, 50);
        }
        if self.quantity.is_some_and(|q| q < 0) {
            errors.add("quantity", "must be >= 0");
        }
        if let Some(price) = self.unit_price {
            errors.non_negative("unit_price", price);
        }
        errors.into_vec()
    }
}

impl WriteInput<LargeTableRow> for UpdateLargeTableRow {
    /// Revenue is recomputed from the merged quantity and unit price
    fn columns(&self, existing: Option<&LargeTableRow>) -> Result<Row, DatabaseError> {
        let row = to_row(self)?;
        let (quantity, unit_price) = merged(self, existing);
        with_revenue(row, quantity, unit_price)
    }
}

pub type LargeTableService = Crud<LargeTableRow, CreateLargeTableRow, UpdateLargeTableRow>;

pub fn service(store: Arc<dyn Store>) -> LargeTableService {
    Crud::builder(store)
        .update_rule(FnRule::new(
            "revenue_in_range",
            |ctx: &ExecutionContext<Update<UpdateLargeTableRow>>| {
                let existing = ctx.get_metadata::<Loaded<LargeTableRow>>().map(|loaded| &loaded.0);
                let (quantity, unit_price) = merged(&ctx.dto.changes, existing);
                let mut errors = FieldErrors::new();
                check_revenue(&mut errors, quantity, unit_price);
                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(RuleError::Invalid(errors.into_vec()))
                }
            },
        ))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::crud::CrudService;
    use crate::testing::TestContext;

    fn sale() -> CreateLargeTableRow {
        CreateLargeTableRow {
            region: "north".into(),
            product: "widget".into(),
            category: "tools".into(),
            quantity: 4,
            unit_price: 2.5,
            status: SaleStatus::Pending,
            recorded_at: None,
        }
    }

    #[tokio::test]
    async fn revenue_follows_quantity_and_price() {
        let t = TestContext::new();
        let row = t.services.large_table.create(TestContext::editor(), sale()).await.unwrap();
        assert_eq!(row.revenue, 10.0);

        let more = UpdateLargeTableRow {
            quantity: Some(10),
            ..Default::default()
        };
        let row = t.services.large_table.update(TestContext::editor(), row.id, more).await.unwrap();
        assert_eq!(row.revenue, 25.0);
        assert_eq!(row.unit_price, 2.5);

        let cheaper = UpdateLargeTableRow {
            unit_price: Some(1.0),
            status: Some(SaleStatus::Completed),
            ..Default::default()
        };
        let row = t.services.large_table.update(TestContext::editor(), row.id, cheaper).await.unwrap();
        assert_eq!(row.revenue, 10.0);
        assert_eq!(row.status, SaleStatus::Completed);
    }

    #[tokio::test]
    async fn rejects_negative_and_non_finite_numbers() {
        let t = TestContext::new();
        let mut input = sale();
        input.quantity = -1;
        input.unit_price = f64::INFINITY;
        match t.services.large_table.create(TestContext::editor(), input).await {
            Err(RuleError::Invalid(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["quantity", "unit_price"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn overflowing_revenue_is_invalid() {
        let t = TestContext::new();
        let mut input = sale();
        input.quantity = i64::MAX;
        input.unit_price = 1e300;
        match t.services.large_table.create(TestContext::editor(), input).await {
            Err(RuleError::Invalid(errors)) => assert_eq!(errors[0].field, "revenue"),
            other => panic!("unexpected {:?}", other),
        }

        // each change is fine alone, the merged row overflows
        let row = t.services.large_table.create(TestContext::editor(), sale()).await.unwrap();
        let huge_price = UpdateLargeTableRow {
            unit_price: Some(1e300),
            ..Default::default()
        };
        let row = t.services.large_table.update(TestContext::editor(), row.id, huge_price).await.unwrap();
        let huge_quantity = UpdateLargeTableRow {
            quantity: Some(i64::MAX),
            ..Default::default()
        };
        match t.services.large_table.update(TestContext::editor(), row.id, huge_quantity).await {
            Err(RuleError::Invalid(errors)) => assert_eq!(errors[0].field, "revenue"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn status_wire_format() {
        assert_eq!(serde_json::to_value(SaleStatus::Cancelled).unwrap(), serde_json::json!("cancelled"));
        assert_eq!(SaleStatus::Completed.as_str(), "completed");
    }
}
