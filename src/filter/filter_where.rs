use serde_json::{Map, Value};

use super::error::FilterError;
use super::is_valid_identifier;
use super::types::FilterOp;

/// Compiles a JSON where clause into a parameterized Postgres predicate
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_offset: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_offset: starting_param_index,
        }
    }

    /// Returns the predicate (empty when the clause has no conditions) and its params.
    /// Placeholders start at `$starting_param_index + 1`.
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build_object(where_data)?;
        Ok((sql, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        Self::columns(where_data).map(|_| ())
    }

    /// Every column referenced by the clause, in order of appearance
    pub fn columns(where_data: &Value) -> Result<Vec<String>, FilterError> {
        let mut out = Vec::new();
        Self::collect_columns(where_data, &mut out)?;
        Ok(out)
    }

    fn collect_columns(where_data: &Value, out: &mut Vec<String>) -> Result<(), FilterError> {
        match where_data {
            Value::Null => Ok(()),
            Value::Object(obj) => {
                for (key, value) in obj {
                    match key.as_str() {
                        "$and" | "$or" => {
                            let arr = value
                                .as_array()
                                .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", key)))?;
                            for v in arr {
                                Self::collect_columns(v, out)?;
                            }
                        }
                        "$not" => Self::collect_columns(value, out)?,
                        k if k.starts_with('$') => return Err(FilterError::UnsupportedOperator(k.to_string())),
                        column => {
                            if !is_valid_identifier(column) {
                                return Err(FilterError::InvalidColumn(column.to_string()));
                            }
                            if let Value::Object(ops) = value {
                                for op_key in ops.keys() {
                                    if FilterOp::parse(op_key).is_none() {
                                        return Err(FilterError::UnsupportedOperator(op_key.clone()));
                                    }
                                }
                            }
                            if !out.iter().any(|c| c == column) {
                                out.push(column.to_string());
                            }
                        }
                    }
                }
                Ok(())
            }
            _ => Err(FilterError::InvalidWhere("where must be an object".to_string())),
        }
    }

    fn build_object(&mut self, where_data: &Value) -> Result<String, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(String::new()),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhere("where must be an object".to_string())),
        };

        let mut parts = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                parts.push(self.build_logical(key, value)?);
            } else {
                parts.extend(self.build_field(key, value)?);
            }
        }
        Ok(parts.join(" AND "))
    }

    fn build_logical(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Ok(if op == "$and" { "TRUE" } else { "FALSE" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    let sql = self.build_object(v)?;
                    sql_parts.push(if sql.is_empty() { "TRUE".to_string() } else { format!("({})", sql) });
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => {
                let sql = self.build_object(value)?;
                Ok(if sql.is_empty() { "FALSE".to_string() } else { format!("NOT ({})", sql) })
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn build_field(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        if !is_valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        match value {
            Value::Object(ops) => {
                let mut out = Vec::with_capacity(ops.len());
                for (op_key, op_val) in ops {
                    let operator = FilterOp::parse(op_key)
                        .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    out.push(self.build_condition(field, operator, op_val)?);
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            other => Ok(vec![self.build_condition(field, FilterOp::Eq, other)?]),
        }
    }

    fn build_condition(&mut self, column: &str, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", column);
        let sql = match operator {
            FilterOp::Eq => {
                if data.is_null() { format!("{} IS NULL", quoted_column) }
                else { format!("{} = {}", quoted_column, self.param(data.clone())) }
            }
            FilterOp::Ne => {
                if data.is_null() { format!("{} IS NOT NULL", quoted_column) }
                else { format!("{} <> {}", quoted_column, self.param(data.clone())) }
            }
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like | FilterOp::ILike => {
                if !data.is_string() {
                    return Err(FilterError::InvalidOperatorData("pattern must be a string".to_string()));
                }
                let keyword = if operator == FilterOp::Like { "LIKE" } else { "ILIKE" };
                format!("{}::text {} {}", quoted_column, keyword, self.param(data.clone()))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if operator == FilterOp::In { "FALSE" } else { "TRUE" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if operator == FilterOp::In { "IN" } else { "NOT IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(values[0].clone()),
                    self.param(values[1].clone())
                ),
                _ => return Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
        };
        Ok(sql)
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_offset + self.param_values.len())
    }
}

/// Combine two optional where clauses with `$and`
pub fn and_where(left: Option<Value>, right: Option<Value>) -> Option<Value> {
    match (left, right) {
        (None, r) => r,
        (l, None) => l,
        (Some(l), Some(r)) => {
            let mut map = Map::new();
            map.insert("$and".to_string(), Value::Array(vec![l, r]));
            Some(Value::Object(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_null() {
        let (sql, params) = FilterWhere::generate(&json!({"author_id": 7, "content": null}), 0).unwrap();
        assert_eq!(sql, "\"author_id\" = $1 AND \"content\" IS NULL");
        assert_eq!(params, vec![json!(7)]);
    }

    #[test]
    fn nested_logical_operators_keep_numbering() {
        let where_data = json!({
            "published": true,
            "$or": [{"title": {"$ilike": "%rust%"}}, {"id": {"$in": [1, 2]}}]
        });
        let (sql, params) = FilterWhere::generate(&where_data, 0).unwrap();
        // serde_json maps iterate in key order, so "$or" sorts before "published"
        assert_eq!(
            sql,
            "((\"title\"::text ILIKE $1) OR (\"id\" IN ($2, $3))) AND \"published\" = $4"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn starting_index_offsets_placeholders() {
        let (sql, _) = FilterWhere::generate(&json!({"id": {"$gte": 3}}), 2).unwrap();
        assert_eq!(sql, "\"id\" >= $3");
    }

    #[test]
    fn empty_in_never_matches() {
        let (sql, params) = FilterWhere::generate(&json!({"id": {"$in": []}}), 0).unwrap();
        assert_eq!(sql, "FALSE");
        assert!(params.is_empty());
    }

    #[test]
    fn rejects_unknown_operator_and_bad_column() {
        assert!(matches!(
            FilterWhere::generate(&json!({"id": {"$regex": "x"}}), 0),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::generate(&json!({"id\" OR 1=1 --": 1}), 0),
            Err(FilterError::InvalidColumn(_))
        ));
    }

    #[test]
    fn collects_columns_through_logical_operators() {
        let cols = FilterWhere::columns(&json!({
            "$and": [{"region": "north"}, {"$not": {"status": "cancelled"}}],
            "region": {"$ne": "south"}
        }))
        .unwrap();
        assert_eq!(cols, vec!["region".to_string(), "status".to_string()]);
    }

    #[test]
    fn and_where_combines() {
        assert_eq!(and_where(None, Some(json!({"a": 1}))), Some(json!({"a": 1})));
        assert_eq!(
            and_where(Some(json!({"a": 1})), Some(json!({"b": 2}))),
            Some(json!({"$and": [{"a": 1}, {"b": 2}]}))
        );
    }
}
