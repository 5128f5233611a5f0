// In-process evaluation of FilterData against JSON rows.
// Mirrors the SQL generated by FilterWhere/FilterOrder closely enough that the
// memory store and Postgres return the same rows for the same filter.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter::cap_limit;
use super::filter_order::FilterOrder;
use super::types::{FilterData, FilterOp, FilterOrderInfo, SortDirection};

pub type Row = Map<String, Value>;

/// Apply where, order, offset/limit and select to a set of rows
pub fn apply(rows: Vec<Row>, filter: &FilterData) -> Result<Vec<Row>, FilterError> {
    let mut matched = Vec::new();
    for row in rows {
        if matches_row(filter.where_clause.as_ref(), &row)? {
            matched.push(row);
        }
    }

    if let Some(order) = &filter.order {
        let infos = FilterOrder::validate_and_parse(order)?;
        sort_rows(&mut matched, &infos);
    }

    let offset = filter.offset.unwrap_or(0).max(0) as usize;
    let limit = filter.limit.map(|l| cap_limit(l).max(0) as usize);
    let page: Vec<Row> = matched
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    Ok(match &filter.select {
        Some(cols) if !cols.is_empty() && !cols.iter().any(|c| c == "*") => {
            page.into_iter().map(|row| project(row, cols)).collect()
        }
        _ => page,
    })
}

pub fn matches_row(where_data: Option<&Value>, row: &Row) -> Result<bool, FilterError> {
    match where_data {
        None | Some(Value::Null) => Ok(true),
        Some(Value::Object(obj)) => {
            for (key, value) in obj {
                let ok = match key.as_str() {
                    "$and" => {
                        let arr = array_operand(key, value)?;
                        let mut all = true;
                        for v in arr {
                            if !matches_row(Some(v), row)? { all = false; break; }
                        }
                        all
                    }
                    "$or" => {
                        let arr = array_operand(key, value)?;
                        let mut any = false;
                        for v in arr {
                            if matches_row(Some(v), row)? { any = true; break; }
                        }
                        any
                    }
                    "$not" => !matches_row(Some(value), row)?,
                    k if k.starts_with('$') => return Err(FilterError::UnsupportedOperator(k.to_string())),
                    column => matches_field(row.get(column).unwrap_or(&Value::Null), value)?,
                };
                if !ok {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Some(_) => Err(FilterError::InvalidWhere("where must be an object".to_string())),
    }
}

fn array_operand<'a>(op: &str, value: &'a Value) -> Result<&'a Vec<Value>, FilterError> {
    value
        .as_array()
        .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))
}

fn matches_field(actual: &Value, condition: &Value) -> Result<bool, FilterError> {
    match condition {
        Value::Object(ops) => {
            for (op_key, operand) in ops {
                let op = FilterOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                if !evaluate(actual, op, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        other => evaluate(actual, FilterOp::Eq, other),
    }
}

fn evaluate(actual: &Value, op: FilterOp, operand: &Value) -> Result<bool, FilterError> {
    // SQL comparisons against NULL are never true, except IS NULL / IS NOT NULL
    let ok = match op {
        FilterOp::Eq if operand.is_null() => actual.is_null(),
        FilterOp::Ne if operand.is_null() => !actual.is_null(),
        _ if actual.is_null() => false,
        FilterOp::Eq => values_equal(actual, operand),
        FilterOp::Ne => !values_equal(actual, operand),
        FilterOp::Gt => compare(actual, operand) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare(actual, operand), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare(actual, operand) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare(actual, operand), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::Like | FilterOp::ILike => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| FilterError::InvalidOperatorData("pattern must be a string".to_string()))?;
            like(&as_text(actual), pattern, op == FilterOp::ILike)
        }
        FilterOp::In | FilterOp::NIn => {
            let found = match operand {
                Value::Array(values) => values.iter().any(|v| values_equal(actual, v)),
                other => values_equal(actual, other),
            };
            if op == FilterOp::In { found } else { !found }
        }
        FilterOp::Between => match operand {
            Value::Array(values) if values.len() == 2 => {
                matches!(compare(actual, &values[0]), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(actual, &values[1]), Some(Ordering::Less | Ordering::Equal))
            }
            _ => return Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
        },
    };
    Ok(ok)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Ordering between two scalar JSON values; None when incomparable
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(dx), Some(dy)) => Some(dx.cmp(&dy)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Clone, Copy)]
enum LikeToken {
    Any,
    One,
    Lit(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            // trailing backslash stands for itself
            '\\' => LikeToken::Lit(chars.next().unwrap_or('\\')),
            c => LikeToken::Lit(c),
        });
    }
    tokens
}

/// SQL LIKE: `%` matches any run, `_` one character, `\` escapes the next one
pub fn like(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (text, pattern) = if case_insensitive {
        (text.to_lowercase(), pattern.to_lowercase())
    } else {
        (text.to_string(), pattern.to_string())
    };
    let t: Vec<char> = text.chars().collect();

    // dp[j] = pattern so far matches text[..j]
    let mut dp = vec![false; t.len() + 1];
    dp[0] = true;
    for token in like_tokens(&pattern) {
        let mut next = vec![false; t.len() + 1];
        match token {
            LikeToken::Any => {
                let mut seen = false;
                for j in 0..=t.len() {
                    seen = seen || dp[j];
                    next[j] = seen;
                }
            }
            LikeToken::One => {
                for j in 1..=t.len() {
                    next[j] = dp[j - 1];
                }
            }
            LikeToken::Lit(pc) => {
                for j in 1..=t.len() {
                    next[j] = dp[j - 1] && pc == t[j - 1];
                }
            }
        }
        dp = next;
    }
    dp[t.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn sample() -> Vec<Row> {
        vec![
            row(json!({"id": 1, "region": "north", "revenue": 10.0, "note": null})),
            row(json!({"id": 2, "region": "south", "revenue": 250.5, "note": "rush"})),
            row(json!({"id": 3, "region": "North-East", "revenue": 99.0, "note": "late"})),
        ]
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn like_patterns() {
        assert!(like("North-East", "north%", true));
        assert!(!like("North-East", "north%", false));
        assert!(like("abc", "a_c", false));
        assert!(like("", "%", false));
        assert!(!like("abc", "a_", false));
    }

    #[test]
    fn like_escapes() {
        assert!(like("50% off", "50\\%%", false));
        assert!(!like("500 off", "50\\%%", false));
        assert!(like("snake_case", "%e\\_c%", false));
        assert!(!like("snakeXcase", "%e\\_c%", false));
        assert!(like("a\\b", "a\\\\b", false));
    }

    #[test]
    fn comparison_operators_skip_nulls() {
        let filter = FilterData {
            where_clause: Some(json!({"note": {"$ne": "rush"}})),
            ..Default::default()
        };
        // NULL <> 'rush' is not true in SQL
        assert_eq!(ids(&apply(sample(), &filter).unwrap()), vec![3]);
    }

    #[test]
    fn logical_operators_and_ranges() {
        let filter = FilterData {
            where_clause: Some(json!({
                "$or": [{"region": {"$ilike": "north%"}}, {"revenue": {"$gt": 200}}],
                "id": {"$between": [2, 3]}
            })),
            ..Default::default()
        };
        assert_eq!(ids(&apply(sample(), &filter).unwrap()), vec![2, 3]);
    }

    #[test]
    fn ordering_with_nulls_and_paging() {
        let filter = FilterData {
            order: Some(json!("note asc")),
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        };
        // late, rush, NULL -> skip 1 -> rush, NULL
        assert_eq!(ids(&apply(sample(), &filter).unwrap()), vec![2, 1]);
    }

    #[test]
    fn timestamps_compare_chronologically() {
        assert_eq!(
            compare(&json!("2024-01-02T00:00:00Z"), &json!("2024-01-01T23:00:00-05:00")),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn select_projects_columns() {
        let filter = FilterData {
            select: Some(vec!["id".into()]),
            ..Default::default()
        };
        let out = apply(sample(), &filter).unwrap();
        assert!(out.iter().all(|r| r.len() == 1 && r.contains_key("id")));
    }
}
