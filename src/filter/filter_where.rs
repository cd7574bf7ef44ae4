use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::error::FilterError;
use super::types::{Condition, FilterOp};

/// Renders a [`Condition`] tree to SQL with numbered parameters.
///
/// Every column is qualified with the owning table so the fragment stays
/// unambiguous inside `UPDATE ... FROM` and joins.
pub struct FilterWhere<'a> {
    table: &'a str,
    param_values: Vec<Value>,
    param_index: usize,
}

impl<'a> FilterWhere<'a> {
    /// Parameters are numbered from `starting_param_index + 1`
    pub fn new(table: &'a str, starting_param_index: usize) -> Self {
        Self {
            table,
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn parse(where_data: &Value) -> Result<Option<Condition>, FilterError> {
        match where_data {
            Value::Null => Ok(None),
            Value::Object(obj) => Self::parse_object(obj).map(Some),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_object(obj: &Map<String, Value>) -> Result<Condition, FilterError> {
        let mut conditions = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(Self::parse_logical_operator(key, value)?);
            } else {
                conditions.extend(Self::parse_field_condition(key, value)?);
            }
        }
        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Condition::And(conditions)
        })
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut parts = Vec::with_capacity(arr.len());
                for v in arr {
                    let obj = v.as_object().ok_or_else(|| {
                        FilterError::InvalidOperatorData(format!("{} entries must be objects", op))
                    })?;
                    parts.push(Self::parse_object(obj)?);
                }
                Ok(if op == "$and" {
                    Condition::And(parts)
                } else {
                    Condition::Or(parts)
                })
            }
            "$not" => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$not requires object".to_string()))?;
                Ok(Condition::Not(Box::new(Self::parse_object(obj)?)))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        if !valid_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }

        let field_condition = |operator: FilterOp, data: Value| Condition::Field {
            column: field.to_string(),
            operator,
            data,
        };

        match value {
            Value::Object(obj) => {
                let mut out = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let operator = FilterOp::from_key(op_key)?;
                    Self::validate_operator_data(operator, op_val)?;
                    out.push(field_condition(operator, op_val.clone()));
                }
                Ok(out)
            }
            // { field: [a, b] } reads as membership
            Value::Array(_) => Ok(vec![field_condition(FilterOp::In, value.clone())]),
            // Implicit equality: { field: value }
            _ => Ok(vec![field_condition(FilterOp::Eq, value.clone())]),
        }
    }

    fn validate_operator_data(operator: FilterOp, data: &Value) -> Result<(), FilterError> {
        let ok = match operator {
            FilterOp::In | FilterOp::NIn => data.is_array(),
            FilterOp::Between => data.as_array().is_some_and(|a| a.len() == 2),
            FilterOp::Null => data.is_boolean(),
            FilterOp::Like | FilterOp::ILike => data.is_string(),
            _ => !data.is_array() && !data.is_object(),
        };
        if ok {
            Ok(())
        } else {
            Err(FilterError::InvalidOperatorData(format!(
                "Invalid value for {:?}: {}",
                operator, data
            )))
        }
    }

    pub fn render(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::And(parts) if parts.is_empty() => "1=1".to_string(),
            Condition::Or(parts) if parts.is_empty() => "1=0".to_string(),
            Condition::And(parts) => self.render_joined(parts, " AND "),
            Condition::Or(parts) => self.render_joined(parts, " OR "),
            Condition::Not(inner) => format!("NOT ({})", self.render(inner)),
            Condition::Field { column, operator, data } => self.render_field(column, *operator, data),
        }
    }

    fn render_joined(&mut self, parts: &[Condition], joiner: &str) -> String {
        let rendered: Vec<String> = parts.iter().map(|p| format!("({})", self.render(p))).collect();
        rendered.join(joiner)
    }

    fn render_field(&mut self, column: &str, operator: FilterOp, data: &Value) -> String {
        let quoted_column = self.column(column);
        match operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted_column),
            FilterOp::Eq => format!("{} = {}", quoted_column, self.param(data.clone())),
            FilterOp::Neq if data.is_null() => format!("{} IS NOT NULL", quoted_column),
            FilterOp::Neq => format!("{} <> {}", quoted_column, self.param(data.clone())),
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = data.as_array().cloned().unwrap_or_default();
                let negate = operator == FilterOp::NIn;
                if values.is_empty() {
                    return if negate { "1=1" } else { "1=0" }.to_string();
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Between => {
                let bounds = data.as_array().cloned().unwrap_or_default();
                let low = self.param(bounds.first().cloned().unwrap_or(Value::Null));
                let high = self.param(bounds.get(1).cloned().unwrap_or(Value::Null));
                format!("{} BETWEEN {} AND {}", quoted_column, low, high)
            }
            FilterOp::Null => {
                if data.as_bool().unwrap_or(true) {
                    format!("{} IS NULL", quoted_column)
                } else {
                    format!("{} IS NOT NULL", quoted_column)
                }
            }
        }
    }

    pub fn column(&self, column: &str) -> String {
        format!("\"{}\".\"{}\"", self.table, column)
    }

    pub fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }

    pub fn into_params(self) -> Vec<Value> {
        self.param_values
    }

    /// Evaluate a condition against a stored row with SQL semantics: a NULL
    /// column fails every comparison except the explicit null tests.
    pub fn matches(condition: &Condition, row: &Map<String, Value>) -> bool {
        match condition {
            Condition::And(parts) => parts.iter().all(|p| Self::matches(p, row)),
            Condition::Or(parts) => parts.iter().any(|p| Self::matches(p, row)),
            Condition::Not(inner) => !Self::matches(inner, row),
            Condition::Field { column, operator, data } => {
                let value = row.get(column).filter(|v| !v.is_null());
                Self::matches_field(value, *operator, data)
            }
        }
    }

    fn matches_field(value: Option<&Value>, operator: FilterOp, data: &Value) -> bool {
        let cmp = |v: &Value, d: &Value| compare_values(v, d);
        match operator {
            FilterOp::Eq if data.is_null() => return value.is_none(),
            FilterOp::Neq if data.is_null() => return value.is_some(),
            _ => {}
        }
        let Some(value) = value else {
            return operator == FilterOp::Null && data.as_bool().unwrap_or(true);
        };

        match operator {
            FilterOp::Eq => cmp(value, data) == Some(Ordering::Equal),
            FilterOp::Neq => cmp(value, data).is_some_and(|o| o != Ordering::Equal),
            FilterOp::Gt => cmp(value, data) == Some(Ordering::Greater),
            FilterOp::Gte => cmp(value, data).is_some_and(|o| o != Ordering::Less),
            FilterOp::Lt => cmp(value, data) == Some(Ordering::Less),
            FilterOp::Lte => cmp(value, data).is_some_and(|o| o != Ordering::Greater),
            FilterOp::Like | FilterOp::ILike => match (value.as_str(), data.as_str()) {
                (Some(text), Some(pattern)) if operator == FilterOp::ILike => {
                    like_match(&text.to_lowercase(), &pattern.to_lowercase())
                }
                (Some(text), Some(pattern)) => like_match(text, pattern),
                _ => false,
            },
            FilterOp::In => data
                .as_array()
                .is_some_and(|a| a.iter().any(|d| cmp(value, d) == Some(Ordering::Equal))),
            FilterOp::NIn => data.as_array().is_some_and(|a| {
                a.iter()
                    .filter(|d| !d.is_null())
                    .all(|d| cmp(value, d).is_some_and(|o| o != Ordering::Equal))
            }),
            FilterOp::Between => match data.as_array().map(Vec::as_slice) {
                Some([low, high]) => {
                    cmp(value, low).is_some_and(|o| o != Ordering::Less)
                        && cmp(value, high).is_some_and(|o| o != Ordering::Greater)
                }
                _ => false,
            },
            FilterOp::Null => data.as_bool() == Some(false),
        }
    }
}

/// Ordering between two JSON scalars of the same kind; `None` when incomparable
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL identifier check for table and column names
pub(crate) fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// `LIKE` with `%` and `_` wildcards, no escape character
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if let Some((star, mark)) = backtrack {
            pi = star + 1;
            ti = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
