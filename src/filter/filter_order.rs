use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::error::FilterError;
use super::filter_where::{compare_values, valid_identifier};
use super::types::{FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // Expect array of strings like ["created_at desc", "nome asc"]
                let mut out = Vec::new();
                for v in arr {
                    let s = v.as_str().ok_or_else(|| {
                        FilterError::InvalidOperatorData("order entries must be strings".to_string())
                    })?;
                    out.extend(Self::parse_order_string(s));
                }
                out
            }
            Value::Object(obj) => {
                // { "created_at": "desc", "nome": "asc" }
                obj.iter()
                    .map(|(k, v)| FilterOrderInfo {
                        column: k.clone(),
                        sort: Self::direction(v.as_str().unwrap_or("asc")),
                    })
                    .collect()
            }
            _ => {
                return Err(FilterError::InvalidOperatorData(
                    "order must be a string, array or object".to_string(),
                ))
            }
        };

        if let Some(bad) = infos.iter().find(|i| !valid_identifier(&i.column)) {
            return Err(FilterError::InvalidColumn(bad.column.clone()));
        }
        Ok(infos)
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        // split on commas, then each token into column and direction
        s.split(',')
            .filter_map(|part| {
                let mut it = part.split_whitespace();
                let column = it.next()?;
                Some(FilterOrderInfo {
                    column: column.to_string(),
                    sort: Self::direction(it.next().unwrap_or("asc")),
                })
            })
            .collect()
    }

    fn direction(s: &str) -> SortDirection {
        if s.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn generate(table: &str, infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\".\"{}\" {}", table, i.column, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }

    /// Sort rows the way PostgreSQL does: NULLs last ascending, first descending
    pub fn sort(rows: &mut [Map<String, Value>], infos: &[FilterOrderInfo]) {
        if infos.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for info in infos {
                let ordering = Self::compare_column(a.get(&info.column), b.get(&info.column));
                let ordering = match info.sort {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    fn compare_column(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        let a = a.filter(|v| !v.is_null());
        let b = b.filter(|v| !v.is_null());
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_order_shapes() {
        let from_string = FilterOrder::validate_and_parse(&json!("numero desc, nome")).unwrap();
        let from_array = FilterOrder::validate_and_parse(&json!(["numero desc", "nome asc"])).unwrap();
        let from_object = FilterOrder::validate_and_parse(&json!({ "numero": "desc" })).unwrap();
        assert_eq!(from_string, from_array);
        assert_eq!(from_object[..], from_array[..1]);
        assert_eq!(
            FilterOrder::generate("work_orders", &from_string),
            r#"ORDER BY "work_orders"."numero" DESC, "work_orders"."nome" ASC"#
        );
    }

    #[test]
    fn rejects_injected_columns() {
        assert!(FilterOrder::validate_and_parse(&json!("nome; drop table x")).is_err());
    }

    #[test]
    fn sorts_nulls_like_postgres() {
        let mut rows: Vec<Map<String, Value>> = [json!({ "n": 2 }), json!({ "n": null }), json!({ "n": 1 })]
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();

        FilterOrder::sort(&mut rows, &FilterOrder::validate_and_parse(&json!("n asc")).unwrap());
        assert_eq!(rows.iter().map(|r| r["n"].clone()).collect::<Vec<_>>(), vec![json!(1), json!(2), Value::Null]);

        FilterOrder::sort(&mut rows, &FilterOrder::validate_and_parse(&json!("n desc")).unwrap());
        assert_eq!(rows.iter().map(|r| r["n"].clone()).collect::<Vec<_>>(), vec![Value::Null, json!(2), json!(1)]);
    }
}
