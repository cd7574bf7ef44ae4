use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{valid_identifier, FilterWhere};
use super::types::{Condition, FilterData, FilterOrderInfo, SqlResult, TrashedMode};
use crate::audit::DELETED_AT;
use crate::database::entities::EntityDef;
use crate::tenancy::{TenantScope, TENANT_FIELD};

/// A query against one table.
///
/// Besides the caller's WHERE tree the filter carries the tenant scope and
/// the trashed mode, so both SQL rendering and in-memory evaluation apply
/// them the same way. Scope defaults to [`TenantScope::Nothing`] for
/// tenant-owned entities until the scope observer resolves it.
#[derive(Debug, Clone)]
pub struct Filter {
    table_name: String,
    where_data: Option<Condition>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    scope: TenantScope,
    trashed: TrashedMode,
    soft_delete: bool,
}

impl Filter {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !valid_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(table_name));
        }
        Ok(Self::unchecked(table_name, TenantScope::Unscoped, false))
    }

    /// Filter over a registered entity. Registry table names are checked by tests.
    pub fn for_entity(def: &EntityDef) -> Self {
        let scope = if def.tenant_owned {
            TenantScope::Nothing
        } else {
            TenantScope::Unscoped
        };
        Self::unchecked(def.table.to_string(), scope, def.audited)
    }

    fn unchecked(table_name: String, scope: TenantScope, soft_delete: bool) -> Self {
        Self {
            table_name,
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            scope,
            trashed: TrashedMode::Without,
            soft_delete,
        }
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        match (data.limit, data.offset) {
            (Some(limit), offset) => {
                self.limit(limit, offset)?;
            }
            (None, Some(offset)) => {
                self.offset(offset)?;
            }
            (None, None) => {}
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        self.where_data = FilterWhere::parse(&conditions)?;
        Ok(self)
    }

    /// AND an extra condition onto whatever WHERE is already present
    pub fn and_where(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        if let Some(extra) = FilterWhere::parse(&conditions)? {
            self.where_data = Some(match self.where_data.take() {
                Some(existing) => Condition::And(vec![existing, extra]),
                None => extra,
            });
        }
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.filter.max_limit.unwrap_or(i32::MAX);
        let applied_limit = if limit > max_limit {
            if crate::config::CONFIG.filter.debug_logging {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            }
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        if let Some(off) = offset {
            self.offset(off)?;
        }
        Ok(self)
    }

    pub fn offset(&mut self, offset: i32) -> Result<&mut Self, FilterError> {
        if offset < 0 {
            return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
        }
        self.offset = Some(offset);
        Ok(self)
    }

    pub fn set_scope(&mut self, scope: TenantScope) -> &mut Self {
        self.scope = scope;
        self
    }

    pub fn set_trashed(&mut self, mode: TrashedMode) -> &mut Self {
        self.trashed = mode;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    pub fn trashed_mode(&self) -> TrashedMode {
        self.trashed
    }

    // ========================================
    // SQL generation
    // ========================================

    /// Rows come back as a single JSONB column named `record`
    pub fn to_select_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql(0);
        let query = [
            format!("SELECT to_jsonb(\"{0}\".*) AS record FROM \"{0}\"", self.table_name),
            format!("WHERE {}", where_result.query),
            FilterOrder::generate(&self.table_name, &self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult {
            query,
            params: where_result.params,
        }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql(0);
        SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
                self.table_name, where_result.query
            ),
            params: where_result.params,
        }
    }

    pub fn to_delete_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql(0);
        SqlResult {
            query: format!(
                "DELETE FROM \"{0}\" WHERE {1} RETURNING to_jsonb(\"{0}\".*) AS record",
                self.table_name, where_result.query
            ),
            params: where_result.params,
        }
    }

    /// WHERE body including scope and trashed predicates, parameters numbered after `param_offset`
    pub fn to_where_sql(&self, param_offset: usize) -> SqlResult {
        let mut fw = FilterWhere::new(&self.table_name, param_offset);
        let mut conditions = vec![];

        match &self.scope {
            TenantScope::Unscoped => {}
            TenantScope::Nothing => conditions.push("1=0".to_string()),
            TenantScope::Tenant(tenant) => {
                let column = fw.column(TENANT_FIELD);
                let param = fw.param(tenant.to_value());
                conditions.push(format!("{} = {}", column, param));
            }
        }

        if self.soft_delete {
            match self.trashed {
                TrashedMode::Without => conditions.push(format!("{} IS NULL", fw.column(DELETED_AT))),
                TrashedMode::Only => conditions.push(format!("{} IS NOT NULL", fw.column(DELETED_AT))),
                TrashedMode::With => {}
            }
        }

        if let Some(ref where_data) = self.where_data {
            let sql = fw.render(where_data);
            conditions.push(format!("({})", sql));
        }

        let query = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };
        SqlResult {
            query,
            params: fw.into_params(),
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }

    // ========================================
    // In-memory evaluation
    // ========================================

    /// Whether a stored row passes scope, trashed mode and WHERE
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        if !self.scope.admits(row.get(TENANT_FIELD)) {
            return false;
        }

        if self.soft_delete {
            let trashed = row.get(DELETED_AT).is_some_and(|v| !v.is_null());
            let visible = match self.trashed {
                TrashedMode::Without => !trashed,
                TrashedMode::Only => trashed,
                TrashedMode::With => true,
            };
            if !visible {
                return false;
            }
        }

        self.where_data
            .as_ref()
            .map_or(true, |condition| FilterWhere::matches(condition, row))
    }

    /// Filter, order and page a full table snapshot
    pub fn apply(&self, rows: impl IntoIterator<Item = Map<String, Value>>) -> Vec<Map<String, Value>> {
        let mut selected: Vec<_> = rows.into_iter().filter(|row| self.matches(row)).collect();
        FilterOrder::sort(&mut selected, &self.order_data);

        let offset = self.offset.unwrap_or(0).max(0) as usize;
        let limit = self.limit.map_or(usize::MAX, |l| l.max(0) as usize);
        selected.into_iter().skip(offset).take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::entities;
    use crate::tenancy::TenantId;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn tenant_owned_filters_start_closed() {
        let filter = Filter::for_entity(entities::PRODUCTS);
        assert_eq!(filter.scope(), &TenantScope::Nothing);
        assert!(filter.to_where_sql(0).query.starts_with("1=0"));

        let filter = Filter::for_entity(entities::TENANTS);
        assert_eq!(filter.scope(), &TenantScope::Unscoped);
    }

    #[test]
    fn scope_and_trashed_are_table_qualified() {
        let tenant = TenantId::new();
        let mut filter = Filter::for_entity(entities::WORK_ORDERS);
        filter.set_scope(TenantScope::Tenant(tenant));
        filter.where_clause(json!({ "numero": 717 })).unwrap();

        let sql = filter.to_select_sql();
        assert_eq!(
            sql.query,
            r#"SELECT to_jsonb("work_orders".*) AS record FROM "work_orders" WHERE "work_orders"."tenant_id" = $1 AND "work_orders"."deleted_at" IS NULL AND ("work_orders"."numero" = $2)"#
        );
        assert_eq!(sql.params, vec![tenant.to_value(), json!(717)]);
    }

    #[test]
    fn where_params_follow_offset() {
        let tenant = TenantId::new();
        let mut filter = Filter::for_entity(entities::CUSTOMERS);
        filter.set_scope(TenantScope::Tenant(tenant));
        filter.and_where(json!({ "id": "abc" })).unwrap();
        let sql = filter.to_where_sql(1);
        assert!(sql.query.contains("$2"));
        assert!(sql.query.contains("$3"));
        assert!(!sql.query.contains("$1"));
    }

    #[test]
    fn unaudited_entities_have_no_trashed_predicate() {
        let mut filter = Filter::for_entity(entities::CATEGORIES);
        filter.set_scope(TenantScope::Unscoped);
        assert_eq!(filter.to_where_sql(0).query, "1=1");
    }

    #[test]
    fn in_memory_matches_scope_and_trashed() {
        let tenant = TenantId::new();
        let other = TenantId::new();
        let rows = vec![
            row(json!({ "id": "1", "tenant_id": tenant.to_string(), "deleted_at": null, "numero": 1 })),
            row(json!({ "id": "2", "tenant_id": tenant.to_string(), "deleted_at": "2024-05-01T00:00:00Z", "numero": 2 })),
            row(json!({ "id": "3", "tenant_id": other.to_string(), "deleted_at": null, "numero": 3 })),
        ];

        let mut filter = Filter::for_entity(entities::SALES);
        filter.set_scope(TenantScope::Tenant(tenant));
        let ids: Vec<_> = filter.apply(rows.clone()).into_iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("1")]);

        filter.set_trashed(TrashedMode::Only);
        let ids: Vec<_> = filter.apply(rows.clone()).into_iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("2")]);

        filter.set_scope(TenantScope::Unscoped).set_trashed(TrashedMode::With);
        filter.order(json!("numero desc")).unwrap();
        filter.limit(2, Some(1)).unwrap();
        let ids: Vec<_> = filter.apply(rows).into_iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("2"), json!("1")]);
    }

    #[test]
    fn assign_validates_everything() {
        let mut filter = Filter::new("products").unwrap();
        let data: FilterData = serde_json::from_value(json!({
            "where": { "preco": { "$gt": 5 } },
            "order": "nome",
            "limit": 10,
            "offset": 5
        }))
        .unwrap();
        filter.assign(data).unwrap();
        assert!(filter.to_select_sql().query.ends_with("LIMIT 10 OFFSET 5"));

        let bad: FilterData = serde_json::from_value(json!({ "limit": -1 })).unwrap();
        assert!(filter.assign(bad).is_err());
        assert!(Filter::new("products; --").is_err());
    }
}
