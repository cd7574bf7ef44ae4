//! Registry of the entities served by the data layer.
//!
//! Interceptors never name concrete entities; they read the descriptor flags.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityDef {
    /// API name (`/api/data/:entity`)
    pub name: &'static str,
    pub table: &'static str,
    /// Rows carry `tenant_id` and are scoped by it
    pub tenant_owned: bool,
    /// Deletes are soft and stamped with the audit fields
    pub audited: bool,
    /// Human-facing sequential number, unique per tenant among active rows
    pub business_key: Option<&'static str>,
    /// Dependent collections restored together with the parent
    #[serde(skip)]
    pub children: &'static [ChildRelation],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRelation {
    pub entity: &'static EntityDef,
    pub foreign_key: &'static str,
}

impl EntityDef {
    const fn owned(name: &'static str) -> Self {
        Self {
            name,
            table: name,
            tenant_owned: true,
            audited: true,
            business_key: None,
            children: &[],
        }
    }
}

pub const TENANTS: &EntityDef = &EntityDef {
    tenant_owned: false,
    audited: false,
    ..EntityDef::owned("tenants")
};

pub const CATEGORIES: &EntityDef = &EntityDef {
    audited: false,
    ..EntityDef::owned("categories")
};

pub const PRODUCTS: &EntityDef = &EntityDef::owned("products");

pub const CUSTOMERS: &EntityDef = &EntityDef::owned("customers");

pub const SALE_ITEMS: &EntityDef = &EntityDef::owned("sale_items");

pub const SALES: &EntityDef = &EntityDef {
    business_key: Some("numero"),
    children: &[ChildRelation {
        entity: SALE_ITEMS,
        foreign_key: "sale_id",
    }],
    ..EntityDef::owned("sales")
};

pub const WORK_ORDERS: &EntityDef = &EntityDef {
    business_key: Some("numero"),
    ..EntityDef::owned("work_orders")
};

pub const APPOINTMENTS: &EntityDef = &EntityDef::owned("appointments");

pub const ALL: &[&EntityDef] = &[
    TENANTS,
    CATEGORIES,
    PRODUCTS,
    CUSTOMERS,
    SALES,
    SALE_ITEMS,
    WORK_ORDERS,
    APPOINTMENTS,
];

/// Find an entity by its API name
pub fn lookup(name: &str) -> Option<&'static EntityDef> {
    ALL.iter().copied().find(|def| def.name == name)
}

/// Entities reachable through the request-facing data API. Global entities such as
/// the tenant directory have their own services.
pub fn lookup_tenant_owned(name: &str) -> Option<&'static EntityDef> {
    lookup(name).filter(|def| def.tenant_owned)
}

/// Find an entity by its table name
pub fn by_table(table: &str) -> Option<&'static EntityDef> {
    ALL.iter().copied().find(|def| def.table == table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    #[test]
    fn table_names_are_valid_identifiers() {
        for def in ALL {
            assert!(Filter::new(def.table).is_ok(), "bad table {}", def.table);
        }
    }

    #[test]
    fn audited_entities_are_tenant_owned() {
        for def in ALL.iter().filter(|d| d.audited) {
            assert!(def.tenant_owned, "{} audited but global", def.name);
        }
    }

    #[test]
    fn lookup_finds_registered_entities() {
        assert_eq!(lookup("work_orders"), Some(WORK_ORDERS));
        assert_eq!(by_table("sales").and_then(|d| d.business_key), Some("numero"));
        assert_eq!(SALES.children[0].entity, SALE_ITEMS);
        assert!(lookup("users").is_none());
    }

    #[test]
    fn tenant_directory_is_not_tenant_owned() {
        assert_eq!(lookup("tenants"), Some(TENANTS));
        assert!(lookup_tenant_owned("tenants").is_none());
        assert_eq!(lookup_tenant_owned("categories"), Some(CATEGORIES));
    }
}
