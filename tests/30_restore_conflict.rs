mod common;

use anyhow::Result;
use serde_json::json;
use std::time::Duration;

use common::{numbers, Fixture};
use retail_core::audit::DELETION_REASON;
use retail_core::database::entities::{SALES, SALE_ITEMS, WORK_ORDERS};
use retail_core::database::record::Record;
use retail_core::database::repository::RepositoryError;
use retail_core::filter::FilterData;
use retail_core::services::SoftDeleteService;
use retail_core::tenancy::{Principal, TenantId};

#[tokio::test]
async fn restore_reassigns_a_key_taken_by_a_newer_row() -> Result<()> {
    let fx = Fixture::new();
    let admin = Principal::admin(TenantId::new(), "gerente");
    let repo = fx.request(WORK_ORDERS, Some(&admin));

    let old = fx.work_order(&admin, 717).await?;
    let old_id = old.id().unwrap();
    repo.delete(old_id, Some("aberta por engano")).await?;

    // The number is free again among active rows
    let newer = fx.work_order(&admin, 717).await?;

    let outcome = repo.restore(old_id).await?;
    assert_eq!(outcome.reassigned.len(), 1);
    let moved = &outcome.reassigned[0];
    assert_eq!((moved.from, moved.to), (717, 718));
    assert_eq!(moved.id, Some(old_id));
    assert_eq!(outcome.records[0].get("numero"), Some(&json!(718)));

    let active = repo.select_any(FilterData::default()).await?;
    assert_eq!(numbers(&active, "numero"), vec![717, 718]);
    let newer_now = repo.select_id(newer.id().unwrap()).await?;
    assert_eq!(newer_now.get("numero"), Some(&json!(717)));
    Ok(())
}

#[tokio::test]
async fn new_key_skips_numbers_used_by_deleted_rows() -> Result<()> {
    let fx = Fixture::new();
    let admin = Principal::admin(TenantId::new(), "gerente");
    let repo = fx.request(WORK_ORDERS, Some(&admin));

    let old = fx.work_order(&admin, 717).await?;
    repo.delete(old.id().unwrap(), None).await?;
    fx.work_order(&admin, 717).await?;
    let abandoned = fx.work_order(&admin, 720).await?;
    repo.delete(abandoned.id().unwrap(), None).await?;

    let outcome = repo.restore(old.id().unwrap()).await?;
    assert_eq!(outcome.reassigned[0].to, 721);
    Ok(())
}

#[tokio::test]
async fn collisions_are_checked_within_the_rows_tenant_only() -> Result<()> {
    let fx = Fixture::new();
    let alice = Principal::admin(TenantId::new(), "alice");
    let bob = Principal::admin(TenantId::new(), "bob");

    let old = fx.work_order(&alice, 717).await?;
    fx.request(WORK_ORDERS, Some(&alice)).delete(old.id().unwrap(), None).await?;
    fx.work_order(&bob, 717).await?;
    fx.work_order(&bob, 900).await?;

    let outcome = fx.request(WORK_ORDERS, Some(&alice)).restore(old.id().unwrap()).await?;
    assert!(outcome.reassigned.is_empty());
    assert_eq!(outcome.records[0].get("numero"), Some(&json!(717)));

    // Same answer when a super admin does the restore
    let root = Principal::super_admin(None, "root");
    fx.request(WORK_ORDERS, Some(&alice)).delete(old.id().unwrap(), None).await?;
    let outcome = fx.request(WORK_ORDERS, Some(&root)).restore(old.id().unwrap()).await?;
    assert!(outcome.reassigned.is_empty());
    Ok(())
}

#[tokio::test]
async fn batch_restore_assigns_distinct_keys() -> Result<()> {
    let fx = Fixture::new();
    let admin = Principal::admin(TenantId::new(), "gerente");
    let repo = fx.request(WORK_ORDERS, Some(&admin));

    for _ in 0..2 {
        let order = fx.work_order(&admin, 717).await?;
        repo.delete(order.id().unwrap(), None).await?;
    }
    fx.work_order(&admin, 717).await?;

    let outcome = repo.restore_where(json!({ "numero": 717 })).await?;
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(numbers(&outcome.records, "numero"), vec![718, 719]);

    let active = repo.select_any(FilterData::default()).await?;
    assert_eq!(numbers(&active, "numero"), vec![717, 718, 719]);
    Ok(())
}

#[tokio::test]
async fn cascade_restores_sale_and_items_together() -> Result<()> {
    let fx = Fixture::new();
    let admin = Principal::admin(TenantId::new(), "caixa");
    let sales = fx.request(SALES, Some(&admin));
    let items = fx.request(SALE_ITEMS, Some(&admin));

    let sale = sales.create(json!({ "numero": 42, "total": 30.0 })).await?;
    let sale_id = sale.id().unwrap();
    let created = items
        .create_all(vec![
            json!({ "sale_id": sale_id.to_string(), "quantidade": 1 }),
            json!({ "sale_id": sale_id.to_string(), "quantidade": 2 }),
        ])
        .await?;

    let removed = SoftDeleteService::new(sales.clone())
        .delete_cascade(sale_id, Some("venda cancelada"))
        .await?;
    assert_eq!(removed.children.get("sale_items").map(Vec::len), Some(created.len()));
    assert!(items.select_any(FilterData::default()).await?.is_empty());
    sales.create(json!({ "numero": 42, "total": 10.0 })).await?;

    let outcome = SoftDeleteService::new(sales.clone()).restore_cascade(sale_id).await?;
    assert_eq!(outcome.parent.reassigned.len(), 1);
    assert_eq!(outcome.parent.records[0].get("numero"), Some(&json!(43)));
    assert_eq!(outcome.children.get("sale_items").map(Vec::len), Some(2));

    assert_eq!(items.select_any(FilterData::default()).await?.len(), 2);
    assert_eq!(numbers(&sales.select_any(FilterData::default()).await?, "numero"), vec![42, 43]);
    Ok(())
}

#[tokio::test]
async fn cascade_restore_leaves_items_removed_before_the_sale() -> Result<()> {
    let fx = Fixture::new();
    let admin = Principal::admin(TenantId::new(), "caixa");
    let sales = fx.request(SALES, Some(&admin));
    let items = fx.request(SALE_ITEMS, Some(&admin));

    let sale = sales.create(json!({ "numero": 8, "total": 45.0 })).await?;
    let sale_id = sale.id().unwrap();
    let kept = items.create(json!({ "sale_id": sale_id.to_string(), "quantidade": 1 })).await?;
    let dropped = items.create(json!({ "sale_id": sale_id.to_string(), "quantidade": 5 })).await?;

    // Line removed from the sale on its own, well before the sale is cancelled
    items.delete(dropped.id().unwrap(), Some("item lançado errado")).await?;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let service = SoftDeleteService::new(sales.clone());
    let removed = service.delete_cascade(sale_id, Some("venda cancelada")).await?;
    assert_eq!(removed.children.get("sale_items").map(Vec::len), Some(1));

    let outcome = service.restore_cascade(sale_id).await?;
    let restored: Vec<_> = outcome.children["sale_items"].iter().filter_map(Record::id).collect();
    assert_eq!(restored, vec![kept.id().unwrap()]);

    let trashed = items.clone().only_trashed().select_any(FilterData::default()).await?;
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].id(), dropped.id());
    assert_eq!(trashed[0].get(DELETION_REASON), Some(&json!("item lançado errado")));
    Ok(())
}

#[tokio::test]
async fn cascade_of_an_active_parent_changes_nothing() -> Result<()> {
    let fx = Fixture::new();
    let admin = Principal::admin(TenantId::new(), "caixa");
    let sales = fx.request(SALES, Some(&admin));
    let items = fx.request(SALE_ITEMS, Some(&admin));

    let sale = sales.create(json!({ "numero": 7 })).await?;
    let sale_id = sale.id().unwrap();
    let item = items.create(json!({ "sale_id": sale_id.to_string(), "quantidade": 1 })).await?;
    items.delete(item.id().unwrap(), None).await?;

    let err = SoftDeleteService::new(sales).restore_cascade(sale_id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
    assert!(items.select_any(FilterData::default()).await?.is_empty());
    Ok(())
}
