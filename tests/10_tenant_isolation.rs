mod common;

use anyhow::Result;
use serde_json::json;

use common::Fixture;
use retail_core::database::entities::{CUSTOMERS, PRODUCTS, WORK_ORDERS};
use retail_core::database::repository::RepositoryError;
use retail_core::filter::FilterData;
use retail_core::tenancy::{ExecutionContext, Principal, TenantId};

#[tokio::test]
async fn tenants_never_see_each_others_rows() -> Result<()> {
    let fx = Fixture::new();
    let alice = Principal::member(TenantId::new(), "alice");
    let bob = Principal::member(TenantId::new(), "bob");

    let widget = fx.request(PRODUCTS, Some(&alice)).create(json!({ "nome": "Widget", "preco": 19.9 })).await?;
    assert_eq!(widget.tenant_id(), alice.tenant_id);

    let seen_by_bob = fx.request(PRODUCTS, Some(&bob)).select_any(FilterData::default()).await?;
    assert!(seen_by_bob.is_empty(), "bob saw {:?}", seen_by_bob);

    let id = widget.id().unwrap();
    let err = fx.request(PRODUCTS, Some(&bob)).select_id(id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));

    let seen_by_alice = fx.request(PRODUCTS, Some(&alice)).select_any(FilterData::default()).await?;
    assert_eq!(seen_by_alice.len(), 1);
    assert_eq!(seen_by_alice[0].get("nome"), Some(&json!("Widget")));
    Ok(())
}

#[tokio::test]
async fn forged_tenant_id_is_overridden_on_create() -> Result<()> {
    let fx = Fixture::new();
    let alice = Principal::member(TenantId::new(), "alice");
    let victim = TenantId::new();

    let customer = fx
        .request(CUSTOMERS, Some(&alice))
        .create(json!({ "nome": "Maria", "tenant_id": victim.to_string() }))
        .await?;
    assert_eq!(customer.tenant_id(), alice.tenant_id);

    let victim_admin = Principal::admin(victim, "victim-admin");
    let seen = fx.request(CUSTOMERS, Some(&victim_admin)).select_any(FilterData::default()).await?;
    assert!(seen.is_empty());
    Ok(())
}

#[tokio::test]
async fn super_admin_reads_across_tenants() -> Result<()> {
    let fx = Fixture::new();
    let (a, b) = (TenantId::new(), TenantId::new());
    fx.seed(PRODUCTS, a, json!({ "nome": "Widget" })).await?;
    fx.seed(PRODUCTS, b, json!({ "nome": "Gadget" })).await?;

    let root = Principal::super_admin(None, "root");
    let all = fx.request(PRODUCTS, Some(&root)).select_any(FilterData::default()).await?;
    assert_eq!(all.len(), 2);

    // A tenant admin is still confined to its tenant
    let admin = Principal::admin(a, "gerente");
    let own = fx.request(PRODUCTS, Some(&admin)).select_any(FilterData::default()).await?;
    assert_eq!(own.len(), 1);
    Ok(())
}

#[tokio::test]
async fn super_admin_creates_in_own_tenant() -> Result<()> {
    let fx = Fixture::new();
    let own = TenantId::new();
    let root = Principal::super_admin(Some(own), "root");

    let product = fx
        .request(PRODUCTS, Some(&root))
        .create(json!({ "nome": "Widget", "tenant_id": TenantId::new().to_string() }))
        .await?;
    assert_eq!(product.tenant_id(), Some(own));

    let tenantless = Principal::super_admin(None, "root");
    let err = fx
        .request(PRODUCTS, Some(&tenantless))
        .create(json!({ "nome": "Widget" }))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::TenantRequired(_)));
    Ok(())
}

#[tokio::test]
async fn unauthenticated_request_reads_nothing() -> Result<()> {
    let fx = Fixture::new();
    fx.seed(PRODUCTS, TenantId::new(), json!({ "nome": "Widget" })).await?;

    let rows = fx.request(PRODUCTS, None).select_any(FilterData::default()).await?;
    assert!(rows.is_empty());

    let err = fx.request(PRODUCTS, None).create(json!({ "nome": "Anon" })).await.unwrap_err();
    assert!(matches!(err, RepositoryError::TenantRequired(_)));

    // Tests outside setup mode are held to the request rules
    let strict = retail_core::database::repository::Repository::new(
        PRODUCTS,
        fx.dyn_store(),
        fx.pipeline.clone(),
        None,
        ExecutionContext::Test { open_setup: false },
    );
    assert!(strict.select_any(FilterData::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn background_job_sees_every_tenant_while_anonymous_request_sees_none() -> Result<()> {
    let fx = Fixture::new();
    for tenant in [TenantId::new(), TenantId::new()] {
        fx.seed(
            WORK_ORDERS,
            tenant,
            json!({ "numero": 1, "status": "aberta", "data_prevista": "2024-01-10" }),
        )
        .await?;
    }

    let overdue = FilterData {
        where_clause: Some(json!({
            "data_prevista": { "$lt": "2024-02-01" },
            "status": { "$nin": ["concluida", "cancelada"] }
        })),
        ..Default::default()
    };

    let job = fx.background(WORK_ORDERS).select_any(overdue.clone()).await?;
    assert_eq!(job.len(), 2);

    let anonymous = fx.request(WORK_ORDERS, None).select_any(overdue).await?;
    assert!(anonymous.is_empty());
    Ok(())
}

#[tokio::test]
async fn bypass_paired_with_explicit_tenant_filter() -> Result<()> {
    let fx = Fixture::new();
    let (a, b) = (TenantId::new(), TenantId::new());
    fx.seed(PRODUCTS, a, json!({ "nome": "Widget" })).await?;
    fx.seed(PRODUCTS, b, json!({ "nome": "Gadget" })).await?;

    let member = Principal::member(a, "alice");
    let catalog = fx.request(PRODUCTS, Some(&member)).without_tenant_scope();

    assert_eq!(catalog.select_any(FilterData::default()).await?.len(), 2);

    let only_b = catalog
        .select_any(FilterData {
            where_clause: Some(json!({ "tenant_id": b.to_string() })),
            ..Default::default()
        })
        .await?;
    assert_eq!(only_b.len(), 1);
    assert_eq!(only_b[0].get("nome"), Some(&json!("Gadget")));
    Ok(())
}

#[tokio::test]
async fn update_cannot_reparent_or_cross_tenants() -> Result<()> {
    let fx = Fixture::new();
    let alice = Principal::member(TenantId::new(), "alice");
    let bob = Principal::member(TenantId::new(), "bob");

    let product = fx.request(PRODUCTS, Some(&alice)).create(json!({ "nome": "Widget" })).await?;
    let id = product.id().unwrap();

    let updated = fx
        .request(PRODUCTS, Some(&alice))
        .update(id, json!({ "nome": "Widget 2", "tenant_id": bob.tenant_id.unwrap().to_string() }))
        .await?;
    assert_eq!(updated.tenant_id(), alice.tenant_id);
    assert_eq!(updated.get("nome"), Some(&json!("Widget 2")));

    let err = fx
        .request(PRODUCTS, Some(&bob))
        .update(id, json!({ "nome": "Hijacked" }))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));

    let err = fx.request(PRODUCTS, Some(&bob)).delete(id, None).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
    Ok(())
}
