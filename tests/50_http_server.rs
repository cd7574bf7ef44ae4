mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::json;

use common::Fixture;
use retail_core::app::{app, AppState};
use retail_core::auth::token_for;
use retail_core::tenancy::Principal;

/// Serve the router on an ephemeral port and return its base URL
async fn spawn_server(state: AppState) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state)).await;
    });
    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn work_order_lifecycle_over_http() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let fx = Fixture::new();
    let state = AppState::new(fx.dyn_store());
    let tenant = state.tenants.create("Assistência Técnica", Some("pro"), Some(10)).await?;
    let base_url = spawn_server(state).await?;
    let client = reqwest::Client::new();

    let admin = Principal::admin(tenant.id, "gerente");
    let token = token_for(&admin)?;

    let res = client
        .post(format!("{}/api/data/work_orders", base_url))
        .bearer_auth(&token)
        .json(&json!({ "numero": 717, "status": "aberta" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED, "unexpected status: {}", res.status());
    let body = res.json::<serde_json::Value>().await?;
    let old_id = body["data"]["id"].as_str().context("missing id")?.to_string();

    let res = client
        .delete(format!("{}/api/data/work_orders/{}", base_url, old_id))
        .bearer_auth(&token)
        .json(&json!({ "reason": "duplicada" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/api/data/work_orders", base_url))
        .bearer_auth(&token)
        .json(&json!({ "numero": 717, "status": "aberta" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(format!("{}/api/data/work_orders/{}/restore", base_url, old_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["reassigned"][0]["from"], 717);
    assert_eq!(body["data"]["reassigned"][0]["to"], 718);
    assert_eq!(body["data"]["records"][0]["numero"], 718);

    // Anonymous callers get an empty list, not an error
    let res = client.get(format!("{}/api/data/work_orders", base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"], json!([]));
    Ok(())
}
