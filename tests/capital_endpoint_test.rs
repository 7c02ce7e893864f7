use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use tradelog::api::{self, AppState};
use tradelog::config::Config;
use tradelog::db::init_db;
use tradelog::{Orchestrator, Repository};

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        trust_client_charges: false,
        duplicate_window_ms: 0,
    };
    let orchestrator = Arc::new(Orchestrator::new(repo.clone(), &config));
    let app = api::create_router(AppState::new(repo, orchestrator));

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

async fn delete(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "DELETE", uri, None).await
}

async fn send_json(app: &axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, method, uri, Some(body)).await
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Create pools through the setup endpoint, returning their ids in order.
async fn setup_pools(app: &axum::Router, pools: Value) -> Vec<String> {
    let (status, body) = send_json(app, "POST", "/api/capital/setup", json!({ "pools": pools })).await;
    assert_eq!(status, StatusCode::CREATED, "setup failed: {}", body);
    body["pools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

fn pool_by_name<'a>(body: &'a Value, name: &str) -> &'a Value {
    body["pools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == name)
        .unwrap_or_else(|| panic!("no pool named {}", name))
}

#[tokio::test]
async fn test_setup_creates_pools_with_seed_deposits() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(
        &test_app.app,
        json!([
            {"name": "Growth", "initialAmount": 100000},
            {"name": "Options", "initialAmount": 50000},
        ]),
    )
    .await;
    assert_eq!(ids.len(), 2);

    let (status, body) = get(&test_app.app, "/api/capital/pools").await;
    assert_eq!(status, StatusCode::OK);
    let growth = pool_by_name(&body, "Growth");
    assert_eq!(growth["initialAmount"], 100000.0);
    assert_eq!(growth["currentAmount"], 100000.0);
    assert_eq!(growth["totalInvested"], 0.0);
    assert_eq!(growth["totalPnl"], 0.0);
    assert_eq!(growth["isActive"], true);

    // each funded pool opens its ledger with a seed deposit
    let (_, body) = get(
        &test_app.app,
        &format!("/api/capital/transactions?poolId={}", ids[0]),
    )
    .await;
    assert_eq!(body["pagination"]["total"], 1);
    let seed = &body["transactions"][0];
    assert_eq!(seed["kind"], "DEPOSIT");
    assert_eq!(seed["amount"], 100000.0);
    assert_eq!(seed["balanceAfter"], 100000.0);
    assert_eq!(seed["description"], "Initial allocation");
    assert!(seed.as_object().unwrap().get("tradeId").is_none());
}

#[tokio::test]
async fn test_setup_zero_amount_pool_has_no_seed_row() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(&test_app.app, json!([{"name": "Parked", "initialAmount": 0}])).await;

    let (_, body) = get(
        &test_app.app,
        &format!("/api/capital/transactions?poolId={}", ids[0]),
    )
    .await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_setup_rejects_duplicate_names() {
    let test_app = setup_test_app().await;

    setup_pools(&test_app.app, json!([{"name": "Growth", "initialAmount": 1000}])).await;

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/setup",
        json!({"pools": [{"name": "Growth", "initialAmount": 2000}]}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("pool name already in use"));

    // an in-batch duplicate aborts the whole setup
    let (status, _) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/setup",
        json!({"pools": [
            {"name": "A", "initialAmount": 10},
            {"name": "A", "initialAmount": 20},
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = get(&test_app.app, "/api/capital/pools").await;
    assert_eq!(body["pools"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_setup_validation() {
    let test_app = setup_test_app().await;

    let (status, body) =
        send_json(&test_app.app, "POST", "/api/capital/setup", json!({"pools": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("must not be empty"));

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/setup",
        json!({"pools": [{"name": "  ", "initialAmount": 1000}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("pools[0].name"));

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/setup",
        json!({"pools": [{"name": "Growth", "initialAmount": -5}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("pools[0].initialAmount"));
}

#[tokio::test]
async fn test_update_pool() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(
        &test_app.app,
        json!([
            {"name": "Growth", "initialAmount": 1000},
            {"name": "Options", "initialAmount": 1000},
        ]),
    )
    .await;

    let uri = format!("/api/capital/pools/{}", ids[0]);
    let (status, body) = send_json(&test_app.app, "PUT", &uri, json!({"name": "War Chest"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "War Chest");

    let (status, body) = send_json(&test_app.app, "PUT", &uri, json!({"isActive": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isActive"], false);
    assert_eq!(body["name"], "War Chest");

    let (status, _) = send_json(&test_app.app, "PUT", &uri, json!({"name": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // renaming onto a sibling's name conflicts
    let (status, _) = send_json(&test_app.app, "PUT", &uri, json!({"name": "Options"})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send_json(
        &test_app.app,
        "PUT",
        "/api/capital/pools/missing",
        json!({"name": "X"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_transaction_moves_balance() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(&test_app.app, json!([{"name": "Growth", "initialAmount": 100000}])).await;

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transactions",
        json!({"poolId": ids[0], "kind": "DEPOSIT", "amount": 5000, "description": "Monthly top-up"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["kind"], "DEPOSIT");
    assert_eq!(body["amount"], 5000.0);
    assert_eq!(body["balanceAfter"], 105000.0);
    assert_eq!(body["description"], "Monthly top-up");

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transactions",
        json!({"poolId": ids[0], "kind": "WITHDRAWAL", "amount": 30000}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balanceAfter"], 75000.0);

    let (_, body) = get(&test_app.app, "/api/capital/pools").await;
    let growth = pool_by_name(&body, "Growth");
    assert_eq!(growth["currentAmount"], 75000.0);
    assert_eq!(growth["totalWithdrawn"], 30000.0);
}

#[tokio::test]
async fn test_add_transaction_validation() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(&test_app.app, json!([{"name": "Growth", "initialAmount": 1000}])).await;

    for kind in ["BONUS", "TRANSFER_IN"] {
        let (status, body) = send_json(
            &test_app.app,
            "POST",
            "/api/capital/transactions",
            json!({"poolId": ids[0], "kind": kind, "amount": 100}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "kind {} accepted", kind);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("kind must be one of"));
    }

    let (status, _) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transactions",
        json!({"poolId": ids[0], "kind": "DEPOSIT", "amount": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transactions",
        json!({"poolId": "missing", "kind": "DEPOSIT", "amount": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_withdrawal_exceeding_balance_rejected() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(&test_app.app, json!([{"name": "Small", "initialAmount": 500}])).await;

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transactions",
        json!({"poolId": ids[0], "kind": "WITHDRAWAL", "amount": 600}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Insufficient balance"));

    // nothing was applied
    let (_, body) = get(&test_app.app, "/api/capital/pools").await;
    assert_eq!(pool_by_name(&body, "Small")["currentAmount"], 500.0);
    let (_, body) = get(&test_app.app, "/api/capital/transactions").await;
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_reverse_transaction_appends_compensating_row() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(&test_app.app, json!([{"name": "Growth", "initialAmount": 100000}])).await;

    let (_, deposit) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transactions",
        json!({"poolId": ids[0], "kind": "DEPOSIT", "amount": 5000}),
    )
    .await;
    let deposit_id = deposit["id"].as_str().unwrap().to_string();

    let (status, comp) = delete(
        &test_app.app,
        &format!("/api/capital/transactions/{}", deposit_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comp["kind"], "WITHDRAWAL");
    assert_eq!(comp["amount"], 5000.0);
    assert_eq!(comp["balanceAfter"], 100000.0);
    assert_eq!(comp["reverses"], deposit_id.as_str());
    assert_eq!(
        comp["description"],
        format!("Reversal of {}", deposit_id).as_str()
    );

    // the original row keeps its history and gains the marker
    let (_, body) = get(
        &test_app.app,
        &format!("/api/capital/transactions?poolId={}", ids[0]),
    )
    .await;
    assert_eq!(body["pagination"]["total"], 3);
    let original = body["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == deposit_id.as_str())
        .unwrap();
    assert_eq!(original["reversedBy"], comp["id"]);
    assert_eq!(original["amount"], 5000.0);

    let (_, body) = get(&test_app.app, "/api/capital/pools").await;
    assert_eq!(pool_by_name(&body, "Growth")["currentAmount"], 100000.0);

    // reversing twice, or reversing the compensation, is refused
    let (status, _) = delete(
        &test_app.app,
        &format!("/api/capital/transactions/{}", deposit_id),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let comp_id = comp["id"].as_str().unwrap();
    let (status, _) = delete(
        &test_app.app,
        &format!("/api/capital/transactions/{}", comp_id),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = delete(&test_app.app, "/api/capital/transactions/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transfer_moves_between_pools() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(
        &test_app.app,
        json!([
            {"name": "Growth", "initialAmount": 100000},
            {"name": "Options", "initialAmount": 50000},
        ]),
    )
    .await;

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transfer",
        json!({"fromPoolId": ids[0], "toPoolId": ids[1], "amount": 20000}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transferOut"]["kind"], "TRANSFER_OUT");
    assert_eq!(body["transferOut"]["balanceAfter"], 80000.0);
    assert_eq!(body["transferOut"]["description"], "Transfer to Options");
    assert_eq!(body["transferIn"]["kind"], "TRANSFER_IN");
    assert_eq!(body["transferIn"]["balanceAfter"], 70000.0);
    assert_eq!(body["transferIn"]["description"], "Transfer from Growth");

    let (_, body) = get(&test_app.app, "/api/capital/pools").await;
    let growth = pool_by_name(&body, "Growth");
    assert_eq!(growth["currentAmount"], 80000.0);
    // transfers are rebalancing, not withdrawals
    assert_eq!(growth["totalWithdrawn"], 0.0);
    assert_eq!(pool_by_name(&body, "Options")["currentAmount"], 70000.0);
}

#[tokio::test]
async fn test_transfer_validation() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(
        &test_app.app,
        json!([
            {"name": "Growth", "initialAmount": 1000},
            {"name": "Options", "initialAmount": 1000},
        ]),
    )
    .await;

    let (status, body) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transfer",
        json!({"fromPoolId": ids[0], "toPoolId": ids[0], "amount": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("must differ"));

    let (status, _) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transfer",
        json!({"fromPoolId": ids[0], "toPoolId": ids[1], "amount": 0}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transfer",
        json!({"fromPoolId": ids[0], "toPoolId": ids[1], "amount": 5000}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = get(&test_app.app, "/api/capital/pools").await;
    assert_eq!(pool_by_name(&body, "Growth")["currentAmount"], 1000.0);
    assert_eq!(pool_by_name(&body, "Options")["currentAmount"], 1000.0);

    let (status, _) = send_json(
        &test_app.app,
        "POST",
        "/api/capital/transfer",
        json!({"fromPoolId": "missing", "toPoolId": ids[1], "amount": 100}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_transactions_listing_scope_and_paging() {
    let test_app = setup_test_app().await;

    let ids = setup_pools(
        &test_app.app,
        json!([
            {"name": "Growth", "initialAmount": 100000},
            {"name": "Options", "initialAmount": 50000},
        ]),
    )
    .await;
    for amount in [200, 300] {
        send_json(
            &test_app.app,
            "POST",
            "/api/capital/transactions",
            json!({"poolId": ids[0], "kind": "DEPOSIT", "amount": amount}),
        )
        .await;
    }

    let (_, body) = get(&test_app.app, "/api/capital/transactions").await;
    assert_eq!(body["pagination"]["total"], 4);

    // scoped to one pool, newest first
    let (_, body) = get(
        &test_app.app,
        &format!("/api/capital/transactions?poolId={}", ids[0]),
    )
    .await;
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["transactions"][0]["amount"], 300.0);
    assert_eq!(body["transactions"][2]["description"], "Initial allocation");

    let (_, body) = get(
        &test_app.app,
        &format!("/api/capital/transactions?poolId={}&limit=2&page=2", ids[0]),
    )
    .await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["pages"], 2);

    // blank poolId means unscoped
    let (_, body) = get(&test_app.app, "/api/capital/transactions?poolId=").await;
    assert_eq!(body["pagination"]["total"], 4);
}
