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

async fn setup_test_app(trust_client_charges: bool, duplicate_window_ms: i64) -> TestApp {
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
        trust_client_charges,
        duplicate_window_ms,
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

// Jan 16 2024, both times on the same UTC day.
const ENTRY_MS: i64 = 1705396500000;
const EXIT_MS: i64 = 1705400100000;

fn closed_buy(symbol: &str) -> Value {
    json!({
        "symbol": symbol,
        "instrumentType": "EQUITY",
        "side": "BUY",
        "quantity": 10,
        "entryPrice": 100,
        "exitPrice": 110,
        "entryTimeMs": ENTRY_MS,
        "exitTimeMs": EXIT_MS,
    })
}

#[tokio::test]
async fn test_create_trade_computes_values_and_charges() {
    let test_app = setup_test_app(false, 0).await;

    let (status, body) = send_json(&test_app.app, "POST", "/api/trades", closed_buy("reliance")).await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(body["symbol"], "RELIANCE");
    assert_eq!(body["instrumentType"], "EQUITY");
    assert_eq!(body["entryValue"], 1000.0);
    assert_eq!(body["exitValue"], 1100.0);
    assert_eq!(body["turnover"], 2100.0);
    assert_eq!(body["grossPnl"], 100.0);
    assert_eq!(body["netPnl"], 51.48);
    assert_eq!(body["percentageReturn"], 5.148);
    assert_eq!(body["charges"]["brokerage"], 40.0);
    assert_eq!(body["charges"]["stt"], 1.1);
    assert_eq!(body["charges"]["total"], 48.52);
    assert!(body["tags"].as_array().unwrap().is_empty());
    assert!(body["id"].as_str().unwrap().len() > 10);
}

#[tokio::test]
async fn test_create_open_trade_has_no_pnl_fields() {
    let test_app = setup_test_app(false, 0).await;

    let mut draft = closed_buy("SBIN");
    draft.as_object_mut().unwrap().remove("exitPrice");
    draft.as_object_mut().unwrap().remove("exitTimeMs");

    let (status, body) = send_json(&test_app.app, "POST", "/api/trades", draft).await;
    assert_eq!(status, StatusCode::CREATED);

    let obj = body.as_object().unwrap();
    assert!(obj.get("exitValue").is_none());
    assert!(obj.get("grossPnl").is_none());
    assert!(obj.get("netPnl").is_none());
    assert!(obj.get("percentageReturn").is_none());
    // single-leg charges only
    assert_eq!(body["charges"]["brokerage"], 20.0);
    assert_eq!(body["turnover"], 1000.0);
}

#[tokio::test]
async fn test_create_trade_validation_itemizes_issues() {
    let test_app = setup_test_app(false, 0).await;

    let (status, body) = send_json(&test_app.app, "POST", "/api/trades", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");

    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|issue| issue["field"].as_str().unwrap())
        .collect();
    for field in [
        "symbol",
        "instrumentType",
        "side",
        "quantity",
        "entryPrice",
        "entryTimeMs",
    ] {
        assert!(fields.contains(&field), "missing issue for {}", field);
    }
}

#[tokio::test]
async fn test_create_trade_rejects_bad_values() {
    let test_app = setup_test_app(false, 0).await;

    let mut draft = closed_buy("SBIN");
    draft["quantity"] = json!(-5);
    draft["side"] = json!("HOLD");

    let (status, body) = send_json(&test_app.app, "POST", "/api/trades", draft).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|issue| issue["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"quantity"));
    assert!(fields.contains(&"side"));
}

#[tokio::test]
async fn test_duplicate_submission_within_window_conflicts() {
    let test_app = setup_test_app(false, 300_000).await;

    let (status, first) = send_json(&test_app.app, "POST", "/api/trades", closed_buy("TEST")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(&test_app.app, "POST", "/api/trades", closed_buy("TEST")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["tradeId"], first["id"]);
}

#[tokio::test]
async fn test_duplicate_guard_disabled_with_zero_window() {
    let test_app = setup_test_app(false, 0).await;

    let (status, _) = send_json(&test_app.app, "POST", "/api/trades", closed_buy("TEST")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send_json(&test_app.app, "POST", "/api/trades", closed_buy("TEST")).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_trade_with_tags_reuses_by_name() {
    let test_app = setup_test_app(false, 0).await;

    let mut draft = closed_buy("RELIANCE");
    draft["tags"] = json!([
        {"name": "Breakout", "kind": "STRATEGY"},
        {"name": "FOMO", "kind": "EMOTIONAL"},
    ]);
    let (status, first) = send_json(&test_app.app, "POST", "/api/trades", draft).await;
    assert_eq!(status, StatusCode::CREATED);

    let tags = first["tags"].as_array().unwrap();
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0]["name"], "Breakout");
    assert_eq!(tags[0]["kind"], "STRATEGY");
    let breakout_id = tags[0]["id"].as_str().unwrap().to_string();

    let mut draft = closed_buy("TCS");
    draft["tags"] = json!([{"name": "Breakout", "kind": "STRATEGY"}]);
    let (status, second) = send_json(&test_app.app, "POST", "/api/trades", draft).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["tags"][0]["id"], breakout_id.as_str());
}

#[tokio::test]
async fn test_create_options_trade_with_sub_records() {
    let test_app = setup_test_app(false, 0).await;

    let draft = json!({
        "symbol": "NIFTY24JAN21000CE",
        "instrumentType": "OPTIONS",
        "side": "BUY",
        "quantity": 50,
        "entryPrice": 100,
        "entryTimeMs": ENTRY_MS,
        "optionDetails": {
            "strikePrice": 21000,
            "expiryMs": 1706227200000i64,
            "lotSize": 50,
            "underlying": "NIFTY"
        },
        "hedge": {"quantity": 50, "entryPrice": 80}
    });
    let (status, body) = send_json(&test_app.app, "POST", "/api/trades", draft).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["optionDetails"]["strikePrice"], 21000.0);
    assert_eq!(body["optionDetails"]["lotSize"], 50);
    assert_eq!(body["hedge"]["entryPrice"], 80.0);

    // the sub-records survive a fresh read
    let id = body["id"].as_str().unwrap();
    let (status, fetched) = get(&test_app.app, &format!("/api/trades/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["optionDetails"]["underlying"], "NIFTY");
    assert_eq!(fetched["hedge"]["quantity"], 50.0);
}

#[tokio::test]
async fn test_option_details_rejected_for_equity() {
    let test_app = setup_test_app(false, 0).await;

    let mut draft = closed_buy("SBIN");
    draft["optionDetails"] = json!({
        "strikePrice": 21000,
        "expiryMs": 1706227200000i64,
        "lotSize": 50
    });
    let (status, body) = send_json(&test_app.app, "POST", "/api/trades", draft).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "optionDetails");
}

#[tokio::test]
async fn test_list_trades_filters() {
    let test_app = setup_test_app(false, 0).await;

    let mut a = closed_buy("RELIANCE");
    a["notes"] = json!("gap up open");
    send_json(&test_app.app, "POST", "/api/trades", a).await;

    let b = json!({
        "symbol": "NIFTY24JANFUT",
        "instrumentType": "FUTURES",
        "side": "BUY",
        "quantity": 50,
        "entryPrice": 21000,
        "entryTimeMs": 1705482900000i64,
    });
    send_json(&test_app.app, "POST", "/api/trades", b).await;

    let c = json!({
        "symbol": "TCS",
        "instrumentType": "EQUITY",
        "side": "SELL",
        "quantity": 5,
        "entryPrice": 4000,
        "exitPrice": 3900,
        "entryTimeMs": 1705569300000i64,
        "exitTimeMs": 1705572900000i64,
        "strategy": "Mean reversion",
    });
    send_json(&test_app.app, "POST", "/api/trades", c).await;

    // default ordering is entry time, newest first
    let (status, body) = get(&test_app.app, "/api/trades").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["trades"][0]["symbol"], "TCS");
    assert_eq!(body["trades"][2]["symbol"], "RELIANCE");

    let (_, body) = get(&test_app.app, "/api/trades?instrumentType=EQUITY").await;
    assert_eq!(body["pagination"]["total"], 2);

    let (_, body) = get(&test_app.app, "/api/trades?side=SELL").await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["trades"][0]["symbol"], "TCS");

    let (_, body) = get(&test_app.app, "/api/trades?search=gap").await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["trades"][0]["symbol"], "RELIANCE");

    let (_, body) = get(&test_app.app, "/api/trades?strategy=Mean%20reversion").await;
    assert_eq!(body["pagination"]["total"], 1);

    let (_, body) = get(&test_app.app, "/api/trades?dateFrom=1705482900000").await;
    assert_eq!(body["pagination"]["total"], 2);
}

#[tokio::test]
async fn test_list_trades_pagination_window() {
    let test_app = setup_test_app(false, 0).await;

    for symbol in ["A", "B", "C"] {
        send_json(&test_app.app, "POST", "/api/trades", closed_buy(symbol)).await;
    }

    let (_, body) = get(&test_app.app, "/api/trades?limit=2&page=2").await;
    assert_eq!(body["trades"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["limit"], 2);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["pages"], 2);
}

#[tokio::test]
async fn test_list_trades_sorts_net_pnl_numerically() {
    let test_app = setup_test_app(false, 0).await;

    send_json(&test_app.app, "POST", "/api/trades", closed_buy("WINNER")).await;

    let mut loser = closed_buy("LOSER");
    loser["exitPrice"] = json!(90);
    send_json(&test_app.app, "POST", "/api/trades", loser).await;

    let (_, body) = get(&test_app.app, "/api/trades?sortBy=netPnl&sortOrder=asc").await;
    assert_eq!(body["trades"][0]["symbol"], "LOSER");
    assert_eq!(body["trades"][0]["netPnl"], -148.32);
    assert_eq!(body["trades"][1]["netPnl"], 51.48);
}

#[tokio::test]
async fn test_list_trades_rejects_bad_query_params() {
    let test_app = setup_test_app(false, 0).await;

    let (status, _) = get(&test_app.app, "/api/trades?sortBy=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&test_app.app, "/api/trades?sortOrder=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&test_app.app, "/api/trades?instrumentType=CRYPTO").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&test_app.app, "/api/trades?dateFrom=2000&dateTo=1000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_trade_by_id() {
    let test_app = setup_test_app(false, 0).await;

    let (_, created) = send_json(&test_app.app, "POST", "/api/trades", closed_buy("TEST")).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = get(&test_app.app, &format!("/api/trades/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], created["id"]);
    assert_eq!(body["netPnl"], 51.48);

    let (status, _) = get(&test_app.app, "/api/trades/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_trade_removes_row() {
    let test_app = setup_test_app(false, 0).await;

    let (_, created) = send_json(&test_app.app, "POST", "/api/trades", closed_buy("TEST")).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = delete(&test_app.app, &format!("/api/trades/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"]["id"], id.as_str());
    // no pool on the trade, so nothing to reverse
    assert!(body["reversals"].as_array().unwrap().is_empty());

    let (status, _) = get(&test_app.app, &format!("/api/trades/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete(&test_app.app, &format!("/api/trades/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
