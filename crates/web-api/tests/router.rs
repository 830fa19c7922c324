use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use refdata_data::{Repositories, UniverseSnapshotBuilder};
use refdata_services::MemoryQueue;
use refdata_web_api::{ApiServer, AppState, GatewayHeaderAuth};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const VIEWER: &str = "portfolio.viewer";
const ADMIN: &str = "portfolio.admin";

fn app_with_queue(queue: Arc<MemoryQueue>) -> Router {
    let state = AppState::new(
        &Repositories::in_memory(),
        queue,
        Arc::new(GatewayHeaderAuth::default()),
        UniverseSnapshotBuilder::default(),
    );
    ApiServer::new(state).router()
}

fn app() -> Router {
    app_with_queue(Arc::new(MemoryQueue::new()))
}

fn request(method: Method, uri: &str, tenant: Option<Uuid>, roles: &str, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(tenant) = tenant {
        builder = builder
            .header("x-tenant-id", tenant.to_string())
            .header("x-user-roles", roles)
            .header("x-user-id", "user-1");
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn universe_body(as_of: &str) -> Value {
    let constituents: Vec<Value> = (0..10)
        .map(|i| {
            json!({
                "ticker": format!("TK{}", char::from(b'A' + i as u8)),
                "freeFloatMarketCap": (10 - i) * 1_000_000,
                "sector": "Industrials",
                "cusip": "037833100",
                "isin": "US0378331005"
            })
        })
        .collect();
    json!({
        "asOfDate": as_of,
        "effectiveAt": format!("{as_of}T21:00:00Z"),
        "publishedAt": format!("{as_of}T21:30:00Z"),
        "source": "spdj",
        "constituents": constituents
    })
}

#[tokio::test]
async fn health_needs_no_identity() {
    let (status, body) = send(&app(), request(Method::GET, "/health", None, "", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let (status, body) = send(&app(), request(Method::GET, "/universe/current", None, "", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn roles_gate_reads_and_writes() {
    let app = app();
    let tenant = Some(Uuid::new_v4());

    let (status, body) = send(&app, request(Method::GET, "/universe/current", tenant, "billing.viewer", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = send(
        &app,
        request(Method::POST, "/universe/rebalance-job", tenant, VIEWER, Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_tenant_has_no_current_universe() {
    let (status, body) = send(
        &app(),
        request(Method::GET, "/universe/current", Some(Uuid::new_v4()), VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "universe_not_found");
}

#[tokio::test]
async fn ingested_universe_is_served_to_viewers() {
    let app = app();
    let tenant = Some(Uuid::new_v4());

    let (status, created) = send(
        &app,
        request(Method::POST, "/universe/snapshots", tenant, ADMIN, Some(universe_body("2024-03-29"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["hash"].as_str().unwrap().len(), 64);

    let (status, current) = send(
        &app,
        request(Method::GET, "/universe/current?includeConstituentMeta=true", tenant, VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["snapshotId"], created["snapshotId"]);
    assert_eq!(current["asOfDate"], "2024-03-29");
    let constituents = current["constituents"].as_array().unwrap();
    assert_eq!(constituents.len(), 10);
    assert_eq!(constituents[0]["position"], 1);
    assert_eq!(constituents[0]["ticker"], "TKA");
    assert_eq!(constituents[0]["cusip"], "037833100");

    let (_, plain) = send(&app, request(Method::GET, "/universe/current", tenant, VIEWER, None)).await;
    assert!(plain["constituents"][0].get("cusip").is_none());

    // Another tenant sees nothing.
    let (status, _) = send(
        &app,
        request(Method::GET, "/universe/current", Some(Uuid::new_v4()), VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_snapshot_input_is_rejected() {
    let app = app();
    let tenant = Some(Uuid::new_v4());
    let mut body = universe_body("2024-03-29");
    body["constituents"].as_array_mut().unwrap().pop();

    let (status, error) = send(&app, request(Method::POST, "/universe/snapshots", tenant, ADMIN, Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "cardinality_error");
    assert!(error["message"].as_str().unwrap().contains("10"));
}

#[tokio::test]
async fn history_validates_and_pages() {
    let app = app();
    let tenant = Some(Uuid::new_v4());
    for day in ["2024-01-31", "2024-02-29", "2024-03-29"] {
        let (status, _) = send(
            &app,
            request(Method::POST, "/universe/snapshots", tenant, ADMIN, Some(universe_body(day))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    for (uri, code) in [
        ("/universe/history?limit=0", "invalid_limit"),
        ("/universe/history?limit=101", "invalid_limit"),
        ("/universe/history?startDate=2024-1-1", "invalid_start_date"),
        ("/universe/history?endDate=yesterday", "invalid_end_date"),
        ("/universe/history?cursor=abc", "invalid_cursor"),
    ] {
        let (status, body) = send(&app, request(Method::GET, uri, tenant, VIEWER, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], code, "{uri}");
    }

    let (status, page) = send(
        &app,
        request(Method::GET, "/universe/history?limit=2&startDate=2024-01-01", tenant, VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["totalCount"], 3);
    let cursor = page["nextCursor"].as_str().unwrap().to_string();

    let (_, rest) = send(
        &app,
        request(
            Method::GET,
            &format!("/universe/history?limit=2&startDate=2024-01-01&cursor={cursor}"),
            tenant,
            VIEWER,
            None,
        ),
    )
    .await;
    assert_eq!(rest["items"].as_array().unwrap().len(), 1);
    assert!(rest["nextCursor"].is_null());
    assert_eq!(rest["items"][0]["asOfDate"], "2024-01-31");
}

#[tokio::test]
async fn rebalance_is_accepted_then_conflicts() {
    let app = app();
    let tenant = Some(Uuid::new_v4());
    let body = json!({ "effectiveDate": "2024-06-21" });

    let (status, accepted) = send(
        &app,
        request(Method::POST, "/universe/rebalance-job", tenant, ADMIN, Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["status"], "queued");
    assert_eq!(accepted["effectiveDate"], "2024-06-21");
    assert!(accepted["queueEventId"].is_string());

    let (status, conflict) = send(
        &app,
        request(Method::POST, "/universe/rebalance-job", tenant, ADMIN, Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["code"], "rebalance_conflict");

    let (status, forced) = send(
        &app,
        request(
            Method::POST,
            "/universe/rebalance-job",
            tenant,
            ADMIN,
            Some(json!({ "effectiveDate": "2024-06-21", "force": true })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_ne!(forced["queueEventId"], accepted["queueEventId"]);

    let job_uri = format!("/universe/rebalance-job/{}", accepted["jobId"].as_str().unwrap());
    let (status, job) = send(&app, request(Method::GET, &job_uri, tenant, VIEWER, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["triggeredBy"], "user-1");
    assert_eq!(job["source"], "manual_override");

    let (status, body) = send(&app, request(Method::GET, &job_uri, Some(Uuid::new_v4()), VIEWER, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "job_not_found");
}

#[tokio::test]
async fn rebalance_body_is_strict() {
    let app = app();
    let tenant = Some(Uuid::new_v4());

    let (status, body) = send(
        &app,
        request(Method::POST, "/universe/rebalance-job", tenant, ADMIN, Some(json!({ "priority": "high" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/universe/rebalance-job",
            tenant,
            ADMIN,
            Some(json!({ "effectiveDate": "21/06/2024" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let raw = Request::builder()
        .method(Method::POST)
        .uri("/universe/rebalance-job")
        .header("x-tenant-id", Uuid::new_v4().to_string())
        .header("x-user-roles", ADMIN)
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, raw).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_json");
}

#[tokio::test]
async fn queue_failure_is_internal_and_leaves_no_job() {
    let queue = Arc::new(MemoryQueue::failing());
    let app = app_with_queue(queue.clone());
    let tenant = Some(Uuid::new_v4());

    let (status, body) = send(
        &app,
        request(Method::POST, "/universe/rebalance-job", tenant, ADMIN, Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal_error");

    // Nothing was recorded, so a retry is not a duplicate.
    queue.set_failing(false);
    let (status, _) = send(
        &app,
        request(Method::POST, "/universe/rebalance-job", tenant, ADMIN, Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn price_reads_require_a_known_vendor() {
    let app = app();
    let tenant = Some(Uuid::new_v4());

    let (status, body) = send(&app, request(Method::GET, "/prices/latest", tenant, VIEWER, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_vendor");

    let (status, body) = send(
        &app,
        request(Method::GET, "/prices/latest?vendor=polygon", tenant, VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "snapshot_not_found");

    let price_body = json!({
        "asOfDate": "2024-01-02",
        "vendor": "polygon",
        "publishedAt": "2024-01-02T22:00:00Z",
        "prices": [{ "ticker": "AAPL", "mic": "XNAS", "close": 185.64, "volume": 82488700 }],
        "factors": [{ "ticker": "AAPL", "factorName": "momentum", "value": 0.42 }]
    });
    let (status, _) = send(&app, request(Method::POST, "/prices/snapshots", tenant, ADMIN, Some(price_body))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, latest) = send(
        &app,
        request(Method::GET, "/prices/latest?vendor=polygon", tenant, VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["snapshot"]["vendor"], "polygon");
    assert!((latest["prices"][0]["close"].as_f64().unwrap() - 185.64).abs() < 1e-9);

    let (_, series) = send(
        &app,
        request(Method::GET, "/prices/series?vendor=polygon&tickers=AAPL,MSFT", tenant, VIEWER, None),
    )
    .await;
    assert_eq!(series["items"][0]["asOfDate"], "2024-01-02");

    let (_, factors) = send(
        &app,
        request(Method::GET, "/factors/series?vendor=polygon&factorNames=momentum", tenant, VIEWER, None),
    )
    .await;
    assert_eq!(factors["items"][0]["factorName"], "momentum");

    let (status, actions) = send(&app, request(Method::GET, "/corporate-actions", tenant, VIEWER, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(actions["items"].as_array().unwrap().is_empty());
}
