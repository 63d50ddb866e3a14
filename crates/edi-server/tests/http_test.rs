//! End-to-end HTTP behavior against the in-process database

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use edi_adapter_db::{DbConnection, edi_schema};
use edi_pipeline::Error;
use edi_profile::{PartnerProfile, RateLimitConfig};
use edi_server::config::ResilienceArgs;
use edi_server::decode::MAX_BODY_BYTES;
use edi_server::{ApiError, AppState, middleware, router};
use serde_json::{Value, json};
use tower::ServiceExt;

fn tender(control_number: &str) -> String {
    format!(
        "ISA*00*          *00*          *ZZ*SHIPPERCO      *ZZ*FASTFREIGHT    *240301*0915*^*00501*{control_number}*0*P*>~\
         GS*SM*SHIPPERCO*FASTFREIGHT*20240301*0915*120*X*005010~\
         ST*204*0001~\
         B2**FFRT**LOAD-1**PP~\
         N1*SH*SHIPPERCO DC*93*DC-01~\
         N1*CN*BIG BOX STORE 44~\
         SE*5*0001~\
         GE*1*120~\
         IEA*1*{control_number}~"
    )
}

async fn state_with(resilience: ResilienceArgs, rate_limit: Option<RateLimitConfig>) -> AppState {
    let db = DbConnection::memory();
    db.connect().await.unwrap();
    db.apply_schema(&edi_schema()).await.unwrap();

    let state = AppState::new(db, "edi-processor", &resilience);
    let mut profile = PartnerProfile::new("ACME", "Acme Shipping");
    profile.configuration.transaction_sets = vec!["204".to_string()];
    profile.configuration.rate_limit = rate_limit;
    state.profiles.save(profile).await.unwrap();
    state
}

async fn app() -> Router {
    router(state_with(ResilienceArgs::default(), None).await)
}

fn ingest(body: impl Into<Body>) -> Request<Body> {
    Request::post("/api/v1/process?partner_id=ACME")
        .header("content-type", "application/x12")
        .body(body.into())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_process_load_tender() {
    let app = app().await;
    let (status, body) = send(&app, ingest(tender("000000120"))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["document"]["status"], "processed");
    assert_eq!(body["document"]["control_number"], "000000120");
    assert_eq!(body["issues"], json!([]));

    let id = body["document"]["id"].as_str().unwrap().to_string();
    let (status, detail) = send(
        &app,
        Request::get(format!("/api/v1/documents/get?id={id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["transactions"].as_array().unwrap().len(), 1);
    let stops = detail["transactions"][0]["shipment"]["stops"].as_array().unwrap();
    assert_eq!(stops.len(), 2);
    assert_eq!(stops[0]["stop_number"], 1);
    assert_eq!(stops[1]["stop_number"], 2);
}

#[tokio::test]
async fn test_json_body_and_header_partner() {
    let app = app().await;
    let request = Request::post("/api/v1/process")
        .header("content-type", "application/json")
        .header("x-partner-id", "ACME")
        .body(Body::from(json!({"edi_content": tender("000000130")}).to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["document"]["partner_id"], "ACME");
}

#[tokio::test]
async fn test_duplicate_submission_is_conflict() {
    let app = app().await;
    let (first, _) = send(&app, ingest(tender("000000121"))).await;
    assert_eq!(first, StatusCode::OK);

    let (status, body) = send(&app, ingest(tender("000000121"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");
    assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_unknown_partner() {
    let app = app().await;
    let request = Request::post("/api/v1/process?partner_id=NOPE")
        .header("content-type", "text/plain")
        .body(Body::from(tender("000000122")))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(body["message"], "partner not found");
    assert_eq!(body["details"]["fields"][0]["field"], "partner_id");

    let (_, listed) = send(&app, Request::get("/api/v1/documents").body(Body::empty()).unwrap()).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_request_validation() {
    let app = app().await;

    let missing_partner = Request::post("/api/v1/process")
        .header("content-type", "application/x12")
        .body(Body::from(tender("000000123")))
        .unwrap();
    assert_eq!(send(&app, missing_partner).await.0, StatusCode::BAD_REQUEST);

    let wrong_type = Request::post("/api/v1/process?partner_id=ACME")
        .header("content-type", "application/xml")
        .body(Body::from(tender("000000123")))
        .unwrap();
    let (status, body) = send(&app, wrong_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["fields"][0]["field"], "Content-Type");

    let bad_id = Request::get("/api/v1/documents/get?id=nope").body(Body::empty()).unwrap();
    assert_eq!(send(&app, bad_id).await.0, StatusCode::BAD_REQUEST);

    let unknown = Request::get(format!("/api/v1/documents/get?id={}", uuid::Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, unknown).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_body_over_limit_is_refused() {
    let app = app().await;
    let (status, body) = send(&app, ingest(vec![b'X'; 11 * 1024 * 1024])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("10 MiB"));

    let (status, _) = send(&app, ingest(vec![b'X'; MAX_BODY_BYTES + 1])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = send(&app, Request::get("/api/v1/documents").body(Body::empty()).unwrap()).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_list_limit_bounds() {
    let app = app().await;
    let list = |query: &str| {
        Request::get(format!("/api/v1/documents?{query}"))
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, list("limit=0")).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, list("limit=1001")).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, list("offset=-1")).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, list("limit=abc")).await.0, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, list("limit=1000")).await.0, StatusCode::OK);
    assert_eq!(send(&app, list("partner_id=ACME&limit=10&offset=0")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_and_security_headers() {
    let app = app().await;
    let request = Request::get("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "req-42");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["content-type"], "application/json; charset=utf-8");

    let generated = app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let id = generated.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "edi-processor"}));
}

#[tokio::test(start_paused = true)]
async fn test_partner_rate_limit() {
    let limit = RateLimitConfig {
        requests_per_second: 2.0,
        burst: 2,
    };
    let app = router(state_with(ResilienceArgs::default(), Some(limit)).await);

    let (first, _) = send(&app, ingest(tender("000000140"))).await;
    let (second, _) = send(&app, ingest(tender("000000141"))).await;
    let (third, body) = send(&app, ingest(tender("000000142"))).await;
    assert_eq!((first, second, third), (StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS));
    assert_eq!(body["error"], "RATE_LIMITED");

    tokio::time::advance(Duration::from_millis(500)).await;
    let (fourth, _) = send(&app, ingest(tender("000000142"))).await;
    assert_eq!(fourth, StatusCode::OK);
}

#[tokio::test]
async fn test_full_bulkhead_refuses() {
    let resilience = ResilienceArgs {
        bulkhead_capacity: 0,
        ..ResilienceArgs::default()
    };
    let app = router(state_with(resilience, None).await);
    let (status, body) = send(&app, ingest(tender("000000150"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "SERVICE_UNAVAILABLE");

    // health sits outside the guarded routes
    let (status, _) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_endpoints() {
    let app = app().await;
    let document = json!({
        "partner_id": "GLOBEX",
        "partner_name": "Globex Freight",
        "active": true,
        "configuration": {
            "format": {
                "version": "005010",
                "delimiters": {"element": "*", "segment": "~", "sub_element": ">", "repetition": "^"}
            },
            "transaction_sets": ["204"]
        }
    });
    let import = Request::post("/api/v1/profiles/import")
        .header("content-type", "application/json")
        .body(Body::from(document.to_string()))
        .unwrap();
    let (status, body) = send(&app, import).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["partner_id"], "GLOBEX");

    let (_, listed) = send(&app, Request::get("/api/v1/profiles").body(Body::empty()).unwrap()).await;
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["partner_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Acme Shipping", "Globex Freight"]);

    let (status, exported) = send(
        &app,
        Request::get("/api/v1/profiles/export?partner_id=GLOBEX").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exported["configuration"]["format"]["delimiters"]["element"], "*");

    let (status, _) = send(
        &app,
        Request::delete("/api/v1/profiles/delete?partner_id=GLOBEX").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Request::get("/api/v1/profiles/get?partner_id=GLOBEX").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_profile_import() {
    let app = app().await;
    let document = json!({
        "partner_id": "BADDELIM",
        "partner_name": "Bad Delimiters",
        "configuration": {
            "format": {"delimiters": {"element": "*", "segment": "*", "sub_element": ">", "repetition": "^"}}
        }
    });
    let import = Request::post("/api/v1/profiles/import")
        .header("content-type", "application/json")
        .body(Body::from(document.to_string()))
        .unwrap();
    let (status, body) = send(&app, import).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["details"]["fields"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_acknowledgment_endpoint() {
    let app = app().await;
    let (_, body) = send(&app, ingest(tender("000000160"))).await;
    let id = body["document"]["id"].as_str().unwrap().to_string();

    let ack = || {
        Request::post(format!("/api/v1/documents/ack?id={id}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, first) = send(&app, ack()).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["ack_type"], "997");
    assert!(first["ack_content"].as_str().unwrap().contains("AK5*A"));

    let (_, second) = send(&app, ack()).await;
    assert_eq!(second["id"], first["id"]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_endpoint_times_out() {
    let state = state_with(ResilienceArgs::default(), None).await;
    let app = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                "late"
            }),
        )
        .layer(from_fn_with_state(state.clone(), middleware::enforce_timeout))
        .with_state(state);

    let (status, body) = send(&app, Request::get("/slow").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "request timed out");
}

async fn boom() -> &'static str {
    panic!("secret detail")
}

#[tokio::test]
async fn test_panics_become_sanitized_500() {
    let app: Router = Router::new()
        .route("/boom", get(boom))
        .layer(from_fn(middleware::recover_panics))
        .layer(from_fn(middleware::request_id));

    let response = app
        .oneshot(
            Request::get("/boom")
                .header("x-request-id", "req-boom")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "an internal error occurred");
    assert_eq!(body["request_id"], "req-boom");
}

#[tokio::test]
async fn test_breaker_opens_after_server_errors() {
    let state = state_with(ResilienceArgs::default(), None).await;
    let app = Router::new()
        .route(
            "/flaky",
            get(|| async { Err::<(), _>(ApiError(Error::unavailable("database is locked"))) }),
        )
        .layer(from_fn_with_state(state.clone(), middleware::circuit_breaker))
        .with_state(state);

    for _ in 0..3 {
        let (_, body) = send(&app, Request::get("/flaky").body(Body::empty()).unwrap()).await;
        assert_eq!(body["message"], "database is locked");
    }
    let (status, body) = send(&app, Request::get("/flaky").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "service temporarily unavailable, circuit open");
}
