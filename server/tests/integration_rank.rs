use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rank_core::persist::{save_catalog, save_meta, CatalogPaths, MetaFile};
use rank_core::{CatalogRecord, Category};
use rank_server::{build_app, AppConfig};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn laptop(id: &str, brand: &str, price: f64, score: f64) -> CatalogRecord {
    Category::ALL
        .into_iter()
        .fold(CatalogRecord::new(id, brand, price), |r, c| r.with_score(c, score))
}

fn write_snapshot(dir: &Path, records: &[CatalogRecord]) {
    let paths = CatalogPaths::new(dir);
    save_catalog(&paths, records).unwrap();
    let meta = MetaFile { num_records: records.len() as u32, created_at: "2024-01-01T00:00:00Z".into(), version: 1 };
    save_meta(&paths, &meta).unwrap();
}

fn tiny_catalog() -> Vec<CatalogRecord> {
    vec![
        laptop("a", "Acer", 1000.0, 5.0).with_gpu("Intel Iris Xe").with_display("14\""),
        laptop("b", "Apple", 2000.0, 9.0).with_gpu("Apple M3").with_display("16.2\""),
        laptop("c", "Dell", 1500.0, 7.0).with_gpu("GeForce RTX 4060").with_display("15.6\""),
    ]
}

fn app(dir: &Path, admin_token: Option<&str>) -> Router {
    build_app(AppConfig {
        catalog_dir: dir.to_path_buf(),
        admin_token: admin_token.map(str::to_string),
        cors_allow_origin: None,
    })
    .unwrap()
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn ids(json: &Value) -> Vec<String> {
    json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap().to_string()).collect()
}

#[tokio::test]
async fn rank_orders_by_weighted_score() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path(), &tiny_catalog());
    let app = app(dir.path(), None);

    let body = json!({ "weights": { "performance": 5, "battery": 5, "build_quality": 5, "display": 5, "audio": 5, "portability": 5 } });
    let (status, json) = call(&app, post_json("/rank", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&json), vec!["b", "c", "a"]);
    assert_eq!(json["total_hits"], 3);
    assert_eq!(json["results"][0]["rank"], 1);
    assert_eq!(json["results"][0]["weighted_score"], 9.0);
}

#[tokio::test]
async fn rank_applies_filters_and_k() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path(), &tiny_catalog());
    let app = app(dir.path(), None);

    let body = json!({
        "weights": { "price": 10, "performance": 1, "battery": 1, "build_quality": 1, "display": 1, "audio": 1, "portability": 1 },
        "filters": { "price": { "min": 1000, "max": 1500 } },
        "k": 1
    });
    let (status, json) = call(&app, post_json("/rank", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    assert_eq!(ids(&json), vec!["a"]);

    let body = json!({ "filters": { "gpus": ["rtx"], "display_sizes": [15] } });
    let (_, json) = call(&app, post_json("/rank", body)).await;
    assert_eq!(ids(&json), vec!["c"]);
}

#[tokio::test]
async fn rank_rejects_out_of_range_weights() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path(), &tiny_catalog());
    let app = app(dir.path(), None);

    let (status, _) = call(&app, post_json("/rank", json!({ "weights": { "performance": 50 } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, post_json("/rank", json!({ "weights": { "battery": -40 } }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, post_json("/rank", json!({ "weights": { "performance": 10, "price": 0 } }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn facets_and_lookup() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path(), &tiny_catalog());
    let app = app(dir.path(), None);

    let (status, json) = call(&app, Request::get("/facets").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["brands"], json!(["Acer", "Apple", "Dell"]));
    assert_eq!(json["gpu_families"], json!(["RTX 40-series", "Integrated"]));
    assert_eq!(json["price"], json!({ "min": 1000.0, "max": 2000.0 }));
    assert_eq!(json["gpu_family_tokens"]["RTX 40-series"], json!(["rtx 40"]));

    let gpus = json["gpu_family_tokens"]["RTX 40-series"].clone();
    let (_, ranked) = call(&app, post_json("/rank", json!({ "filters": { "gpus": gpus } }))).await;
    assert_eq!(ids(&ranked), vec!["c"]);

    let (status, json) = call(&app, Request::get("/laptops/c").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["brand"], "Dell");

    let (status, _) = call(&app, Request::get("/laptops/zzz").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preferences_are_sanitized() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path(), &tiny_catalog());
    let app = app(dir.path(), None);

    let (status, json) = call(&app, post_json("/preferences", json!({ "battery": 10, "performance": 42, "price": "cheap" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["weights"]["battery"], 10.0);
    assert_eq!(json["weights"]["performance"], 5.0);
    assert_eq!(json["weights"]["price"], 5.0);
    assert_eq!(json["price_range"], Value::Null);
}

#[tokio::test]
async fn reload_requires_token_and_picks_up_new_catalog() {
    let dir = tempdir().unwrap();
    write_snapshot(dir.path(), &tiny_catalog());
    let app = app(dir.path(), Some("s3cret"));

    let (_, before) = call(&app, post_json("/rank", json!({}))).await;
    assert_eq!(before["catalog_version"], 1);
    assert_eq!(before["total_hits"], 3);

    let (status, _) = call(&app, post_json("/catalog/reload", json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    write_snapshot(dir.path(), &[laptop("only", "HP", 700.0, 6.0)]);
    let req = Request::post("/catalog/reload").header("X-ADMIN-TOKEN", "s3cret").body(Body::empty()).unwrap();
    let (status, json) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["catalog_version"], 2);

    let (_, after) = call(&app, post_json("/rank", json!({}))).await;
    assert_eq!(after["catalog_version"], 2);
    assert_eq!(ids(&after), vec!["only"]);
}
