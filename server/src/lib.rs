use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::{Mutex, RwLock};
use rank_core::persist::{load_snapshot, CatalogPaths};
use rank_core::{CatalogRecord, Facets, FilterCriteria, Preference, RankingOptions, RankingPipeline, WeightVector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankRequest {
    /// Neutral weights (all 5, price 5) when absent.
    pub weights: Option<WeightVector>,
    pub filters: FilterCriteria,
    pub options: RankingOptions,
    /// Truncate results after ranking; `total_hits` still counts every match.
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct RankResponse {
    pub catalog_version: u64,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Arc<Vec<RankedHit>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedHit {
    pub rank: usize,
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub price_score: f64,
    pub weighted_score: f64,
}

#[derive(Deserialize)]
pub struct FacetParams {
    #[serde(default)]
    pub round_price_bounds: bool,
}

pub struct AppConfig {
    pub catalog_dir: PathBuf,
    pub admin_token: Option<String>,
    /// Comma-separated allowed origins; any origin when unset or empty.
    pub cors_allow_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env(catalog_dir: impl Into<PathBuf>) -> Self {
        Self {
            catalog_dir: catalog_dir.into(),
            admin_token: std::env::var("ADMIN_TOKEN").ok(),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        }
    }
}

struct LoadedCatalog {
    version: u64,
    records: Arc<Vec<CatalogRecord>>,
}

// Last /rank answer, keyed by catalog version and the request value.
struct Memo {
    version: u64,
    request: String,
    total_hits: usize,
    results: Arc<Vec<RankedHit>>,
}

#[derive(Clone)]
pub struct AppState {
    catalog_dir: PathBuf,
    catalog: Arc<RwLock<LoadedCatalog>>,
    memo: Arc<Mutex<Option<Memo>>>,
    admin_token: Option<String>,
}

impl AppState {
    fn records(&self) -> (u64, Arc<Vec<CatalogRecord>>) {
        let guard = self.catalog.read();
        (guard.version, Arc::clone(&guard.records))
    }
}

pub fn build_app(config: AppConfig) -> Result<Router> {
    // Load the snapshot at startup
    let (records, meta) = load_snapshot(&CatalogPaths::new(&config.catalog_dir))?;
    tracing::info!(num_records = records.len(), created_at = %meta.created_at, "catalog loaded");
    let app_state = AppState {
        catalog_dir: config.catalog_dir,
        catalog: Arc::new(RwLock::new(LoadedCatalog { version: 1, records: Arc::new(records) })),
        memo: Arc::new(Mutex::new(None)),
        admin_token: config.admin_token,
    };

    let cors = match config.cors_allow_origin {
        Some(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/rank", post(rank_handler))
        .route("/facets", get(facets_handler))
        .route("/laptops/:id", get(laptop_handler))
        .route("/preferences", post(preferences_handler))
        .route("/catalog/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn rank_handler(State(state): State<AppState>, Json(req): Json<RankRequest>) -> Result<Json<RankResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let weights = req.weights.unwrap_or_else(WeightVector::neutral);
    weights.validate().map_err(|e| (StatusCode::BAD_REQUEST, format!("{e:#}")))?;
    let (version, records) = state.records();
    let key = serde_json::to_string(&req).unwrap_or_default();

    {
        let memo = state.memo.lock();
        if let Some(m) = memo.as_ref().filter(|m| m.version == version && m.request == key) {
            tracing::debug!(version, "rank served from memo");
            return Ok(Json(RankResponse {
                catalog_version: version,
                took_s: start.elapsed().as_secs_f64(),
                total_hits: m.total_hits,
                results: Arc::clone(&m.results),
            }));
        }
    }

    let ranked = RankingPipeline::new(req.options).rank(&records, &weights, &req.filters);
    let total_hits = ranked.len();
    let k = req.k.unwrap_or(total_hits);
    let results: Arc<Vec<RankedHit>> = Arc::new(
        ranked
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, s)| RankedHit { rank: i + 1, record: s.record.clone(), price_score: s.price_score, weighted_score: s.weighted_score })
            .collect(),
    );

    *state.memo.lock() = Some(Memo { version, request: key, total_hits, results: Arc::clone(&results) });

    Ok(Json(RankResponse { catalog_version: version, took_s: start.elapsed().as_secs_f64(), total_hits, results }))
}

pub async fn facets_handler(State(state): State<AppState>, Query(params): Query<FacetParams>) -> Json<Facets> {
    let (_, records) = state.records();
    let options = RankingOptions { round_price_bounds: params.round_price_bounds, ..RankingOptions::default() };
    Json(RankingPipeline::new(options).facets(&records))
}

pub async fn laptop_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<CatalogRecord>, (StatusCode, String)> {
    let (_, records) = state.records();
    records
        .iter()
        .find(|r| r.id == id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("no laptop with id {id}")))
}

/// Sanitizes the JSON an inference service produced from free text.
pub async fn preferences_handler(Json(payload): Json<serde_json::Value>) -> Json<Preference> {
    Json(Preference::from_inference(&payload))
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let (records, _meta) = load_snapshot(&CatalogPaths::new(&state.catalog_dir))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("reload failed: {e:#}")))?;
    let num_records = records.len();
    let version = {
        let mut guard = state.catalog.write();
        guard.version += 1;
        guard.records = Arc::new(records);
        guard.version
    };
    *state.memo.lock() = None;
    tracing::info!(version, num_records, "catalog reloaded");
    Ok(Json(serde_json::json!({ "catalog_version": version, "num_records": num_records })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
