use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::database::entity::{EntityDef, ENTITIES};
use crate::database::store::Store;
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, ApiResponse};
use crate::services::ImageService;
use crate::storage::ObjectStore;

/// Shared handler state, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub objects: Arc<dyn ObjectStore>,
    pub images: Arc<ImageService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>, http: reqwest::Client) -> Self {
        let objects = crate::storage::from_config(&config.storage, http.clone());
        let images = Arc::new(ImageService::new(http, config.images.clone()));
        Self {
            config: Arc::new(config),
            store,
            objects,
            images,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(session_routes())
        .merge(feature_routes())
        .merge(entity_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Protected API
        .merge(protected)
        .fallback(not_found)
        // Global middleware
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/api/auth/register", post(auth::register_post))
        .route("/api/auth/login", post(auth::login_post))
        .route("/api/auth/logout", post(auth::logout_post))
        .route("/api/v1/portfolio/:username", get(public::portfolio_get))
        .route("/api/v1/waitlist", post(public::waitlist_post))
}

fn session_routes() -> Router<AppState> {
    Router::new().route("/api/auth/me", get(protected::auth::me_get))
}

fn feature_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/companies/size", get(protected::companies::size_get))
        .route("/api/v1/jobs/:id/skills", put(protected::jobs::skills_put))
        .route("/api/v1/jobs/:id/questions", put(protected::jobs::questions_put))
        .route("/api/v1/uploads", post(protected::uploads::upload_post))
        .route("/api/v1/uploads/*key", delete(protected::uploads::upload_delete))
        .route("/api/v1/images/search", get(protected::images::search_get))
}

/// One static route set per registered entity; the descriptor travels as an extension
fn entity_routes() -> Router<AppState> {
    ENTITIES
        .iter()
        .fold(Router::new(), |router, def| router.merge(routes_for(def)))
}

fn routes_for(def: &'static EntityDef) -> Router<AppState> {
    use protected::data;

    let base = format!("/api/v1/{}", def.name);
    Router::new()
        .route(&base, get(data::collection_get).post(data::collection_post))
        .route(&format!("{}/bulk", base), post(data::bulk_post).put(data::bulk_put))
        .route(&format!("{}/page/:page_no", base), get(data::page_get))
        .route(
            &format!("{}/:id", base),
            get(data::record_get).put(data::record_put).delete(data::record_delete),
        )
        .route_layer(Extension(def))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "Job Board API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth/register, /api/auth/login, /api/auth/logout (public), /api/auth/me (protected)",
            "data": "/api/v1/:entity[/:id | /page/:n | /bulk] (protected)",
            "jobs": "/api/v1/jobs/:id/skills, /api/v1/jobs/:id/questions (protected)",
            "companies": "/api/v1/companies/size?low=&high= (protected)",
            "uploads": "/api/v1/uploads (protected)",
            "images": "/api/v1/images/search (protected)",
            "portfolio": "/api/v1/portfolio/:username (public)",
            "waitlist": "/api/v1/waitlist (public)",
        },
        "entities": ENTITIES.iter().map(|e| e.name).collect::<Vec<_>>(),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok"
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            ApiError::service_unavailable("Database unavailable").into_response()
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
