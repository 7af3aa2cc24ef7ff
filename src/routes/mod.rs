use anyhow::{anyhow, Result};
use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod cases;
pub mod documents;
pub mod health;
pub mod privilege_log;
pub mod productions;

fn cors_layer(allowed_origins: Option<&str>) -> Result<CorsLayer> {
    let allow_origin = match allowed_origins {
        Some(origins) => {
            let headers = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| {
                    value
                        .parse::<HeaderValue>()
                        .map_err(|err| anyhow!("invalid CORS allowed origin '{value}': {err}"))
                })
                .collect::<Result<Vec<_>>>()?;
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

pub fn create_router(state: AppState) -> Result<Router<()>> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref())?;
    let body_limit = state.config.max_upload_bytes;

    let cases_routes = Router::new()
        .route("/", post(cases::create_case))
        .route("/:id", get(cases::get_case).patch(cases::update_case))
        .route(
            "/:id/documents",
            get(cases::list_case_documents).post(documents::upload_document),
        )
        .route("/:id/bates/lookup", get(cases::lookup_bates))
        .route(
            "/:id/productions",
            get(productions::list_productions).post(productions::create_production),
        );

    let documents_routes = Router::new()
        .route(
            "/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route(
            "/:id/privilege-log-entry",
            get(documents::get_privilege_log_entry).put(documents::put_privilege_log_entry),
        );

    let productions_routes = Router::new()
        .route("/:id", get(productions::get_production))
        .route("/:id/documents", post(productions::add_documents))
        .route(
            "/:id/documents/:entry_id",
            patch(productions::update_entry_privilege),
        )
        .route("/:id/privilege-log", get(privilege_log::get_privilege_log));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/cases", cases_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/productions", productions_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Ok(Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit)))
}
