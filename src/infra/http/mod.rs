mod apod;
mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{MethodRouter, get},
};

use crate::{application::apod::ApodService, config::CorsSettings};

pub use middleware::{CorsPolicy, RequestContext};

#[derive(Clone)]
pub struct HttpState {
    pub apod: Arc<ApodService>,
}

/// Build the public router, mounted under `base_path` unless it is empty.
///
/// Every endpoint answers with and without a trailing slash.
pub fn build_router(state: HttpState, base_path: &str, cors: &CorsSettings) -> Router {
    let endpoints: [(&str, MethodRouter<HttpState>); 4] = [
        ("", get(apod::by_date)),
        ("/today", get(apod::today)),
        ("/recent", get(apod::recent)),
        ("/health", get(apod::health)),
    ];

    let mut routes = Router::new();
    for (path, handler) in endpoints {
        for route in route_paths(base_path, path) {
            routes = routes.route(&route, handler.clone());
        }
    }

    let policy = Arc::new(CorsPolicy::from(cors));

    routes
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn_with_state(policy, middleware::cors))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

fn route_paths(base_path: &str, path: &str) -> Vec<String> {
    let full = format!("{base_path}{path}");
    if full.is_empty() {
        return vec!["/".to_string()];
    }
    vec![format!("{full}/"), full]
}
