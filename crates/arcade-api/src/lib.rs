//! arcade-api: HTTP surface for the web layer.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/alive` | Liveness |
//! | POST | `/api/v1/players/{player_id}` | Provision cabinet + cloud job |
//! | GET | `/api/v1/players/{player_id}/ready` | Point-in-time readiness |
//! | GET | `/api/v1/players/{player_id}/enter` | Redirect to the cabinet once ready |
//! | ANY | `/player/{player_id}/{*rest}` | Forward to the player's cabinet |

pub mod handlers;
pub mod proxy;

use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get, post};
use arcade_orchestrator::PlayerLifecycle;

pub use proxy::PlayerProxy;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub lifecycle: PlayerLifecycle,
    pub proxy: Arc<PlayerProxy>,
}

/// Build the complete API router, forwarding player traffic per the
/// lifecycle's `[router]` configuration.
pub fn build_router(lifecycle: PlayerLifecycle) -> Router {
    let proxy = PlayerProxy::new(lifecycle.config());
    build_router_with_proxy(lifecycle, proxy)
}

pub fn build_router_with_proxy(lifecycle: PlayerLifecycle, proxy: PlayerProxy) -> Router {
    let api_state = ApiState {
        lifecycle,
        proxy: Arc::new(proxy),
    };

    let api_routes = Router::new()
        .route("/players/{player_id}", post(handlers::register_player))
        .route("/players/{player_id}/ready", get(handlers::player_ready))
        .route("/players/{player_id}/enter", get(handlers::enter_player))
        .with_state(api_state.clone());

    let player_routes = Router::new()
        .route("/player/{player_id}", any(handlers::proxy_player))
        .route("/player/{player_id}/{*rest}", any(handlers::proxy_player))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(player_routes)
        .route("/alive", get(handlers::alive))
}
