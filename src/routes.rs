//! Route table.
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | POST | /api/auth/signup | none |
//! | POST | /api/auth/login | none |
//! | POST | /api/auth/refresh | none |
//! | GET | /api | none |
//! | GET | /api/health | none |
//! | POST | /api/transactions | role "user" |
//! | GET | /api/transactions | role "user" |
//! | GET | /api/transactions/{id} | role "user" |

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, state::AppState};

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/signup", post(handlers::auth::signup))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh));

    // Routes requiring the "user" role
    let transaction_routes = Router::new()
        .route(
            "/transactions",
            post(handlers::transactions::create_transaction)
                .get(handlers::transactions::list_transactions),
        )
        .route(
            "/transactions/{id}",
            get(handlers::transactions::get_transaction),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user,
        ));

    let api = Router::new()
        .route("/", get(handlers::health::hello_world))
        .route("/health", get(handlers::health::health_check))
        .nest("/auth", auth_routes)
        .merge(transaction_routes);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
