use axum::{routing::get, Router};

use appointment_cell::router::{appointment_routes, settings_routes};
use auth_cell::router::auth_routes;
use payment_cell::router::payment_routes;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/auth", auth_routes(state.auth, state.auth_ctx.clone()))
        .nest(
            "/appointments",
            appointment_routes(state.appointments.clone(), state.auth_ctx.clone()),
        )
        .nest(
            "/settings",
            settings_routes(state.appointments, state.auth_ctx.clone()),
        )
        .nest("/payments", payment_routes(state.payments, state.auth_ctx))
}
