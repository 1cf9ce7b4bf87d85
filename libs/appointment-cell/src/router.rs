use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthContext};

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: Arc<AppointmentState>, auth: Arc<AuthContext>) -> Router {
    let public_routes = Router::new()
        .route("/pricing", get(handlers::get_pricing))
        .route("/slots/{date}", get(handlers::get_slots));

    let protected_routes = Router::new()
        .route("/book", post(handlers::book_appointment))
        .route("/my-appointments", get(handlers::my_appointments))
        .route("/stats/user", get(handlers::user_stats))
        .route("/{id}", get(handlers::get_appointment))
        .route("/{id}", delete(handlers::cancel_appointment))
        .route("/{id}/payment-method", patch(handlers::update_payment_method))
        .route("/{id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{id}/status", patch(handlers::update_status))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Administrator pricing management, mounted separately under /settings.
pub fn settings_routes(state: Arc<AppointmentState>, auth: Arc<AuthContext>) -> Router {
    Router::new()
        .route("/pricing", get(handlers::get_pricing_settings))
        .route("/pricing", put(handlers::update_pricing_settings))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state)
}
