use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, AuthContext};

use crate::handlers::{self, PaymentState};

pub fn payment_routes(state: Arc<PaymentState>, auth: Arc<AuthContext>) -> Router {
    Router::new()
        .route("/create-order", post(handlers::create_order))
        .route("/verify-payment", post(handlers::verify_payment))
        .route("/payment/{appointment_id}", get(handlers::get_payment))
        .route("/all-payments", get(handlers::all_payments))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state)
}
